mod utils;

use std::path::PathBuf;
use std::time::Duration;

use porter::config::Config;
use porter::http::parser::Limits;
use utils::TempRoot;

#[test]
fn test_config_defaults() {
    let cfg = Config::default();

    assert_eq!(cfg.server.host, "localhost");
    assert_eq!(cfg.server.port, 8080);
    assert_eq!(cfg.server.workers, 15);
    assert_eq!(cfg.server.read_timeout(), None);
    assert_eq!(cfg.server.shutdown_grace(), Duration::from_secs(5));
    assert_eq!(cfg.static_files.index, "index.html");
    assert_eq!(cfg.limits.to_limits(), Limits::default());
}

#[test]
fn test_config_from_yaml() {
    let cfg = Config::from_yaml(
        r#"
server:
  host: 0.0.0.0
  port: 3000
  workers: 4
  read_timeout_secs: 30
static_files:
  root: /srv/www
limits:
  max_headers: 20
"#,
    )
    .unwrap();

    assert_eq!(cfg.server.host, "0.0.0.0");
    assert_eq!(cfg.server.port, 3000);
    assert_eq!(cfg.server.workers, 4);
    assert_eq!(cfg.server.backlog, 10);
    assert_eq!(cfg.server.read_timeout(), Some(Duration::from_secs(30)));
    assert_eq!(cfg.static_files.root, PathBuf::from("/srv/www"));
    assert_eq!(cfg.static_files.index, "index.html");
    assert_eq!(cfg.limits.max_headers, 20);
    assert_eq!(cfg.limits.max_line_length, 64 * 1024);
}

#[test]
fn test_config_rejects_unknown_fields() {
    assert!(Config::from_yaml("server:\n  colour: blue\n").is_err());
}

#[test]
fn test_config_env_overrides() {
    let mut cfg = Config::default();
    unsafe {
        std::env::set_var("PORTER_ROOT", "/var/www");
        std::env::set_var("PORTER_PORT", "9090");
        std::env::set_var("PORTER_WORKERS", "2");
    }
    let result = cfg.apply_env();
    unsafe {
        std::env::remove_var("PORTER_ROOT");
        std::env::remove_var("PORTER_PORT");
        std::env::remove_var("PORTER_WORKERS");
    }

    result.unwrap();
    assert_eq!(cfg.static_files.root, PathBuf::from("/var/www"));
    assert_eq!(cfg.server.port, 9090);
    assert_eq!(cfg.server.workers, 2);
    assert_eq!(cfg.server.host, "localhost");
}

#[test]
fn test_validate_requires_root() {
    let err = Config::default().validate().unwrap_err();

    assert!(err.to_string().contains("document root is required"));
}

#[test]
fn test_validate_rejects_missing_root() {
    let root = TempRoot::new("cfg-missing");
    let mut cfg = Config::default();
    cfg.static_files.root = root.path().join("nope");

    let err = cfg.validate().unwrap_err();

    assert!(err.to_string().contains("does not exist"));
}

#[test]
fn test_validate_rejects_zero_workers() {
    let root = TempRoot::new("cfg-workers");
    let mut cfg = Config::default();
    cfg.static_files.root = root.path().to_path_buf();
    cfg.server.workers = 0;

    assert!(cfg.validate().is_err());
}

#[test]
fn test_validate_accepts_existing_root() {
    let root = TempRoot::new("cfg-ok");
    let mut cfg = Config::default();
    cfg.static_files.root = root.path().to_path_buf();

    cfg.validate().unwrap();
}
