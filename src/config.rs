//! Startup configuration.
//!
//! Loaded from an optional YAML file, then overridden from the environment:
//!
//! | Variable         | Field               |
//! |------------------|---------------------|
//! | `PORTER_CONFIG`  | path of the YAML file (or first CLI argument) |
//! | `PORTER_ROOT`    | `static_files.root` |
//! | `PORTER_HOST`    | `server.host`       |
//! | `PORTER_PORT`    | `server.port`       |
//! | `PORTER_WORKERS` | `server.workers`    |

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use serde::Deserialize;

use crate::http::parser::{DEFAULT_MAX_HEADERS, DEFAULT_MAX_LINE_LENGTH, Limits};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub static_files: StaticFilesConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub backlog: u32,
    pub read_timeout_secs: Option<u64>,
    pub shutdown_grace_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
            workers: 15,
            backlog: 10,
            read_timeout_secs: None,
            shutdown_grace_secs: 5,
        }
    }
}

impl ServerConfig {
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_secs.map(Duration::from_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StaticFilesConfig {
    /// Document root; required
    pub root: PathBuf,
    /// File served for directory requests
    pub index: String,
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::new(),
            index: "index.html".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    pub max_line_length: usize,
    pub max_headers: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            max_headers: DEFAULT_MAX_HEADERS,
        }
    }
}

impl LimitsConfig {
    pub fn to_limits(&self) -> Limits {
        Limits {
            max_line_length: self.max_line_length,
            max_headers: self.max_headers,
        }
    }
}

impl Config {
    /// Loads, applies environment overrides and validates.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::args_os()
            .nth(1)
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("PORTER_CONFIG").map(PathBuf::from));

        let mut cfg = match path {
            Some(path) => {
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("cannot read config file {}", path.display()))?;
                Self::from_yaml(&text)
                    .with_context(|| format!("invalid config file {}", path.display()))?
            }
            None => Self::default(),
        };

        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_yaml(text: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Overrides fields from `PORTER_*` variables that are set.
    pub fn apply_env(&mut self) -> anyhow::Result<()> {
        if let Ok(root) = std::env::var("PORTER_ROOT") {
            self.static_files.root = PathBuf::from(root);
        }
        if let Ok(host) = std::env::var("PORTER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("PORTER_PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("PORTER_PORT is not a port number: {port:?}"))?;
        }
        if let Ok(workers) = std::env::var("PORTER_WORKERS") {
            self.server.workers = workers
                .parse()
                .with_context(|| format!("PORTER_WORKERS is not a number: {workers:?}"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let root = &self.static_files.root;
        if root.as_os_str().is_empty() {
            bail!("document root is required (static_files.root or PORTER_ROOT)");
        }
        if !root.is_dir() {
            bail!("document root {} does not exist", root.display());
        }
        if self.server.workers == 0 {
            bail!("server.workers must be at least 1");
        }
        if self.limits.max_line_length == 0 || self.limits.max_headers == 0 {
            bail!("protocol limits must be positive");
        }
        Ok(())
    }
}
