use porter::config::Config;
use porter::server;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_thread_names(true)
        .init();

    let cfg = Config::load()?;

    server::run(&cfg).await
}
