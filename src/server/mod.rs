//! Socket lifecycle and worker pool.
//!
//! [`Server`] binds the listening socket and builds the HTTP handler from
//! configuration; [`Server::start`] hands both to a [`WorkerPool`].

pub mod error;
pub mod listener;
pub mod pool;

use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::config::Config;
use crate::http::connection::HttpHandler;
use crate::static_files::StaticFiles;

pub use error::ServerError;
pub use listener::{Listener, Transport};
pub use pool::{ConnectionHandler, WorkerPool};

pub struct Server {
    listener: Arc<Listener>,
    handler: Arc<HttpHandler<StaticFiles>>,
    workers: NonZeroUsize,
}

impl Server {
    /// Opens the document root and activates the listening socket.
    pub async fn bind(cfg: &Config) -> anyhow::Result<Self> {
        let workers =
            NonZeroUsize::new(cfg.server.workers).context("worker count must be at least 1")?;

        let provider = StaticFiles::from_config(&cfg.static_files).with_context(|| {
            format!("cannot open document root {}", cfg.static_files.root.display())
        })?;

        let listener = Listener::activate(&cfg.server.host, cfg.server.port, cfg.server.backlog)
            .await?
            .with_read_timeout(cfg.server.read_timeout());

        Ok(Self {
            listener: Arc::new(listener),
            handler: Arc::new(HttpHandler::new(provider, cfg.limits.to_limits())),
            workers,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    pub fn start(self) -> Result<WorkerPool<Listener>, ServerError> {
        let pool = WorkerPool::start(self.listener, self.handler, self.workers)?;
        info!(workers = pool.size(), "Serving requests");
        Ok(pool)
    }
}

/// Serves until Ctrl-C, then shuts down.
pub async fn run(cfg: &Config) -> anyhow::Result<()> {
    let server = Server::bind(cfg).await?;
    let pool = server.start()?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    stop_within(pool, cfg.server.shutdown_grace()).await;
    Ok(())
}

/// Stops the pool, giving in-flight connections up to `grace` to finish.
///
/// Joining happens on a plain thread; if it outlives `grace` the remaining
/// workers are abandoned and die with the process.
pub async fn stop_within(pool: WorkerPool<Listener>, grace: Duration) {
    let (done_tx, done_rx) = oneshot::channel();
    thread::spawn(move || {
        pool.stop();
        let _ = done_tx.send(());
    });

    match tokio::time::timeout(grace, done_rx).await {
        Ok(_) => info!("Server is stopping"),
        Err(_) => warn!(grace_secs = grace.as_secs(), "Workers still busy, stopping anyway"),
    }
}
