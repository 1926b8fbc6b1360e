//! Fixed pool of worker threads.
//!
//! Each worker runs its own blocking loop: accept a connection from the
//! shared [`Transport`], hand it to the [`ConnectionHandler`], repeat. At most
//! `count` connections are served at once. A panic while handling one
//! connection is caught and logged; the worker carries on with the next.

use std::any::Any;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::server::error::ServerError;
use crate::server::listener::Transport;

/// Pause before retrying after a failed accept.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Serves one connection to completion.
///
/// Failures are handled and logged inside `handle`; nothing is returned to
/// the worker loop.
pub trait ConnectionHandler<C>: Send + Sync + 'static {
    fn handle(&self, conn: C);
}

pub struct WorkerPool<T: Transport> {
    transport: Arc<T>,
    running: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl<T: Transport> WorkerPool<T> {
    /// Spawns `count` workers named `worker-<n>`.
    pub fn start<H>(
        transport: Arc<T>,
        handler: Arc<H>,
        count: NonZeroUsize,
    ) -> Result<Self, ServerError>
    where
        H: ConnectionHandler<T::Conn>,
    {
        let mut pool = Self {
            transport,
            running: Arc::new(AtomicBool::new(true)),
            workers: Vec::with_capacity(count.get()),
        };

        for id in 0..count.get() {
            let worker = Worker {
                id,
                transport: Arc::clone(&pool.transport),
                handler: Arc::clone(&handler),
                running: Arc::clone(&pool.running),
            };
            let spawned = thread::Builder::new()
                .name(format!("worker-{id}"))
                .spawn(move || worker.run());

            match spawned {
                Ok(handle) => pool.workers.push(handle),
                Err(e) => {
                    pool.shutdown_and_join();
                    return Err(ServerError::Spawn(e));
                }
            }
        }

        debug!(workers = pool.workers.len(), "Worker pool started");
        Ok(pool)
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Lets every worker finish its current connection, then joins them.
    pub fn stop(mut self) {
        self.shutdown_and_join();
    }

    fn shutdown_and_join(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.transport.shutdown();

        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("Worker thread terminated abnormally");
            }
        }
    }
}

impl<T: Transport> Drop for WorkerPool<T> {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            self.shutdown_and_join();
        }
    }
}

struct Worker<T, H> {
    id: usize,
    transport: Arc<T>,
    handler: Arc<H>,
    running: Arc<AtomicBool>,
}

impl<T, H> Worker<T, H>
where
    T: Transport,
    H: ConnectionHandler<T::Conn>,
{
    fn run(self) {
        debug!(worker = self.id, "Worker started");

        while self.running.load(Ordering::SeqCst) {
            let conn = match self.transport.accept() {
                Ok(conn) => conn,
                Err(ServerError::Closed) => break,
                Err(e) => {
                    warn!(worker = self.id, error = %e, "Accept failed, retrying");
                    thread::sleep(ACCEPT_BACKOFF);
                    continue;
                }
            };

            let handler = &self.handler;
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handler.handle(conn))) {
                error!(
                    worker = self.id,
                    panic = panic_message(payload.as_ref()),
                    "Connection handler panicked"
                );
            }
        }

        debug!(worker = self.id, "Worker stopped");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
