use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use socket2::SockRef;
use tokio::net::{TcpSocket, lookup_host};
use tracing::{debug, info};

use crate::http::connection::Connection;
use crate::server::error::ServerError;

const WAKE_TIMEOUT: Duration = Duration::from_secs(1);

/// Source of incoming connections shared by every worker.
///
/// `accept` is called concurrently from all workers; each connection is
/// handed to exactly one caller.
pub trait Transport: Send + Sync + 'static {
    type Conn: Send + 'static;

    /// Blocks until a peer connects. `ServerError::Closed` once shut down.
    fn accept(&self) -> Result<Self::Conn, ServerError>;

    /// Stops handing out connections and wakes blocked callers. Idempotent.
    fn shutdown(&self);
}

/// Listening TCP socket.
///
/// Accepts in blocking mode from any number of threads. `shutdown` marks the
/// listener closed and shuts the socket down, so new peers are refused while
/// the handle is still shared. Linux also wakes every blocked `accept` at
/// that point; elsewhere the listener connects to itself once per thread
/// still blocked. Either way each worker returns with `ServerError::Closed`.
pub struct Listener {
    inner: TcpListener,
    local_addr: SocketAddr,
    read_timeout: Option<Duration>,
    closed: AtomicBool,
    waiting: AtomicUsize,
}

impl Listener {
    /// Resolves `host`, binds with `SO_REUSEADDR` and starts listening.
    pub async fn activate(host: &str, port: u16, backlog: u32) -> Result<Self, ServerError> {
        let display = format!("{host}:{port}");
        let bind_err = |source| ServerError::Bind {
            addr: display.clone(),
            source,
        };

        let addr = lookup_host((host, port))
            .await
            .map_err(bind_err)?
            .next()
            .ok_or_else(|| {
                bind_err(std::io::Error::new(
                    std::io::ErrorKind::AddrNotAvailable,
                    "host resolved to no addresses",
                ))
            })?;

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(bind_err)?;
        socket.set_reuseaddr(true).map_err(bind_err)?;
        socket.bind(addr).map_err(bind_err)?;

        let inner = socket
            .listen(backlog)
            .and_then(|listener| listener.into_std())
            .map_err(bind_err)?;
        inner.set_nonblocking(false).map_err(bind_err)?;
        let local_addr = inner.local_addr().map_err(bind_err)?;

        info!("Listening on {}", local_addr);

        Ok(Self {
            inner,
            local_addr,
            read_timeout: None,
            closed: AtomicBool::new(false),
            waiting: AtomicUsize::new(0),
        })
    }

    /// Read timeout applied to every accepted socket.
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Address a wake-up connection can reach.
    fn wake_addr(&self) -> SocketAddr {
        let ip = match self.local_addr.ip() {
            IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
            ip => ip,
        };
        SocketAddr::new(ip, self.local_addr.port())
    }
}

impl Transport for Listener {
    type Conn = Connection;

    fn accept(&self) -> Result<Connection, ServerError> {
        // counted before the closed check so shutdown never misses a sleeper
        self.waiting.fetch_add(1, Ordering::SeqCst);
        let accepted = if self.is_closed() {
            Err(ServerError::Closed)
        } else {
            self.inner.accept().map_err(ServerError::Accept)
        };
        self.waiting.fetch_sub(1, Ordering::SeqCst);

        let (stream, peer) = match accepted {
            Ok(pair) if !self.is_closed() => pair,
            // woken by shutdown, whether by error or by a wake-up connection
            Ok(_) => return Err(ServerError::Closed),
            Err(_) if self.is_closed() => return Err(ServerError::Closed),
            Err(e) => return Err(e),
        };

        stream
            .set_read_timeout(self.read_timeout)
            .map_err(ServerError::Accept)?;
        debug!(%peer, "Accepted connection");
        Ok(Connection::new(stream, peer))
    }

    fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Err(e) = SockRef::from(&self.inner).shutdown(Shutdown::Both) {
            debug!(error = %e, "Listening socket shutdown failed");
        }

        let blocked = self.waiting.load(Ordering::SeqCst);
        let addr = self.wake_addr();
        for _ in 0..blocked {
            if let Err(e) = TcpStream::connect_timeout(&addr, WAKE_TIMEOUT) {
                debug!(error = %e, "Wake-up connection failed");
            }
        }

        info!("Listener on {} shut down", self.local_addr);
    }
}
