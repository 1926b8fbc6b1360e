use std::io::{self, BufReader, ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};

use anyhow::Context;
use tracing::{debug, error};

use crate::http::parser::{Limits, ParseError, read_request};
use crate::http::request::{Method, Request};
use crate::http::response::{Body, Response, ResponseBuilder, StatusCode};
use crate::http::writer::ResponseWriter;
use crate::server::pool::ConnectionHandler;
use crate::static_files::{DocumentProvider, ResolveError};

/// Byte stream a connection is served over.
pub trait Stream: Read + Write + Send + 'static {
    /// Shuts down both directions; the peer sees EOF.
    fn close(&mut self) -> io::Result<()>;
}

impl Stream for TcpStream {
    fn close(&mut self) -> io::Result<()> {
        match self.shutdown(Shutdown::Both) {
            Err(e) if e.kind() == ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}

/// One accepted client, serving exactly one request.
pub struct Connection<S = TcpStream> {
    stream: BufReader<S>,
    peer: SocketAddr,
    state: ConnectionState,
}

pub enum ConnectionState {
    Reading,
    Processing(Request),
    Writing(ResponseWriter),
    Closed,
}

impl<S: Stream> Connection<S> {
    pub fn new(stream: S, peer: SocketAddr) -> Self {
        Self {
            stream: BufReader::new(stream),
            peer,
            state: ConnectionState::Reading,
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Drives the connection to `Closed`, closing the stream on every path.
    ///
    /// An `Err` means the response could not be completed; the peer sees an
    /// abrupt close instead of a second response.
    pub fn run<P>(&mut self, limits: Limits, provider: &P) -> anyhow::Result<()>
    where
        P: DocumentProvider + ?Sized,
    {
        let result = self.drive(limits, provider);
        self.state = ConnectionState::Closed;
        if let Err(e) = self.stream.get_mut().close() {
            debug!(peer = %self.peer, error = %e, "Error closing connection");
        }
        result
    }

    fn drive<P>(&mut self, limits: Limits, provider: &P) -> anyhow::Result<()>
    where
        P: DocumentProvider + ?Sized,
    {
        loop {
            match std::mem::replace(&mut self.state, ConnectionState::Closed) {
                ConnectionState::Reading => match read_request(&mut self.stream, limits) {
                    Ok(request) => {
                        self.state = ConnectionState::Processing(request);
                    }
                    // rejection already answered, or nobody left to answer
                    Err(ParseError::Io(e)) => {
                        return Err(e).context("failed to read request");
                    }
                    Err(e @ ParseError::SendRejection(_)) => return Err(e.into()),
                    Err(e) => {
                        debug!(peer = %self.peer, error = %e, "Request not served");
                    }
                },

                ConnectionState::Processing(request) => {
                    let response = dispatch(&request, provider)
                        .with_context(|| format!("failed to resolve {}", request.path))?;
                    debug!(
                        peer = %self.peer,
                        method = %request.method,
                        path = %request.path,
                        status = response.status.as_u16(),
                        "Responding"
                    );
                    self.state = ConnectionState::Writing(ResponseWriter::new(response));
                }

                ConnectionState::Writing(writer) => {
                    let status = writer.status();
                    writer
                        .write_to(self.stream.get_mut())
                        .with_context(|| format!("failed while sending {status} response"))?;
                }

                ConnectionState::Closed => break,
            }
        }

        Ok(())
    }
}

/// Picks the handler for a parsed request.
///
/// Only `GET` and `HEAD` get past the parser; anything else is answered with
/// 405. `ResolveError::Io` is returned to the caller, which aborts the
/// connection without a response.
pub fn dispatch<P>(request: &Request, provider: &P) -> Result<Response, ResolveError>
where
    P: DocumentProvider + ?Sized,
{
    match request.method {
        Method::GET | Method::HEAD => serve_document(request, provider, request.wants_body()),
        _ => Ok(Response::error(StatusCode::MethodNotAllowed)),
    }
}

fn serve_document<P>(
    request: &Request,
    provider: &P,
    with_body: bool,
) -> Result<Response, ResolveError>
where
    P: DocumentProvider + ?Sized,
{
    let document = match provider.resolve(&request.path) {
        Ok(document) => document,
        Err(ResolveError::NotFound) => return Ok(Response::not_found()),
        Err(e) => return Err(e),
    };

    // HEAD drops the content here, releasing the file
    let body = if with_body { document.content } else { Body::Empty };

    Ok(ResponseBuilder::new(StatusCode::Ok)
        .header("Content-Type", document.content_type)
        .header("Content-Length", document.length.to_string())
        .body(body)
        .build())
}

/// Serves HTTP over accepted connections using a document provider.
pub struct HttpHandler<P> {
    provider: P,
    limits: Limits,
}

impl<P: DocumentProvider> HttpHandler<P> {
    pub fn new(provider: P, limits: Limits) -> Self {
        Self { provider, limits }
    }
}

impl<P, S> ConnectionHandler<Connection<S>> for HttpHandler<P>
where
    P: DocumentProvider,
    S: Stream,
{
    fn handle(&self, mut conn: Connection<S>) {
        if let Err(e) = conn.run(self.limits, &self.provider) {
            error!(peer = %conn.peer(), error = %format!("{e:#}"), "Connection aborted");
        }
    }
}
