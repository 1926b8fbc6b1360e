use std::io::{self, Write};
use std::time::SystemTime;

use crate::http::response::{Body, Response, StatusCode};

const HTTP_VERSION: &str = "HTTP/1.1";

/// Value of the `Server` header on every response.
pub const SERVER_NAME: &str = concat!("porter/", env!("CARGO_PKG_VERSION"));

/// Status line, framing headers, handler headers and the blank line.
fn serialize_head(resp: &Response, date: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256);

    // Status line
    let status_line = format!(
        "{} {} {}\r\n",
        HTTP_VERSION,
        resp.status.as_u16(),
        resp.status.reason_phrase()
    );
    buf.extend_from_slice(status_line.as_bytes());

    let framing = [("Date", date), ("Server", SERVER_NAME), ("Connection", "close")];
    for (k, v) in framing.into_iter().chain(resp.headers.iter()) {
        buf.extend_from_slice(k.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(v.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    // Header/body separator
    buf.extend_from_slice(b"\r\n");

    buf
}

/// Serializes one response onto a byte sink.
///
/// The head is rendered up front; the body is pulled lazily while writing so
/// a file never has to be read into memory in full.
pub struct ResponseWriter {
    status: StatusCode,
    head: Vec<u8>,
    body: Body,
}

impl ResponseWriter {
    pub fn new(response: Response) -> Self {
        let date = httpdate::fmt_http_date(SystemTime::now());
        Self::with_date(response, &date)
    }

    /// Like [`ResponseWriter::new`] with a fixed `Date` value.
    pub fn with_date(response: Response, date: &str) -> Self {
        let head = serialize_head(&response, date);
        Self {
            status: response.status,
            head,
            body: response.body,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Writes head then body, then flushes.
    ///
    /// Returns the number of body bytes written. A failing body chunk aborts
    /// the write with that error; the head may already be on the wire.
    pub fn write_to<W: Write>(self, out: &mut W) -> io::Result<u64> {
        out.write_all(&self.head)?;

        let mut written = 0u64;
        if let Body::Stream(chunks) = self.body {
            for chunk in chunks {
                let chunk = chunk?;
                out.write_all(&chunk)?;
                written += chunk.len() as u64;
            }
        }

        out.flush()?;
        Ok(written)
    }

    /// Sends a complete response.
    pub fn send<W: Write>(out: &mut W, response: Response) -> io::Result<u64> {
        ResponseWriter::new(response).write_to(out)
    }

    /// Sends a header-only error response.
    pub fn send_error<W: Write>(out: &mut W, status: StatusCode) -> io::Result<()> {
        Self::send(out, Response::error(status)).map(|_| ())
    }
}
