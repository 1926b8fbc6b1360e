use std::io::{self, BufRead, BufReader, ErrorKind, Read, Write};

use thiserror::Error;
use tracing::warn;

use crate::http::request::{Method, Request, RequestBuilder};
use crate::http::response::StatusCode;
use crate::http::writer::ResponseWriter;

pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;
pub const DEFAULT_MAX_HEADERS: usize = 100;

/// Methods that are actually served.
pub const ALLOWED_METHODS: [Method; 2] = [Method::GET, Method::HEAD];

/// Protocol bounds applied to every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Longest accepted request or header line, measured after trimming
    /// surrounding whitespace
    pub max_line_length: usize,
    /// Most header fields accepted in one request
    pub max_headers: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            max_headers: DEFAULT_MAX_HEADERS,
        }
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("line longer than {limit} bytes")]
    LineTooLong { limit: usize },
    #[error("request line does not have exactly three fields")]
    MalformedRequestLine,
    #[error("method {0} not allowed")]
    MethodNotAllowed(Method),
    #[error("method {0:?} not implemented")]
    NotImplemented(String),
    #[error("request target {0:?} is not an absolute path")]
    InvalidPath(String),
    #[error("unsupported protocol {0:?}")]
    InvalidVersion(String),
    #[error("malformed header line")]
    MalformedHeader,
    #[error("more than {limit} header fields")]
    TooManyHeaders { limit: usize },
    #[error("connection closed before a request was received")]
    ConnectionClosed,
    #[error("failed to send rejection")]
    SendRejection(#[source] io::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ParseError {
    /// The status to answer with, or `None` when the peer is unreachable.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ParseError::LineTooLong { .. } => Some(StatusCode::UriTooLong),
            ParseError::MalformedRequestLine
            | ParseError::InvalidPath(_)
            | ParseError::InvalidVersion(_)
            | ParseError::MalformedHeader => Some(StatusCode::BadRequest),
            ParseError::MethodNotAllowed(_) => Some(StatusCode::MethodNotAllowed),
            ParseError::NotImplemented(_) => Some(StatusCode::NotImplemented),
            ParseError::TooManyHeaders { .. } => Some(StatusCode::RequestHeaderFieldsTooLarge),
            ParseError::ConnectionClosed
            | ParseError::SendRejection(_)
            | ParseError::Io(_) => None,
        }
    }
}

enum ParseState {
    AwaitingRequestLine,
    AwaitingHeaders(RequestBuilder),
    Complete(Request),
    Rejected(ParseError),
}

/// Reads a single request off a buffered reader.
///
/// ```text
///  AwaitingRequestLine ──ok──▶ AwaitingHeaders ──blank line──▶ Complete
///          │                     │      ▲
///          │                     └─hdr──┘
///          └──────────┬──────────┘
///                     ▼
///                  Rejected
/// ```
///
/// Never reads past the blank line ending the header block. An overlong line
/// is rejected at the first byte that pushes its trimmed length past
/// `max_line_length`.
pub struct RequestParser<'a, R> {
    reader: &'a mut R,
    limits: Limits,
}

impl<'a, R: BufRead> RequestParser<'a, R> {
    pub fn new(reader: &'a mut R, limits: Limits) -> Self {
        Self { reader, limits }
    }

    pub fn parse(mut self) -> Result<Request, ParseError> {
        let mut state = ParseState::AwaitingRequestLine;
        loop {
            state = match state {
                ParseState::AwaitingRequestLine => match self.request_line() {
                    Ok(builder) => ParseState::AwaitingHeaders(builder),
                    Err(e) => ParseState::Rejected(e),
                },
                ParseState::AwaitingHeaders(builder) => match self.header_line(builder) {
                    Ok(HeaderStep::More(builder)) => ParseState::AwaitingHeaders(builder),
                    Ok(HeaderStep::Done(request)) => ParseState::Complete(request),
                    Err(e) => ParseState::Rejected(e),
                },
                ParseState::Complete(request) => return Ok(request),
                ParseState::Rejected(e) => return Err(e),
            };
        }
    }

    fn request_line(&mut self) -> Result<RequestBuilder, ParseError> {
        let line = self.read_line()?.ok_or(ParseError::ConnectionClosed)?;

        let tokens: Vec<&str> = line.split_whitespace().collect();
        let &[method, path, version] = tokens.as_slice() else {
            return Err(ParseError::MalformedRequestLine);
        };

        let method = match Method::from_str(method) {
            Some(m) if ALLOWED_METHODS.contains(&m) => m,
            Some(m) => return Err(ParseError::MethodNotAllowed(m)),
            None => return Err(ParseError::NotImplemented(method.to_string())),
        };
        if !path.starts_with('/') {
            return Err(ParseError::InvalidPath(path.to_string()));
        }
        if !version.starts_with("HTTP") {
            return Err(ParseError::InvalidVersion(version.to_string()));
        }

        Ok(RequestBuilder::new()
            .method(method)
            .path(path)
            .version(version))
    }

    fn header_line(&mut self, builder: RequestBuilder) -> Result<HeaderStep, ParseError> {
        let line = match self.read_line()? {
            Some(line) if !line.is_empty() => line,
            // blank line or EOF ends the header block
            _ => {
                let request = builder.build().map_err(|_| ParseError::MalformedRequestLine)?;
                return Ok(HeaderStep::Done(request));
            }
        };

        let (name, value) = split_header_line(&line).ok_or(ParseError::MalformedHeader)?;
        let builder = builder.header(name, value);
        if builder.header_count() > self.limits.max_headers {
            return Err(ParseError::TooManyHeaders {
                limit: self.limits.max_headers,
            });
        }
        Ok(HeaderStep::More(builder))
    }

    /// One line with surrounding whitespace trimmed, `None` on EOF.
    fn read_line(&mut self) -> Result<Option<String>, ParseError> {
        let limit = self.limits.max_line_length;
        let mut line = LineBuf::new(limit);
        let mut read_any = false;
        loop {
            let buf = match self.reader.fill_buf() {
                Ok(buf) => buf,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            if buf.is_empty() {
                if !read_any {
                    return Ok(None);
                }
                break;
            }
            read_any = true;

            let available = buf.len();
            match line.feed(buf) {
                Feed::More => self.reader.consume(available),
                Feed::Ended(used) => {
                    self.reader.consume(used);
                    break;
                }
                Feed::TooLong(used) => {
                    self.reader.consume(used);
                    return Err(ParseError::LineTooLong { limit });
                }
            }
        }
        Ok(Some(latin1(&line.content)))
    }
}

enum HeaderStep {
    More(RequestBuilder),
    Done(Request),
}

/// Outcome of feeding buffered bytes to a [`LineBuf`].
enum Feed {
    /// Every byte was taken, the line goes on
    More,
    /// The line ended; this many bytes belong to it, LF included
    Ended(usize),
    /// The trimmed line outgrew the limit at this many bytes in
    TooLong(usize),
}

/// Accumulates one line without its leading and trailing whitespace.
///
/// Whitespace after the last visible byte is held back until another
/// visible byte arrives. Nothing past `limit` is ever stored.
struct LineBuf {
    limit: usize,
    content: Vec<u8>,
    pending: Vec<u8>,
    overflowed: bool,
}

impl LineBuf {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            content: Vec::new(),
            pending: Vec::new(),
            overflowed: false,
        }
    }

    fn feed(&mut self, bytes: &[u8]) -> Feed {
        for (i, &b) in bytes.iter().enumerate() {
            if b == b'\n' {
                return Feed::Ended(i + 1);
            }
            if b.is_ascii_whitespace() {
                if self.content.is_empty() || self.overflowed {
                    continue;
                }
                if self.content.len() + self.pending.len() < self.limit {
                    self.pending.push(b);
                } else {
                    self.overflowed = true;
                }
                continue;
            }
            if self.overflowed || self.content.len() + self.pending.len() >= self.limit {
                return Feed::TooLong(i + 1);
            }
            self.content.append(&mut self.pending);
            self.content.push(b);
        }
        Feed::More
    }
}

/// Header bytes are ISO-8859-1; every byte maps to one char.
fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Splits `Name: Value` on the first colon, trimming both sides.
pub fn split_header_line(line: &str) -> Option<(&str, &str)> {
    let (name, value) = line.split_once(':')?;
    Some((name.trim(), value.trim()))
}

/// Parses one request, answering protocol rejections on the same stream.
///
/// On a rejection the matching error response has already been written when
/// this returns `Err`; callers must not send another one.
pub fn read_request<S: Read + Write>(
    stream: &mut BufReader<S>,
    limits: Limits,
) -> Result<Request, ParseError> {
    let result = RequestParser::new(stream, limits).parse();

    if let Err(e) = &result {
        if let Some(status) = e.status() {
            warn!(status = status.as_u16(), error = %e, "Rejecting request");
            ResponseWriter::send_error(stream.get_mut(), status)
                .map_err(ParseError::SendRejection)?;
        }
    }

    result
}
