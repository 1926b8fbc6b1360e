//! HTTP protocol implementation.
//!
//! A strict HTTP/1.1 subset: `GET` and `HEAD` only, one request per
//! connection, `Connection: close` on every response.
//!
//! # Architecture
//!
//! - **`connection`**: Per-connection state machine and the method dispatcher
//! - **`parser`**: Bounded request-line and header parsing, protocol limits
//! - **`request`**: HTTP request representation and ordered headers
//! - **`response`**: Status codes, lazy bodies and the response builder
//! - **`writer`**: Serializes responses with the framing headers
//! - **`mime`**: Content type detection based on file extensions
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← Parse request line and headers
//!        └──────┬──────┘
//!               │ Request parsed          (rejected → error already sent)
//!               ▼                                      │
//!        ┌──────────────────┐                          │
//!        │   Processing     │ ← Resolve document       │
//!        └──────┬───────────┘                          │
//!               │ Response ready                       │
//!               ▼                                      │
//!        ┌──────────────────┐                          │
//!        │    Writing       │ ← Head, then body chunks │
//!        └──────┬───────────┘                          │
//!               ▼                                      │
//!        ┌──────────────────┐                          │
//!        │     Closed       │ ◀────────────────────────┘
//!        └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use porter::http::connection::{Connection, HttpHandler};
//! use porter::http::parser::Limits;
//! use porter::server::ConnectionHandler;
//! use porter::static_files::StaticFiles;
//! use std::net::TcpListener;
//!
//! fn main() -> anyhow::Result<()> {
//!     let handler = HttpHandler::new(StaticFiles::new("./www", "index.html")?, Limits::default());
//!     let listener = TcpListener::bind("127.0.0.1:8080")?;
//!
//!     loop {
//!         let (socket, peer) = listener.accept()?;
//!         handler.handle(Connection::new(socket, peer));
//!     }
//! }
//! ```

pub mod connection;
pub mod mime;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
