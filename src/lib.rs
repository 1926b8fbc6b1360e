//! Porter - minimal HTTP/1.1 origin server
//!
//! Core library: socket lifecycle, worker pool, request parsing,
//! response framing and the static document provider.

pub mod config;
pub mod http;
pub mod server;
pub mod static_files;
