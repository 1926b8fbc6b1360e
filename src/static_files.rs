//! Document provider backed by a directory on disk.
//!
//! Maps a request target to a file under the document root. The protocol
//! engine only sees the [`DocumentProvider`] trait, so the source of
//! documents can be swapped without touching the connection code.

use std::fs::File;
use std::io::{self, ErrorKind, Read};
use std::path::{Path, PathBuf};

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::StaticFilesConfig;
use crate::http::mime;
use crate::http::response::Body;

/// Read size for file bodies
pub const CHUNK_SIZE: usize = 8192;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("document not found")]
    NotFound,
    #[error("failed to open document: {0}")]
    Io(#[from] io::Error),
}

/// A resolved document, ready to be streamed.
#[derive(Debug)]
pub struct Document {
    /// Lazy content; dropping it releases the underlying file
    pub content: Body,
    pub content_type: String,
    /// Exact number of bytes `content` yields
    pub length: u64,
}

/// Resolves request paths to documents.
pub trait DocumentProvider: Send + Sync + 'static {
    fn resolve(&self, path: &str) -> Result<Document, ResolveError>;
}

/// Serves files from a document root.
///
/// - `/` and any path ending in `/` map to the index file of that directory
/// - a directory requested without a trailing slash also maps to its index
/// - the target is percent-decoded; query and fragment are ignored
/// - anything resolving outside the root (dot segments, encoded separators,
///   symlinks) is reported as not found
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
    index: String,
}

impl StaticFiles {
    /// Fails when `root` does not exist.
    pub fn new(root: impl AsRef<Path>, index: impl Into<String>) -> io::Result<Self> {
        Ok(Self {
            root: root.as_ref().canonicalize()?,
            index: index.into(),
        })
    }

    pub fn from_config(cfg: &StaticFilesConfig) -> io::Result<Self> {
        Self::new(&cfg.root, cfg.index.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path for a request target, before any existence check.
    fn candidate(&self, target: &str) -> Result<PathBuf, ResolveError> {
        // a leading "//" would be taken as an authority
        let absolute = format!("/{}", target.trim_start_matches('/'));
        let url = Url::parse("http://localhost/")
            .and_then(|base| base.join(&absolute))
            .map_err(|_| ResolveError::NotFound)?;

        let mut path = self.root.clone();
        for segment in url.path_segments().into_iter().flatten() {
            if segment.is_empty() {
                continue;
            }
            let decoded = urlencoding::decode(segment).map_err(|_| ResolveError::NotFound)?;
            if decoded == "." || decoded == ".." || decoded.contains(['/', '\\', '\0']) {
                return Err(ResolveError::NotFound);
            }
            path.push(decoded.as_ref());
        }

        if url.path().ends_with('/') || path.is_dir() {
            path.push(&self.index);
        }
        Ok(path)
    }
}

impl DocumentProvider for StaticFiles {
    fn resolve(&self, target: &str) -> Result<Document, ResolveError> {
        let path = self.candidate(target)?;

        let canonical = path.canonicalize().map_err(missing_as_not_found)?;
        if !canonical.starts_with(&self.root) {
            debug!(path = %path.display(), "Path escapes document root");
            return Err(ResolveError::NotFound);
        }

        let file = File::open(&canonical).map_err(missing_as_not_found)?;
        let meta = file.metadata()?;
        if !meta.is_file() {
            return Err(ResolveError::NotFound);
        }

        let length = meta.len();
        Ok(Document {
            content: Body::stream(FileChunks::new(file, length)),
            content_type: mime::content_type_for(&path).to_string(),
            length,
        })
    }
}

fn missing_as_not_found(e: io::Error) -> ResolveError {
    match e.kind() {
        ErrorKind::NotFound | ErrorKind::NotADirectory => ResolveError::NotFound,
        _ => ResolveError::Io(e),
    }
}

/// Reads exactly `remaining` bytes of a file in [`CHUNK_SIZE`] pieces.
///
/// A file that turns out shorter than announced yields `UnexpectedEof`.
pub struct FileChunks {
    file: File,
    remaining: u64,
}

impl FileChunks {
    pub fn new(file: File, length: u64) -> Self {
        Self {
            file,
            remaining: length,
        }
    }
}

impl Iterator for FileChunks {
    type Item = io::Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let want = usize::try_from(self.remaining).map_or(CHUNK_SIZE, |r| r.min(CHUNK_SIZE));
        let mut buf = BytesMut::zeroed(want);
        loop {
            match self.file.read(&mut buf) {
                Ok(0) => {
                    self.remaining = 0;
                    return Some(Err(ErrorKind::UnexpectedEof.into()));
                }
                Ok(n) => {
                    self.remaining -= n as u64;
                    buf.truncate(n);
                    return Some(Ok(buf.freeze()));
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.remaining = 0;
                    return Some(Err(e));
                }
            }
        }
    }
}
