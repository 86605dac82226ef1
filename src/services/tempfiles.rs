//! Scoped temporary files for uploads and results
//!
//! Every file handed out here is a [`TempPath`], so it is deleted when the
//! owner drops it: on success, on error, and on panic unwinding alike.
//! Deletion failures are ignored.

use crate::error::{BgRemovalError, Result};
use axum::body::{Body, Bytes};
use futures_util::Stream;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use tempfile::TempPath;
use tokio_util::io::ReaderStream;

const TEMP_PREFIX: &str = "bgremove-";

/// Creates temp files in a fixed directory
#[derive(Debug, Clone)]
pub struct TempFileService {
    dir: PathBuf,
}

impl TempFileService {
    /// Use `dir`, or the system temp directory when `None`
    #[must_use]
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self {
            dir: dir.unwrap_or_else(std::env::temp_dir),
        }
    }

    /// Directory new files are created in
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write uploaded bytes to a new temp file ending in `suffix`
    ///
    /// # Errors
    /// - Temp file cannot be created or written
    pub fn persist_upload(&self, bytes: &[u8], suffix: &str) -> Result<TempPath> {
        let mut file = self.builder(suffix)?;
        file.write_all(bytes)
            .and_then(|()| file.flush())
            .map_err(|e| BgRemovalError::file_io_error("write upload", file.path(), &e))?;
        Ok(file.into_temp_path())
    }

    /// Reserve an empty `.png` temp file for a result
    ///
    /// # Errors
    /// - Temp file cannot be created
    pub fn create_output(&self) -> Result<TempPath> {
        Ok(self.builder(".png")?.into_temp_path())
    }

    fn builder(&self, suffix: &str) -> Result<tempfile::NamedTempFile> {
        tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(suffix)
            .tempfile_in(&self.dir)
            .map_err(|e| BgRemovalError::file_io_error("create temp file", &self.dir, &e))
    }
}

/// File body stream that deletes its file once dropped
///
/// The reader is declared before the path so the handle closes before the
/// file is removed.
#[derive(Debug)]
pub struct TempFileStream {
    inner: ReaderStream<tokio::fs::File>,
    _path: TempPath,
}

impl TempFileStream {
    /// Open `path` for streaming; returns the stream and the file length
    ///
    /// # Errors
    /// - File cannot be opened or stat'ed
    pub async fn open(path: TempPath) -> Result<(Self, u64)> {
        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| BgRemovalError::file_io_error("open result", &path, &e))?;
        let len = file
            .metadata()
            .await
            .map_err(|e| BgRemovalError::file_io_error("stat result", &path, &e))?
            .len();

        Ok((
            Self {
                inner: ReaderStream::new(file),
                _path: path,
            },
            len,
        ))
    }

    /// Wrap into a response body
    #[must_use]
    pub fn into_body(self) -> Body {
        Body::from_stream(self)
    }
}

impl Stream for TempFileStream {
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().inner).poll_next(cx)
    }
}
