//! Integrity hashing (streaming SHA-256)

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Read buffer size for streaming digests
pub const CHUNK_SIZE: usize = 8192;

#[derive(Debug, Error)]
pub enum HashError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("Path is not a regular file: {0}")]
    InvalidInput(PathBuf),

    #[error("Permission denied accessing file: {0}")]
    AccessDenied(PathBuf),

    #[error("Error reading file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl HashError {
    fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            ErrorKind::NotFound => HashError::NotFound(path.to_path_buf()),
            ErrorKind::PermissionDenied => HashError::AccessDenied(path.to_path_buf()),
            _ => HashError::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }
}

/// Streaming SHA-256 over files of any size.
#[derive(Debug, Clone, Copy)]
pub struct IntegrityHasher {
    chunk_size: usize,
}

impl IntegrityHasher {
    pub fn new() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
        }
    }

    /// Read granularity; values below 1 byte are raised to 1
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// SHA-256 of a file's content as 64 lower-case hex characters.
    ///
    /// The file is streamed in chunks and never held in memory as a whole.
    /// Identical content yields an identical digest regardless of where the
    /// file lives.
    pub fn digest(&self, path: impl AsRef<Path>) -> Result<String, HashError> {
        let path = path.as_ref();

        let meta = std::fs::metadata(path).map_err(|e| HashError::from_io(path, e))?;
        if !meta.is_file() {
            return Err(HashError::InvalidInput(path.to_path_buf()));
        }

        let file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        let mut reader = BufReader::with_capacity(self.chunk_size, file);
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; self.chunk_size];

        loop {
            let bytes_read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(HashError::from_io(path, e)),
            };
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(format!("{:x}", hasher.finalize()))
    }
}

impl Default for IntegrityHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// [`IntegrityHasher::digest`] with the default [`CHUNK_SIZE`]
pub fn digest(path: impl AsRef<Path>) -> Result<String, HashError> {
    IntegrityHasher::new().digest(path)
}
