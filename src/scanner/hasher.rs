//! SHA-1 file hasher with streaming support.
//!
//! # Overview
//! Files are read through a fixed-size buffer, so memory use does not grow
//! with file size. A read failure anywhere in the file abandons the digest;
//! there is no partial result.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use sha1::{Digest, Sha1};

use super::HashError;

/// Read buffer size for streaming hashes.
pub const CHUNK_SIZE: usize = 8192;

/// Streaming SHA-1 hasher.
#[derive(Debug, Clone)]
pub struct Hasher {
    chunk_size: usize,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    /// Create a hasher reading [`CHUNK_SIZE`] bytes at a time.
    #[must_use]
    pub fn new() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
        }
    }

    /// Override the read buffer size (clamped to at least one byte).
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Hash the whole file and return the lowercase hex digest.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or a read fails.
    pub fn full_hash(&self, path: &Path) -> Result<String, HashError> {
        let mut file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        let mut hasher = Sha1::new();
        let mut buffer = vec![0u8; self.chunk_size];

        loop {
            let read = match file.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(HashError::from_io(path, e)),
            };
            hasher.update(&buffer[..read]);
        }

        Ok(hash_to_hex(&hasher.finalize()))
    }

    /// Hash an in-memory byte slice.
    #[must_use]
    pub fn hash_bytes(&self, data: &[u8]) -> String {
        hash_to_hex(&Sha1::digest(data))
    }
}

/// Hash a file with default settings.
///
/// # Errors
///
/// See [`Hasher::full_hash`].
pub fn sha1_file(path: &Path) -> Result<String, HashError> {
    Hasher::new().full_hash(path)
}

/// Lowercase hex encoding of a digest.
#[must_use]
pub fn hash_to_hex(digest: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}
