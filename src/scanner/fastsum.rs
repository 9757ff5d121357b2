//! Sampled-byte heuristic fingerprint.
//!
//! The fastsum reads `length` single bytes spread evenly across the file and
//! hex-encodes them, so its cost does not depend on file size. Equal fastsums
//! only mean "possibly equal"; the strong hash decides duplication.

use std::fmt::Write as _;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use super::HashError;

/// Number of sampled bytes when no length is configured.
pub const DEFAULT_FASTSUM_LENGTH: usize = 8;

/// Compute the fastsum of the file at `path`.
///
/// The byte range `[0, size)` is cut into `length` slices of width
/// `size / length` (floating point). Slice `i` contributes the byte at
/// `floor(i * size / length)`. The result has exactly `2 * length` lowercase
/// hex characters.
///
/// Returns `Ok(None)` for an empty file: there is nothing to sample and all
/// empty files would share one fingerprint anyway.
///
/// # Errors
///
/// Returns [`HashError`] when the file cannot be opened or read, or when
/// `length` is zero. A file that shrinks between the size check and the
/// sampling surfaces as an I/O error, never as a short fingerprint.
///
/// # Example
///
/// ```no_run
/// use fili::scanner::fastsum;
/// use std::path::Path;
///
/// if let Some(sum) = fastsum(Path::new("photo.jpg"), 8).unwrap() {
///     assert_eq!(sum.len(), 16);
/// }
/// ```
pub fn fastsum(path: &Path, length: usize) -> Result<Option<String>, HashError> {
    if length == 0 {
        return Err(HashError::InvalidLength(length));
    }

    // File handles are always binary in Rust, so offsets are raw byte offsets.
    let mut file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
    let size = file
        .metadata()
        .map_err(|e| HashError::from_io(path, e))?
        .len();

    if size == 0 {
        return Ok(None);
    }

    let partsize = size as f64 / length as f64;
    let mut output = String::with_capacity(length * 2);
    let mut byte = [0u8; 1];

    for i in 0..length {
        let offset = ((i as f64 * partsize).floor() as u64).min(size - 1);
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| HashError::from_io(path, e))?;
        file.read_exact(&mut byte)
            .map_err(|e| HashError::from_io(path, e))?;
        let _ = write!(output, "{:02x}", byte[0]);
    }

    Ok(Some(output))
}
