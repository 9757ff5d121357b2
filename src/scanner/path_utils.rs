//! Path helpers for scan roots and stored paths.
//!
//! Stored paths are absolute. These helpers normalize scan roots, derive
//! default scan names, compute root-relative paths for cross-machine
//! comparison, and convert paths to the raw bytes kept in the index.

use std::borrow::Cow;
use std::io;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Local};

/// Name token used when the root has no final component (e.g. `/`).
pub const ROOT_NAME_TOKEN: &str = "root";

/// Make `root` absolute and drop trailing separators.
///
/// `/` stays `/`. Symlinks are not resolved, so the stored root is the path
/// the user asked for.
///
/// # Errors
///
/// Returns an error if the current directory cannot be determined for a
/// relative root.
pub fn normalize_root(root: &Path) -> io::Result<PathBuf> {
    let absolute = std::path::absolute(root)?;
    Ok(absolute.components().collect())
}

/// Default scan name: final root component and the creation minute.
///
/// ```
/// use chrono::{Local, TimeZone};
/// use fili::scanner::path_utils::default_scan_name;
/// use std::path::Path;
///
/// let at = Local.with_ymd_and_hms(2015, 5, 31, 18, 6, 54).unwrap();
/// assert_eq!(default_scan_name(Path::new("/home/me/photos"), &at), "photos-201505311806");
/// assert_eq!(default_scan_name(Path::new("/"), &at), "root-201505311806");
/// ```
#[must_use]
pub fn default_scan_name(root: &Path, created_at: &DateTime<Local>) -> String {
    let directory = match root.components().next_back() {
        Some(Component::Normal(name)) => name.to_string_lossy(),
        _ => Cow::Borrowed(ROOT_NAME_TOKEN),
    };
    format!("{}-{}", directory, created_at.format("%Y%m%d%H%M"))
}

/// Path of `path` relative to `root`.
///
/// Accepts `root` with or without a trailing separator. If `path` does not
/// lie under `root` it is returned unchanged.
///
/// ```
/// use fili::scanner::path_utils::relativize;
/// use std::path::Path;
///
/// let path = Path::new("/path/to/file/here");
/// assert_eq!(relativize(path, Path::new("/path/to")), Path::new("file/here"));
/// assert_eq!(relativize(path, Path::new("/path/to/")), Path::new("file/here"));
/// assert_eq!(relativize(path, Path::new("/something/totally/different")), path);
/// ```
#[must_use]
pub fn relativize<'a>(path: &'a Path, root: &Path) -> &'a Path {
    path.strip_prefix(root).unwrap_or(path)
}

/// Raw bytes of a path, as kept in the index.
///
/// On Unix this is lossless for any filename. Elsewhere paths are stored as
/// UTF-8.
#[must_use]
pub fn path_to_bytes(path: &Path) -> Cow<'_, [u8]> {
    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;
        Cow::Borrowed(path.as_os_str().as_bytes())
    }
    #[cfg(not(unix))]
    {
        match path.to_string_lossy() {
            Cow::Borrowed(s) => Cow::Borrowed(s.as_bytes()),
            Cow::Owned(s) => Cow::Owned(s.into_bytes()),
        }
    }
}

/// Inverse of [`path_to_bytes`].
#[must_use]
pub fn path_from_bytes(bytes: Vec<u8>) -> PathBuf {
    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStringExt;
        PathBuf::from(std::ffi::OsString::from_vec(bytes))
    }
    #[cfg(not(unix))]
    {
        PathBuf::from(String::from_utf8_lossy(&bytes).into_owned())
    }
}
