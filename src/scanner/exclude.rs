//! Path-prefix exclusion rules.
//!
//! Rules are plain data: an ordered list of prefixes checked with a
//! "starts-with" test. The walker knows nothing about them; the scan builder
//! applies them to every yielded path.

use std::path::{Path, PathBuf};

/// Runtime device/process trees that never hold user content.
pub const DEFAULT_VIRTUAL_FS: &[&str] = &[
    "/dev",
    "/sys",
    "/proc",
    "/run/user",
    "/run/udev",
    "/run/systemd",
    "/var/lib/flatpak",
];

/// Cache directories relative to the user's home directory.
pub const DEFAULT_CACHE_PATHS: &[&str] = &[
    ".cache/mesa_shader_cache",
    ".cache/thumbnails",
    ".cache/opera/Cache",
    ".cache/opera/Code Cache",
    ".config/opera/Service Worker/CacheStorage",
    ".cache/opera-developer/Cache",
    ".cache/mozilla",
    ".cache/pip",
    ".cache/pypoetry",
    ".cache/shotwell/thumbs",
    ".cache/typescript",
    ".config/Code/CachedData",
    ".config/discord/Cache",
    ".config/discord/Code Cache",
    ".local/share/lutris/runners/wine",
    ".node-gyp",
];

/// Ordered set of excluded path prefixes.
///
/// Matching is component-aware: `/dev` excludes `/dev/null` and `/dev` itself
/// but not `/devices`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionRules {
    prefixes: Vec<PathBuf>,
}

impl ExclusionRules {
    /// Build rules from absolute prefixes, in evaluation order.
    #[must_use]
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<PathBuf>,
    {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    /// Rules that exclude nothing.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Combine virtual filesystem roots with home-relative cache suffixes.
    ///
    /// Cache suffixes are resolved against `home`; when no home directory is
    /// known they are dropped.
    #[must_use]
    pub fn from_parts<S: AsRef<str>>(
        virtual_fs: &[S],
        cache_paths: &[S],
        home: Option<&Path>,
    ) -> Self {
        let mut prefixes: Vec<PathBuf> = virtual_fs
            .iter()
            .map(|p| PathBuf::from(p.as_ref()))
            .collect();
        if let Some(home) = home {
            prefixes.extend(cache_paths.iter().map(|p| home.join(p.as_ref())));
        } else if !cache_paths.is_empty() {
            log::debug!("No home directory known, cache exclusions disabled");
        }
        Self { prefixes }
    }

    /// Built-in defaults for the given home directory.
    #[must_use]
    pub fn defaults(home: Option<&Path>) -> Self {
        Self::from_parts(DEFAULT_VIRTUAL_FS, DEFAULT_CACHE_PATHS, home)
    }

    /// Append a rule at the end of the evaluation order.
    pub fn push(&mut self, prefix: impl Into<PathBuf>) {
        self.prefixes.push(prefix.into());
    }

    /// First rule matching `path`, if any.
    #[must_use]
    pub fn matching_rule(&self, path: &Path) -> Option<&Path> {
        self.prefixes
            .iter()
            .find(|prefix| path.starts_with(prefix))
            .map(PathBuf::as_path)
    }

    /// Whether any rule matches `path`.
    #[must_use]
    pub fn is_excluded(&self, path: &Path) -> bool {
        self.matching_rule(path).is_some()
    }

    /// The configured prefixes in order.
    #[must_use]
    pub fn prefixes(&self) -> &[PathBuf] {
        &self.prefixes
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}
