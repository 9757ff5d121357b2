//! Layered application configuration.
//!
//! Values are merged with figment, later layers winning:
//!
//! 1. built-in defaults ([`Config::default`])
//! 2. a TOML file (`--config <path>`, else `config.toml` in the platform
//!    config directory, if present)
//! 3. environment variables prefixed `FILI_`, nested keys split on `__`
//!    (e.g. `FILI_EXCLUSIONS__IGNORE_CACHE=false`)
//! 4. command-line flags ([`ConfigOverrides`])
//!
//! The result is resolved once in the binary and passed down explicitly.

use std::path::{Path, PathBuf};

use directories::{BaseDirs, ProjectDirs};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::scanner::exclude::{DEFAULT_CACHE_PATHS, DEFAULT_VIRTUAL_FS};
use crate::scanner::{ExclusionRules, DEFAULT_FASTSUM_LENGTH};

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "FILI_";

/// File name of the default index database in the home directory.
pub const DEFAULT_DATABASE_NAME: &str = ".fili.db";

/// Errors raised while resolving configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// A layer could not be read or did not match the expected shape.
    #[error("Invalid configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    /// A value is out of its allowed range.
    #[error("Invalid configuration value for '{key}': {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Exclusion rule data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExclusionConfig {
    /// Absolute pseudo-filesystem prefixes, in evaluation order.
    pub virtual_fs: Vec<String>,
    /// Cache directories relative to the home directory.
    pub cache_paths: Vec<String>,
    /// Apply `cache_paths`.
    pub ignore_cache: bool,
    /// Additional absolute prefixes, evaluated last.
    pub extra: Vec<PathBuf>,
}

impl Default for ExclusionConfig {
    fn default() -> Self {
        Self {
            virtual_fs: DEFAULT_VIRTUAL_FS.iter().map(ToString::to_string).collect(),
            cache_paths: DEFAULT_CACHE_PATHS.iter().map(ToString::to_string).collect(),
            ignore_cache: true,
            extra: Vec::new(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Index database file.
    pub database: PathBuf,
    /// Worker threads fingerprinting one batch.
    pub io_threads: usize,
    /// Files fingerprinted and committed per batch.
    pub batch_size: usize,
    /// Bytes sampled by the fastsum.
    pub fastsum_length: usize,
    /// Follow symbolic links while walking.
    pub follow_symlinks: bool,
    pub exclusions: ExclusionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: default_database_path(),
            io_threads: 4,
            batch_size: 256,
            fastsum_length: DEFAULT_FASTSUM_LENGTH,
            follow_symlinks: false,
            exclusions: ExclusionConfig::default(),
        }
    }
}

/// Values given on the command line. `None` leaves the lower layer alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub io_threads: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fastsum_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_symlinks: Option<bool>,
}

impl Config {
    /// Build the layered figment without extracting it.
    ///
    /// An explicit `config_file` must exist; the default file is optional.
    #[must_use]
    pub fn figment(config_file: Option<&Path>, overrides: &ConfigOverrides) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        match config_file {
            Some(path) => figment = figment.merge(Toml::file_exact(path)),
            None => {
                if let Some(path) = default_config_path() {
                    log::trace!("Looking for configuration in {}", path.display());
                    figment = figment.merge(Toml::file(path));
                }
            }
        }

        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(Serialized::defaults(overrides))
    }

    /// Resolve and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a layer is malformed or a value is out of
    /// range.
    pub fn load(config_file: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let config: Self = Self::figment(config_file, overrides)
            .extract()
            .map_err(Box::new)?;
        config.validate()?;
        log::debug!("Using index database {}", config.database.display());
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("io_threads", self.io_threads),
            ("batch_size", self.batch_size),
            ("fastsum_length", self.fastsum_length),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    key,
                    reason: "must be at least 1".to_string(),
                });
            }
        }
        if let Some(relative) = self.exclusions.extra.iter().find(|p| !p.is_absolute()) {
            return Err(ConfigError::Invalid {
                key: "exclusions.extra",
                reason: format!("'{}' is not an absolute path", relative.display()),
            });
        }
        Ok(())
    }

    /// Exclusion rules for a walk, resolving cache paths against `home`.
    #[must_use]
    pub fn exclusion_rules(&self, home: Option<&Path>) -> ExclusionRules {
        let cache_paths: &[String] = if self.exclusions.ignore_cache {
            &self.exclusions.cache_paths
        } else {
            &[]
        };
        let mut rules = ExclusionRules::from_parts(&self.exclusions.virtual_fs, cache_paths, home);
        for extra in &self.exclusions.extra {
            rules.push(extra.clone());
        }
        rules
    }
}

/// Platform configuration file (`config.toml` under the fili config dir).
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("org", "fili", "fili").map(|dirs| dirs.config_dir().join("config.toml"))
}

/// `~/.fili.db`, or `.fili.db` in the working directory without a home.
#[must_use]
pub fn default_database_path() -> PathBuf {
    home_dir().map_or_else(
        || PathBuf::from(DEFAULT_DATABASE_NAME),
        |home| home.join(DEFAULT_DATABASE_NAME),
    )
}

/// The current user's home directory.
#[must_use]
pub fn home_dir() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf())
}
