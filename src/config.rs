//! Run configuration loaded from `updates-inbox.toml`.
//!
//! Every field has a default matching the repository layout the applier was
//! written for, so the file is optional. Relative paths are resolved against
//! the repository root. The sandbox itself is not configurable here: loosening
//! it is a code change to [`crate::sandbox::SandboxPolicy`].

use crate::validator::DEFAULT_VALIDATOR_TIMEOUT;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use crate::copy_executor::RollbackMode;

/// File name looked up at the repository root when `--config` is absent.
pub const CONFIG_FILE_NAME: &str = "updates-inbox.toml";

/// Errors raised while loading the configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// Path that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid configuration TOML.
    #[error("invalid config {path}: {source}")]
    Parse {
        /// Path that failed to parse.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: toml::de::Error,
    },
}

/// Settings for the external validator.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ValidatorConfig {
    /// Program and arguments, run from the repository root.
    pub command: Vec<String>,
    /// Seconds to wait before the validator is killed.
    pub timeout_secs: u64,
}

impl ValidatorConfig {
    /// The timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            command: vec![
                "python3".to_owned(),
                "scripts/validate_docs_lifecycle_v1.py".to_owned(),
            ],
            timeout_secs: DEFAULT_VALIDATOR_TIMEOUT.as_secs(),
        }
    }
}

/// Configuration for one run of the applier.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ApplyConfig {
    /// Directory holding pending archives.
    pub inbox_dir: PathBuf,
    /// Directory receiving audit records.
    pub applied_dir: PathBuf,
    /// Directory receiving applied archives.
    pub applied_archives_dir: PathBuf,
    /// Handling of writes made before a failure.
    pub rollback: RollbackMode,
    /// External validator settings.
    pub validator: ValidatorConfig,
}

impl Default for ApplyConfig {
    fn default() -> Self {
        Self {
            inbox_dir: PathBuf::from("workflows/updates-inbox/inbox"),
            applied_dir: PathBuf::from("workflows/updates-inbox/applied"),
            applied_archives_dir: PathBuf::from("workflows/updates-inbox/applied/zips"),
            rollback: RollbackMode::default(),
            validator: ValidatorConfig::default(),
        }
    }
}

impl ApplyConfig {
    /// Load configuration for `repo_root`.
    ///
    /// An explicit `path` must exist. Without one, `updates-inbox.toml` at
    /// the repository root is read when present and defaults apply otherwise.
    /// Relative directories in the result are resolved against `repo_root`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the file cannot be read or parsed.
    pub fn load(repo_root: &Path, path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(explicit) => Self::from_file(explicit)?,
            None => {
                let default_path = repo_root.join(CONFIG_FILE_NAME);
                if default_path.is_file() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        Ok(config.resolved_against(repo_root))
    }

    /// Parse a configuration file without resolving its paths.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Make every relative directory absolute under `repo_root`.
    #[must_use]
    pub fn resolved_against(self, repo_root: &Path) -> Self {
        Self {
            inbox_dir: repo_root.join(self.inbox_dir),
            applied_dir: repo_root.join(self.applied_dir),
            applied_archives_dir: repo_root.join(self.applied_archives_dir),
            ..self
        }
    }
}
