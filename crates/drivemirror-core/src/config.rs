//! Configuration management
//!
//! Loads and validates the YAML configuration file. Every field carries a
//! default so a missing or partial file still yields a usable config; the
//! one thing that cannot be defaulted (the OAuth client id) is checked by
//! the command that needs it rather than here.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::node::{ConflictBehavior, MirrorMode};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for DriveMirror.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mirror: MirrorConfig,
    pub polling: PollingConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

/// Mirroring behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Worker count of the traversal executor.
    pub traversal_concurrency: usize,
    /// Worker count of the copy executor.
    pub copy_concurrency: usize,
    /// Folders whose cumulative size is at most this many mebibytes (and
    /// that have no same-named destination folder) are copied as a whole
    /// subtree; larger ones are created empty and recursed into.
    pub whole_folder_threshold_mb: u64,
    /// Conflict directive attached to every copy request.
    pub conflict: ConflictBehavior,
    /// Whether copy jobs are submitted as discovered or after traversal.
    pub mode: MirrorMode,
    /// Opt-in heuristic: treat an authorization error as implicit
    /// completion when the operation had already shown progress and one
    /// refresh attempt did not clear the rejection. Disabled by default;
    /// when disabled such a rejection fails the job.
    pub assume_complete_on_denied_progress: bool,
}

/// Operation poll cadence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Seconds between status polls when the service sends no
    /// `Retry-After` hint. The interval is fixed; there is no backoff.
    pub interval_secs: u64,
}

/// Authentication settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Application (client) id registered for the device-code flow.
    pub client_id: String,
    /// Directory tenant (`common` covers both personal and work accounts).
    pub tenant: String,
    /// Token cache file for the source account. Defaults under the user
    /// config directory when unset.
    pub source_cache_file: Option<PathBuf>,
    /// Token cache file for the destination account.
    pub dest_cache_file: Option<PathBuf>,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum level: trace, debug, info, warn or error.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/drivemirror/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("drivemirror")
            .join("config.yaml")
    }
}

impl AuthConfig {
    /// Resolved token cache path for the source account.
    pub fn source_cache_path(&self) -> PathBuf {
        self.source_cache_file
            .clone()
            .unwrap_or_else(|| default_cache_dir().join("source-account.json"))
    }

    /// Resolved token cache path for the destination account.
    pub fn dest_cache_path(&self) -> PathBuf {
        self.dest_cache_file
            .clone()
            .unwrap_or_else(|| default_cache_dir().join("dest-account.json"))
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("drivemirror")
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

// Config derives Default because all its fields implement Default.

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            traversal_concurrency: 4,
            copy_concurrency: 4,
            whole_folder_threshold_mb: 256,
            conflict: ConflictBehavior::Fail,
            mode: MirrorMode::Interleaved,
            assume_complete_on_denied_progress: false,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { interval_secs: 2 }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            tenant: "common".to_string(),
            source_cache_file: None,
            dest_cache_file: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"mirror.copy_concurrency"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Upper bound on executor worker counts; beyond this the remote service
/// throttles more than the extra workers gain.
const MAX_CONCURRENCY: usize = 64;

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- mirror ---
        for (field, value) in [
            ("mirror.traversal_concurrency", self.mirror.traversal_concurrency),
            ("mirror.copy_concurrency", self.mirror.copy_concurrency),
        ] {
            if value == 0 {
                errors.push(ValidationError {
                    field: field.into(),
                    message: "must be greater than 0".into(),
                });
            } else if value > MAX_CONCURRENCY {
                errors.push(ValidationError {
                    field: field.into(),
                    message: format!("must be at most {MAX_CONCURRENCY}"),
                });
            }
        }

        // --- polling ---
        if self.polling.interval_secs == 0 {
            errors.push(ValidationError {
                field: "polling.interval_secs".into(),
                message: "must be greater than 0".into(),
            });
        } else if self.polling.interval_secs > 300 {
            errors.push(ValidationError {
                field: "polling.interval_secs".into(),
                message: "must be at most 300".into(),
            });
        }

        // --- auth ---
        if self.auth.tenant.is_empty() {
            errors.push(ValidationError {
                field: "auth.tenant".into(),
                message: "must not be empty".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "must be one of {}, got '{}'",
                    VALID_LOG_LEVELS.join(", "),
                    self.logging.level
                ),
            });
        }

        errors
    }
}
