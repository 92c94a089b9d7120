//! Staging configuration structures

use std::path::Path;

use serde::{Deserialize, Serialize};

use ds_changeset::MatchStrategy;
use ds_submit::CommitConfig;

use crate::error::SessionError;

/// Top-level staging configuration, usually from `staging.toml`.
///
/// Every table is optional; a missing table or key takes its default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StagingConfig {
    /// Diff classification settings
    #[serde(default)]
    pub diff: DiffConfig,

    /// Selector settings
    #[serde(default)]
    pub selectors: SelectorConfig,

    /// Batch commit settings
    #[serde(default)]
    pub commit: CommitConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Diff configuration (`[diff]` table)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiffConfig {
    /// How records are paired: "id_or_position", "positional" or "id_only"
    #[serde(default)]
    pub match_strategy: MatchStrategy,
}

/// Selector configuration (`[selectors]` table)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Include noop entries in `count()`. Default: false.
    #[serde(default)]
    pub count_noop: bool,
}

/// Logging configuration (`[logging]` table)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Emit a debug event for every staging transition. Default: false.
    #[serde(default)]
    pub trace_transitions: bool,
}

impl StagingConfig {
    /// Load staging config from a TOML file.
    pub fn load(path: &Path) -> Result<Self, SessionError> {
        let content = std::fs::read_to_string(path).map_err(|source| SessionError::ConfigIo {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| SessionError::ConfigParse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Parse staging config from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, SessionError> {
        toml::from_str(content).map_err(|source| SessionError::ConfigParse {
            path: "<inline>".to_string(),
            source,
        })
    }

    /// Try to load config, returning default if the file is missing or invalid
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!(error = %e, "using default staging config");
                Self::default()
            }
        }
    }
}
