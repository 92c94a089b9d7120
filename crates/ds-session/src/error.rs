// error.rs — Error types for the staging session.

use thiserror::Error;

use ds_submit::CommitError;
use ds_workspace::SlotKey;

/// Errors that can occur while driving a staging session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A draft validator refused the draft; the store was not touched.
    #[error("draft for {slot} rejected: {}", .violations.join("; "))]
    Rejected {
        slot: SlotKey,
        violations: Vec<String>,
    },

    /// The config file could not be read.
    #[error("I/O error at {path}: {source}")]
    ConfigIo {
        path: String,
        source: std::io::Error,
    },

    /// The config file is not valid TOML for `StagingConfig`.
    #[error("invalid config at {path}: {source}")]
    ConfigParse {
        path: String,
        source: toml::de::Error,
    },

    /// A batch commit failed and the staged state was restored.
    #[error(transparent)]
    Commit(#[from] CommitError),

    /// A notification sink failed (non-fatal, only ever logged).
    #[error("notification error: {0}")]
    Notification(String),
}
