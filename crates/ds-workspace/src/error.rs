// error.rs — Error types for the workspace subsystem.

use thiserror::Error;

/// Errors that can occur while handling slot identities.
///
/// Reducer transitions themselves never fail: an invalid slot reference
/// leaves the state unchanged instead.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// A canonical slot key string did not have the `<entity>|<date>` shape.
    #[error("invalid slot key '{0}': expected '<entity>|<date>'")]
    InvalidSlotKey(String),
}
