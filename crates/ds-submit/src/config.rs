//! Commit configuration structures

use serde::{Deserialize, Serialize};

/// What a `confirm_all` call does while another one is still in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrentCommit {
    /// Queue behind the in-flight commit.
    #[default]
    Wait,
    /// Return `CommitOutcome::Skipped` without touching the store.
    Skip,
}

/// Commit configuration (`[commit]` table)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitConfig {
    /// Single-flight policy for overlapping commits
    #[serde(default)]
    pub concurrent: ConcurrentCommit,
}
