//! "None" adapter - accepts every batch without persisting anything

use async_trait::async_trait;

use crate::adapter::{ApplyAdapter, Result};
use crate::payload::BatchPayload;

/// Adapter that performs no writes.
///
/// Useful when the caller has already applied the batch optimistically to
/// its own data layer and only wants the staging store drained.
pub struct NoneAdapter;

impl NoneAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NoneAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ApplyAdapter for NoneAdapter {
    async fn apply(&self, payload: &BatchPayload) -> Result<()> {
        tracing::debug!(
            slots = payload.slot_count(),
            "NoneAdapter: apply() - no-op"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "none"
    }
}
