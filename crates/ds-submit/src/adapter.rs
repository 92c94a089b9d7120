//! Core ApplyAdapter trait and error types

use std::future::Future;

use async_trait::async_trait;
use thiserror::Error;

use crate::payload::BatchPayload;

/// Errors an adapter reports when it could not persist a batch.
///
/// Any partial failure must be reported as an error: the committer has no
/// notion of partial success and restores the whole batch.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("apply rejected: {0}")]
    Rejected(String),

    /// The caller cancelled the apply; handled exactly like a rejection.
    #[error("apply cancelled")]
    Cancelled,

    #[error("{adapter} backend error: {source}")]
    Backend {
        adapter: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

pub type Result<T> = std::result::Result<T, ApplyError>;

/// The persistence boundary of a commit.
///
/// The staging engine never writes anywhere itself. On commit it hands the
/// pending writes to an adapter and trusts its verdict: `Ok` means the
/// whole payload is durable, `Err` means none of it should be considered
/// applied.
#[async_trait]
pub trait ApplyAdapter: Send + Sync {
    /// Persist every update in `payload`, all or nothing.
    async fn apply(&self, payload: &BatchPayload) -> Result<()>;

    /// Adapter display name (for logs and receipts).
    fn name(&self) -> &str;
}

/// Adapter wrapping an async closure.
///
/// The closure takes the payload by value because its future is `'static`,
/// so every `apply` deep-clones the whole batch. Implement `ApplyAdapter`
/// directly when that copy matters.
///
/// ```ignore
/// let adapter = FnAdapter::new("remote", |payload| async move {
///     client.save(payload).await.map_err(|e| ApplyError::Rejected(e.to_string()))
/// });
/// ```
pub struct FnAdapter<F> {
    name: String,
    apply_fn: F,
}

impl<F> FnAdapter<F> {
    pub fn new(name: impl Into<String>, apply_fn: F) -> Self {
        Self {
            name: name.into(),
            apply_fn,
        }
    }
}

#[async_trait]
impl<F, Fut> ApplyAdapter for FnAdapter<F>
where
    F: Fn(BatchPayload) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn apply(&self, payload: &BatchPayload) -> Result<()> {
        (self.apply_fn)(payload.clone()).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}
