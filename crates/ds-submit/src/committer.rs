// committer.rs — All-or-nothing batch commit.
//
// A commit runs in four steps:
//   1. snapshot the staging state and build the payload from it
//   2. clear the store optimistically (readers see the cleared state while
//      the batch is in flight)
//   3. hand the payload to the ApplyAdapter
//   4. on error, put the snapshot back exactly as it was and return the error
//
// Steps 1 and 2 happen under a single lock of the state, so no transition
// can slip in between the snapshot and the clear. Only one commit runs at
// a time: a second caller either queues or is told to skip (CommitConfig).
// Dropping an in-flight commit future counts as a rejection and restores
// the snapshot as well.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use ds_changeset::MatchStrategy;
use ds_workspace::{StagingAction, StagingState};

use crate::adapter::{ApplyAdapter, ApplyError};
use crate::config::{CommitConfig, ConcurrentCommit};
use crate::payload::{build_batch_payload, CommitSummary};

/// A failed commit. By the time the caller sees this, the staging store
/// holds exactly what it held before `confirm_all` was called.
#[derive(Debug, Error)]
pub enum CommitError {
    #[error("batch {batch_id} rejected by '{adapter}' ({restored_slots} staged slots restored): {source}")]
    Apply {
        batch_id: Uuid,
        adapter: String,
        restored_slots: usize,
        #[source]
        source: ApplyError,
    },
}

/// Proof of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitReceipt {
    pub batch_id: Uuid,
    pub adapter: String,
    pub entities: usize,
    pub slots: usize,
    pub summary: CommitSummary,
}

/// How a `confirm_all` call ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Nothing was staged; the adapter was not called.
    Empty,
    /// Another commit was in flight and the policy is `Skip`.
    Skipped,
    /// The adapter accepted the batch and the store is empty.
    Applied(CommitReceipt),
}

/// Lock the shared staging state.
///
/// A poisoned lock is recovered: transitions compute their result before
/// writing it back, so the inner state is always a valid one.
pub fn lock_state(state: &Mutex<StagingState>) -> MutexGuard<'_, StagingState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

// Holds the pre-commit snapshot until the commit settles. If it is dropped
// while still armed (the commit future was cancelled), the snapshot goes
// back into the store.
struct PendingCommit<'a> {
    state: &'a Mutex<StagingState>,
    previous: Option<StagingState>,
}

impl<'a> PendingCommit<'a> {
    fn arm(state: &'a Mutex<StagingState>, previous: StagingState) -> Self {
        Self {
            state,
            previous: Some(previous),
        }
    }

    fn disarm(mut self) {
        self.previous = None;
    }

    fn roll_back(mut self) -> usize {
        match self.previous.take() {
            Some(previous) => restore(self.state, previous),
            None => 0,
        }
    }
}

impl Drop for PendingCommit<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            let slots = restore(self.state, previous);
            tracing::warn!(slots, "commit abandoned before the adapter settled; staged state restored");
        }
    }
}

fn restore(state: &Mutex<StagingState>, previous: StagingState) -> usize {
    let mut guard = lock_state(state);
    guard.apply(StagingAction::BatchConfirmRollback { previous });
    guard.len()
}

/// Drains the staging store into an ApplyAdapter, one batch at a time.
pub struct BatchCommitter {
    config: CommitConfig,
    match_strategy: MatchStrategy,
    in_flight: tokio::sync::Mutex<()>,
}

impl BatchCommitter {
    pub fn new(config: CommitConfig) -> Self {
        Self {
            config,
            match_strategy: MatchStrategy::default(),
            in_flight: tokio::sync::Mutex::new(()),
        }
    }

    /// Strategy used to classify slots in the receipt summary.
    pub fn with_match_strategy(mut self, strategy: MatchStrategy) -> Self {
        self.match_strategy = strategy;
        self
    }

    pub fn config(&self) -> &CommitConfig {
        &self.config
    }

    /// Whether a commit is currently waiting on its adapter.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.try_lock().is_err()
    }

    /// Commit everything pending in `state` through `adapter`.
    pub async fn confirm_all<A>(
        &self,
        state: &Mutex<StagingState>,
        adapter: &A,
    ) -> Result<CommitOutcome, CommitError>
    where
        A: ApplyAdapter + ?Sized,
    {
        let _flight = match self.config.concurrent {
            ConcurrentCommit::Wait => self.in_flight.lock().await,
            ConcurrentCommit::Skip => match self.in_flight.try_lock() {
                Ok(guard) => guard,
                Err(_) => {
                    tracing::debug!("commit already in flight, skipping");
                    return Ok(CommitOutcome::Skipped);
                }
            },
        };

        let (previous, payload, summary) = {
            let mut guard = lock_state(state);
            if guard.is_empty() {
                tracing::debug!("nothing staged, commit is a no-op");
                return Ok(CommitOutcome::Empty);
            }
            let previous = guard.clone();
            let payload = build_batch_payload(&guard);
            let summary = CommitSummary::of_state(&guard, self.match_strategy);
            guard.apply(StagingAction::BatchConfirmSuccess);
            (previous, payload, summary)
        };

        let batch_id = Uuid::new_v4();
        let pending = PendingCommit::arm(state, previous);
        tracing::info!(
            %batch_id,
            adapter = adapter.name(),
            entities = payload.entity_count(),
            slots = payload.slot_count(),
            "applying staged batch"
        );

        match adapter.apply(&payload).await {
            Ok(()) => {
                pending.disarm();
                tracing::info!(%batch_id, "staged batch applied");
                Ok(CommitOutcome::Applied(CommitReceipt {
                    batch_id,
                    adapter: adapter.name().to_string(),
                    entities: payload.entity_count(),
                    slots: payload.slot_count(),
                    summary,
                }))
            }
            Err(source) => {
                let restored_slots = pending.roll_back();
                tracing::warn!(%batch_id, error = %source, restored_slots, "staged batch rejected, rolled back");
                Err(CommitError::Apply {
                    batch_id,
                    adapter: adapter.name().to_string(),
                    restored_slots,
                    source,
                })
            }
        }
    }
}

impl Default for BatchCommitter {
    fn default() -> Self {
        Self::new(CommitConfig::default())
    }
}
