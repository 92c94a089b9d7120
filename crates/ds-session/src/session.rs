// session.rs — StagingSession: the staging store wired to its collaborators.
//
// A session owns one StagingState behind a mutex and is handed everything
// else it needs at construction time:
//   - a BaseProvider, read when a slot is first staged
//   - a StagingConfig (match strategy, count policy, commit policy, logging)
//   - optional draft validators and notification sinks
//
// Every mutating call runs exactly one transition under the lock, then
// releases it before dispatching events. Commits go through a
// BatchCommitter, which enforces the single-flight policy and restores the
// pre-commit state on failure.

use std::collections::BTreeMap;
use std::sync::Mutex;

use ds_changeset::Record;
use ds_submit::{
    build_batch_payload, lock_state, ApplyAdapter, BatchCommitter, BatchPayload, CommitError,
    CommitOutcome,
};
use ds_workspace::{
    BaseProvider, DateKey, EntityId, SlotKey, StagedEntry, StagedOp, StagingAction,
    StagingState, StatusTag, Transition,
};

use crate::config::StagingConfig;
use crate::error::SessionError;
use crate::events::{EventDispatcher, NotificationSink, StagingEvent};
use crate::selectors::{self, StagedItem, StatusMap};
use crate::validation::{DraftValidator, ValidatorSet};

/// A staging store bound to its base provider.
///
/// `Send + Sync` whenever `P` is, so one session can be shared behind an
/// `Arc` between the code that stages edits and the code that commits.
pub struct StagingSession<P> {
    provider: P,
    config: StagingConfig,
    state: Mutex<StagingState>,
    committer: BatchCommitter,
    validators: ValidatorSet,
    dispatcher: EventDispatcher,
}

impl<P: BaseProvider> StagingSession<P> {
    /// Create a session with the default configuration.
    pub fn new(provider: P) -> Self {
        Self::with_config(provider, StagingConfig::default())
    }

    pub fn with_config(provider: P, config: StagingConfig) -> Self {
        let committer = BatchCommitter::new(config.commit.clone())
            .with_match_strategy(config.diff.match_strategy);
        Self {
            provider,
            config,
            state: Mutex::new(StagingState::new()),
            committer,
            validators: ValidatorSet::new(),
            dispatcher: EventDispatcher::new(),
        }
    }

    /// Add a notification sink and return self (builder pattern).
    pub fn with_sink(mut self, sink: impl NotificationSink + 'static) -> Self {
        self.add_sink(Box::new(sink));
        self
    }

    /// Add a draft validator and return self (builder pattern).
    pub fn with_validator(mut self, validator: impl DraftValidator + 'static) -> Self {
        self.add_validator(Box::new(validator));
        self
    }

    pub fn add_sink(&mut self, sink: Box<dyn NotificationSink>) {
        self.dispatcher.add_sink(sink);
    }

    pub fn add_validator(&mut self, validator: Box<dyn DraftValidator>) {
        self.validators.push(validator);
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn config(&self) -> &StagingConfig {
        &self.config
    }

    // ── Staging ─────────────────────────────────────────────────

    /// Stage `draft` for a slot against the provider's current records.
    ///
    /// `None` stages the deletion of the whole slot. The provider is only
    /// consulted to capture the base of a slot that isn't staged yet; an
    /// already staged slot keeps its frozen base.
    pub fn stage_draft(
        &self,
        entity_id: &str,
        date_key: &str,
        draft: Option<Vec<Record>>,
    ) -> Transition {
        let slot = SlotKey::new(entity_id, date_key);
        if !slot.is_valid() {
            tracing::debug!(entity_id, date_key, "stage_draft ignored: invalid slot");
            return Transition::Unchanged;
        }
        let base = self.provider.base_records(entity_id, date_key);
        self.run(StagingAction::Upsert {
            slot,
            base: Some(base),
            draft,
        })
    }

    /// Like `stage_draft`, but run every validator first.
    ///
    /// Validators see the slot's frozen base when it is already staged,
    /// otherwise the provider's records. Any violation rejects the draft
    /// and leaves the store untouched. The base lookup, the validators and
    /// the upsert all run under one state lock, so validators must not call
    /// back into the session.
    pub fn stage_checked(
        &self,
        entity_id: &str,
        date_key: &str,
        draft: Option<Vec<Record>>,
    ) -> Result<Transition, SessionError> {
        let slot = SlotKey::new(entity_id, date_key);
        if !slot.is_valid() {
            tracing::debug!(entity_id, date_key, "stage_checked ignored: invalid slot");
            return Ok(Transition::Unchanged);
        }
        let (name, transition) = {
            let mut state = lock_state(&self.state);
            let base = match state.get(entity_id, date_key) {
                Some(entry) => entry.base.clone().unwrap_or_default(),
                None => self.provider.base_records(entity_id, date_key),
            };
            let violations = self.validators.check(&slot, &base, draft.as_deref());
            if !violations.is_empty() {
                tracing::debug!(%slot, violations = violations.len(), "draft rejected by validators");
                return Err(SessionError::Rejected { slot, violations });
            }
            let action = StagingAction::Upsert {
                slot,
                base: Some(base),
                draft,
            };
            let name = action.name();
            (name, self.apply_locked(&mut state, action))
        };
        self.notify(name, &transition);
        Ok(transition)
    }

    /// Stage with an explicit base candidate. The candidate is ignored
    /// when the slot already has a frozen base.
    pub fn upsert(
        &self,
        entity_id: &str,
        date_key: &str,
        base: Option<Vec<Record>>,
        draft: Option<Vec<Record>>,
    ) -> Transition {
        self.run(StagingAction::Upsert {
            slot: SlotKey::new(entity_id, date_key),
            base,
            draft,
        })
    }

    /// Drop a slot unconditionally.
    pub fn discard_entry(&self, entity_id: &str, date_key: &str) -> Transition {
        self.run(StagingAction::Delete {
            slot: SlotKey::new(entity_id, date_key),
        })
    }

    /// Revert a slot's draft to its base (removes it if the base is empty).
    pub fn reset_entry(&self, entity_id: &str, date_key: &str) -> Transition {
        self.run(StagingAction::Reset {
            slot: SlotKey::new(entity_id, date_key),
        })
    }

    /// Forget the edit to a slot.
    pub fn rollback_entry(&self, entity_id: &str, date_key: &str) -> Transition {
        self.run(StagingAction::Rollback {
            slot: SlotKey::new(entity_id, date_key),
        })
    }

    pub fn discard_all(&self) -> Transition {
        self.run(StagingAction::DiscardAll)
    }

    // ── Commit ──────────────────────────────────────────────────

    /// Commit every pending slot through `adapter`, all or nothing.
    ///
    /// On failure the store is back to exactly what it was before this
    /// call, and the adapter's error is returned.
    pub async fn confirm_all<A>(&self, adapter: &A) -> Result<CommitOutcome, SessionError>
    where
        A: ApplyAdapter + ?Sized,
    {
        match self.committer.confirm_all(&self.state, adapter).await {
            Ok(outcome) => {
                if let CommitOutcome::Applied(receipt) = &outcome {
                    self.dispatcher.dispatch(&StagingEvent::commit_applied(
                        receipt.batch_id,
                        &receipt.adapter,
                        receipt.summary,
                    ));
                }
                Ok(outcome)
            }
            Err(err) => {
                let CommitError::Apply {
                    batch_id,
                    adapter,
                    restored_slots,
                    source,
                } = &err;
                self.dispatcher.dispatch(&StagingEvent::commit_rolled_back(
                    *batch_id,
                    adapter,
                    *restored_slots,
                    &source.to_string(),
                ));
                Err(err.into())
            }
        }
    }

    /// Whether a commit is waiting on its adapter right now.
    pub fn is_commit_in_flight(&self) -> bool {
        self.committer.is_in_flight()
    }

    /// The payload a commit would send right now.
    pub fn build_batch_payload(&self) -> BatchPayload {
        build_batch_payload(&lock_state(&self.state))
    }

    // ── Selectors ───────────────────────────────────────────────

    /// Owned copy of the whole store.
    pub fn snapshot(&self) -> StagingState {
        lock_state(&self.state).clone()
    }

    /// Owned copy of one entry.
    pub fn staged_entry(&self, entity_id: &str, date_key: &str) -> Option<StagedEntry> {
        lock_state(&self.state).get(entity_id, date_key).cloned()
    }

    pub fn base_view(&self, entity_id: &str, date_key: &str) -> Vec<Record> {
        selectors::base_view(&self.provider, entity_id, date_key)
    }

    pub fn merged_view(&self, entity_id: &str, date_key: &str) -> Vec<Record> {
        selectors::merged_view(&lock_state(&self.state), &self.provider, entity_id, date_key)
    }

    pub fn status_tag(&self, entity_id: &str, date_key: &str) -> Option<StatusTag> {
        selectors::status_tag(&lock_state(&self.state), entity_id, date_key)
    }

    pub fn build_status_map(&self) -> StatusMap {
        selectors::build_status_map(&lock_state(&self.state))
    }

    /// Pending slots, noop entries excluded unless `selectors.count_noop`.
    pub fn count(&self) -> usize {
        selectors::count(&lock_state(&self.state), self.config.selectors.count_noop)
    }

    /// Staged slot keys in insertion order.
    pub fn order(&self) -> Vec<SlotKey> {
        lock_state(&self.state).order().to_vec()
    }

    pub fn visible_status_map<'a, I>(
        &self,
        visible_dates: I,
        entity_id: Option<&str>,
    ) -> BTreeMap<DateKey, StatusTag>
    where
        I: IntoIterator<Item = &'a str>,
    {
        selectors::visible_status_map(&lock_state(&self.state), visible_dates, entity_id)
    }

    pub fn merged_entity_view(
        &self,
        entity_id: &str,
        base_days: &BTreeMap<DateKey, Vec<Record>>,
    ) -> BTreeMap<DateKey, Vec<Record>> {
        selectors::merged_entity_view(&lock_state(&self.state), entity_id, base_days)
    }

    pub fn staged_items(&self) -> Vec<StagedItem> {
        selectors::staged_items(&lock_state(&self.state), self.config.diff.match_strategy)
    }

    /// Staged entity ids, in the order their first slot was staged.
    pub fn staged_entities(&self) -> Vec<EntityId> {
        let state = lock_state(&self.state);
        let mut out: Vec<EntityId> = Vec::new();
        for key in state.order() {
            if !out.contains(&key.entity_id) {
                out.push(key.entity_id.clone());
            }
        }
        out
    }

    // ── Internals ───────────────────────────────────────────────

    fn run(&self, action: StagingAction) -> Transition {
        let name = action.name();
        let transition = self.apply_locked(&mut lock_state(&self.state), action);
        self.notify(name, &transition);
        transition
    }

    fn apply_locked(&self, state: &mut StagingState, action: StagingAction) -> Transition {
        let name = action.name();
        let transition = state.apply(action);
        if self.config.logging.trace_transitions {
            trace_transition(name, &transition, state);
        }
        transition
    }

    // Called with the state lock released, so sinks may read the session.
    fn notify(&self, action: &str, transition: &Transition) {
        if let Some(event) = event_for(action, transition) {
            self.dispatcher.dispatch(&event);
        }
    }
}

fn trace_transition(action: &str, transition: &Transition, state: &StagingState) {
    let slot = match transition {
        Transition::Staged { slot, .. }
        | Transition::Settled { slot }
        | Transition::Reverted { slot }
        | Transition::Removed { slot } => slot,
        other => {
            tracing::debug!(action, transition = ?other, slots = state.len(), "staging transition");
            return;
        }
    };
    match state.get(&slot.entity_id, &slot.date_key) {
        Some(entry) => tracing::debug!(
            action,
            entity_id = %entry.entity_id,
            date_key = %entry.date_key,
            op = %entry.op,
            previous_op = ?entry.previous_op,
            base_len = entry.base_records().len(),
            draft_len = entry.draft.as_ref().map(Vec::len),
            dirty = entry.dirty,
            "staging transition"
        ),
        None => tracing::debug!(
            action,
            entity_id = %slot.entity_id,
            date_key = %slot.date_key,
            "staging transition: slot removed"
        ),
    }
}

fn event_for(action: &str, transition: &Transition) -> Option<StagingEvent> {
    let event = match transition {
        Transition::Unchanged | Transition::Restored { .. } => return None,
        Transition::Staged { slot, op, created } => StagingEvent::slot_staged(slot, *op, *created),
        Transition::Settled { slot } => {
            StagingEvent::slot_staged(slot, StagedOp::Noop, false)
        }
        Transition::Reverted { slot } => StagingEvent::slot_reset(slot, false),
        Transition::Removed { slot } => match action {
            "reset" => StagingEvent::slot_reset(slot, true),
            "rollback" => StagingEvent::slot_rolled_back(slot),
            _ => StagingEvent::slot_removed(slot),
        },
        Transition::Cleared { slots } => StagingEvent::all_discarded(*slots),
    };
    Some(event)
}
