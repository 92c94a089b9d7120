// staging.rs — The staging store: state plus its transition function.
//
// StagingState holds every staged entry, grouped by entity, plus the
// insertion order of their slot keys. `apply()` is the only way to change
// it. Transitions are synchronous, never look at the clock or do I/O, and
// never fail: an action that makes no sense for the current state (unknown
// slot, empty entity id) leaves the state untouched and reports
// `Transition::Unchanged`.
//
// Lifecycle of a slot:
//   absent --Upsert--> staged (create/update/delete)
//   staged --Upsert equal to base--> noop (kept, not removed)
//   staged --Reset--> reverted (draft = base, clean) | absent (empty base)
//   staged --Rollback/Delete--> absent
//   any    --DiscardAll/BatchConfirmSuccess--> absent

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use ds_changeset::record::clone_records;
use ds_changeset::semantic::{equal, hash_opt};
use ds_changeset::Record;

use crate::entry::{EntryHashes, StagedEntry, StagedOp};
use crate::slot::{DateKey, EntityId, SlotKey};

/// A request to change the staging store.
#[derive(Debug, Clone, PartialEq)]
pub enum StagingAction {
    /// Stage `draft` for a slot. `base` is only captured if the slot is not
    /// staged yet; afterwards the first captured base is reused.
    Upsert {
        slot: SlotKey,
        base: Option<Vec<Record>>,
        draft: Option<Vec<Record>>,
    },
    /// Drop a slot unconditionally (programmatic cleanup).
    Delete { slot: SlotKey },
    /// Revert a slot's draft to its base.
    Reset { slot: SlotKey },
    /// Forget the edit to a slot ever happened.
    Rollback { slot: SlotKey },
    /// Empty the store.
    DiscardAll,
    /// Empty the store after a successful commit.
    BatchConfirmSuccess,
    /// Put back a snapshot taken before an optimistic clear.
    BatchConfirmRollback { previous: StagingState },
}

impl StagingAction {
    /// Short action name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            StagingAction::Upsert { .. } => "upsert",
            StagingAction::Delete { .. } => "delete",
            StagingAction::Reset { .. } => "reset",
            StagingAction::Rollback { .. } => "rollback",
            StagingAction::DiscardAll => "discard_all",
            StagingAction::BatchConfirmSuccess => "batch_confirm_success",
            StagingAction::BatchConfirmRollback { .. } => "batch_confirm_rollback",
        }
    }
}

/// What a transition did, for logging and event dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The state is exactly what it was before.
    Unchanged,
    /// A slot now carries a pending change.
    Staged {
        slot: SlotKey,
        op: StagedOp,
        created: bool,
    },
    /// An existing slot's draft became equal to its base; kept as a noop.
    Settled { slot: SlotKey },
    /// A slot's draft was reverted to its base and kept.
    Reverted { slot: SlotKey },
    /// A slot left the store.
    Removed { slot: SlotKey },
    /// The whole store was emptied.
    Cleared { slots: usize },
    /// A previous snapshot was put back.
    Restored { slots: usize },
}

/// The staging store's state.
///
/// Invariant: a slot is in `entries` iff its key is in `order`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StagingState {
    entries: BTreeMap<EntityId, BTreeMap<DateKey, StagedEntry>>,
    order: Vec<SlotKey>,
}

impl StagingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries grouped by entity, then by day.
    pub fn entries(&self) -> &BTreeMap<EntityId, BTreeMap<DateKey, StagedEntry>> {
        &self.entries
    }

    /// Slot keys in the order they were first staged.
    pub fn order(&self) -> &[SlotKey] {
        &self.order
    }

    pub fn get(&self, entity_id: &str, date_key: &str) -> Option<&StagedEntry> {
        self.entries.get(entity_id)?.get(date_key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of staged slots, noop entries included.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Entries in staging order.
    pub fn iter(&self) -> impl Iterator<Item = &StagedEntry> + '_ {
        self.order
            .iter()
            .filter_map(move |key| self.get(&key.entity_id, &key.date_key))
    }

    /// Run one transition.
    pub fn apply(&mut self, action: StagingAction) -> Transition {
        match action {
            StagingAction::Upsert { slot, base, draft } => self.upsert(slot, base, draft),
            StagingAction::Delete { slot } | StagingAction::Rollback { slot } => {
                self.remove(&slot)
            }
            StagingAction::Reset { slot } => self.reset(slot),
            StagingAction::DiscardAll | StagingAction::BatchConfirmSuccess => {
                let slots = self.order.len();
                *self = StagingState::default();
                Transition::Cleared { slots }
            }
            StagingAction::BatchConfirmRollback { previous } => {
                *self = previous;
                Transition::Restored {
                    slots: self.order.len(),
                }
            }
        }
    }

    fn upsert(
        &mut self,
        slot: SlotKey,
        base: Option<Vec<Record>>,
        draft: Option<Vec<Record>>,
    ) -> Transition {
        if !slot.is_valid() {
            return Transition::Unchanged;
        }
        let existing = self.get(&slot.entity_id, &slot.date_key).cloned();

        let base = match &existing {
            Some(entry) => entry.base.clone(),
            None => clone_records(base.as_deref()),
        };
        let op = StagedOp::classify(base.as_deref(), draft.as_deref());

        if equal(base.as_deref(), draft.as_deref()) {
            // Only an entry that already exists is kept as a noop; a brand
            // new slot whose draft matches its base is never created.
            let Some(existing) = existing else {
                return Transition::Unchanged;
            };
            let settled = StagedEntry {
                draft: clone_records(draft.as_deref()),
                op: StagedOp::Noop,
                hashes: EntryHashes {
                    draft: existing.hashes.base.clone(),
                    base: existing.hashes.base.clone(),
                },
                dirty: false,
                ..existing
            };
            self.insert_entry(slot.clone(), settled);
            return Transition::Settled { slot };
        }

        let created = existing.is_none();
        let hashes = EntryHashes {
            base: hash_opt(base.as_deref()),
            draft: hash_opt(draft.as_deref()),
        };
        let entry = StagedEntry {
            entity_id: slot.entity_id.clone(),
            date_key: slot.date_key.clone(),
            base,
            draft: clone_records(draft.as_deref()),
            op,
            previous_op: existing.map(|e| e.op),
            hashes,
            dirty: true,
        };
        self.insert_entry(slot.clone(), entry);
        Transition::Staged { slot, op, created }
    }

    fn reset(&mut self, slot: SlotKey) -> Transition {
        let Some(existing) = self.get(&slot.entity_id, &slot.date_key) else {
            return Transition::Unchanged;
        };
        if existing.base_records().is_empty() {
            return self.remove(&slot);
        }
        let reverted = StagedEntry {
            draft: clone_records(existing.base.as_deref()),
            op: StagedOp::Update,
            hashes: EntryHashes {
                base: existing.hashes.base.clone(),
                draft: existing.hashes.base.clone(),
            },
            dirty: false,
            ..existing.clone()
        };
        self.insert_entry(slot.clone(), reverted);
        Transition::Reverted { slot }
    }

    fn remove(&mut self, slot: &SlotKey) -> Transition {
        let Some(days) = self.entries.get_mut(&slot.entity_id) else {
            return Transition::Unchanged;
        };
        if days.remove(&slot.date_key).is_none() {
            return Transition::Unchanged;
        }
        if days.is_empty() {
            self.entries.remove(&slot.entity_id);
        }
        self.order.retain(|key| key != slot);
        Transition::Removed { slot: slot.clone() }
    }

    fn insert_entry(&mut self, slot: SlotKey, entry: StagedEntry) {
        let days = self.entries.entry(slot.entity_id.clone()).or_default();
        if days.insert(slot.date_key.clone(), entry).is_none() {
            self.order.push(slot);
        }
    }
}

/// Pure form of [`StagingState::apply`]: consume a state, return the next.
pub fn reduce(mut state: StagingState, action: StagingAction) -> StagingState {
    state.apply(action);
    state
}
