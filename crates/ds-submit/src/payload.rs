// payload.rs — What a commit sends to the persistence boundary.
//
// Every slot whose op isn't noop makes it into a payload, including an
// entry reset onto a non-empty base (it re-sends the base). Entities appear in the
// order their first slot was staged, days in staging order, and an entity
// with nothing pending is omitted entirely.

use serde::{Deserialize, Serialize};

use ds_changeset::{compute_diff, DiffKind, MatchStrategy, Record};
use ds_workspace::{DateKey, EntityId, StagedEntry, StagingState};

/// New contents of one day. An empty `records` list clears the day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayUpdate {
    pub date_key: DateKey,
    pub records: Vec<Record>,
}

/// All day updates of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityUpdate {
    pub entity_id: EntityId,
    pub updates: Vec<DayUpdate>,
}

/// The minimal set of writes a commit asks an adapter to persist.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchPayload {
    pub entities: Vec<EntityUpdate>,
}

impl BatchPayload {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Number of day updates across all entities.
    pub fn slot_count(&self) -> usize {
        self.entities.iter().map(|e| e.updates.len()).sum()
    }

    /// Flat `(entity, update)` view.
    pub fn iter_updates(&self) -> impl Iterator<Item = (&str, &DayUpdate)> + '_ {
        self.entities.iter().flat_map(|entity| {
            entity
                .updates
                .iter()
                .map(move |update| (entity.entity_id.as_str(), update))
        })
    }
}

/// Build the payload for everything currently pending in `state`.
pub fn build_batch_payload(state: &StagingState) -> BatchPayload {
    let mut entities: Vec<EntityUpdate> = Vec::new();
    for entry in state.iter().filter(|e| e.is_committable()) {
        let update = DayUpdate {
            date_key: entry.date_key.clone(),
            records: entry.draft.clone().unwrap_or_default(),
        };
        match entities.iter_mut().find(|e| e.entity_id == entry.entity_id) {
            Some(group) => group.updates.push(update),
            None => entities.push(EntityUpdate {
                entity_id: entry.entity_id.clone(),
                updates: vec![update],
            }),
        }
    }
    BatchPayload { entities }
}

/// Counters describing a batch, for toasts and summaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSummary {
    pub total: usize,
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl CommitSummary {
    /// Classify every pending slot of `state` by its diff.
    pub fn of_state(state: &StagingState, strategy: MatchStrategy) -> Self {
        let mut summary = Self::default();
        for entry in state.iter().filter(|e| e.is_committable()) {
            summary.count(entry, strategy);
        }
        summary
    }

    fn count(&mut self, entry: &StagedEntry, strategy: MatchStrategy) {
        let diff = compute_diff(entry.base_records(), entry.draft.as_deref(), strategy);
        self.total += 1;
        match diff.kind {
            DiffKind::SlotDelete | DiffKind::DeleteOnly => self.deleted += 1,
            DiffKind::NewSlot | DiffKind::InsertOnly => self.inserted += 1,
            _ => self.updated += 1,
        }
    }
}
