// slot.rs — Slot identity.
//
// A slot is the unit of staging: one owning entity (e.g. an employee) on
// one day. The canonical string form `<entity>|<date>` is what ordering
// and logs use.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::WorkspaceError;

/// Identifier of the entity owning a slot (e.g. an employee id).
pub type EntityId = String;

/// Day key of a slot, conventionally `YYYY-MM-DD`.
pub type DateKey = String;

/// Composite identity of a slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotKey {
    pub entity_id: EntityId,
    pub date_key: DateKey,
}

impl SlotKey {
    pub fn new(entity_id: impl Into<EntityId>, date_key: impl Into<DateKey>) -> Self {
        Self {
            entity_id: entity_id.into(),
            date_key: date_key.into(),
        }
    }

    /// A slot reference is usable only when both halves are present.
    pub fn is_valid(&self) -> bool {
        !self.entity_id.is_empty() && !self.date_key.is_empty()
    }

    /// Whether this key addresses the given entity and day.
    pub fn is(&self, entity_id: &str, date_key: &str) -> bool {
        self.entity_id == entity_id && self.date_key == date_key
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.entity_id, self.date_key)
    }
}

impl FromStr for SlotKey {
    type Err = WorkspaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('|') {
            Some((entity, date)) if !entity.is_empty() && !date.is_empty() => {
                Ok(SlotKey::new(entity, date))
            }
            _ => Err(WorkspaceError::InvalidSlotKey(s.to_string())),
        }
    }
}
