// entry.rs — StagedEntry: one staged slot.
//
// An entry pairs the frozen base snapshot (what the authoritative store had
// when staging began) with the current draft. The op and the hashes are
// derived from those two and are never set by callers.

use std::fmt;

use serde::{Deserialize, Serialize};

use ds_changeset::Record;

use crate::slot::{DateKey, EntityId, SlotKey};

/// What committing an entry would do to its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StagedOp {
    Create,
    Update,
    Delete,
    /// Draft and base are semantically equal; nothing to commit.
    Noop,
}

impl StagedOp {
    /// Derive the op from base/draft emptiness. `None` counts as empty.
    pub fn classify(base: Option<&[Record]>, draft: Option<&[Record]>) -> Self {
        let base_empty = base.map_or(true, <[Record]>::is_empty);
        let draft_empty = draft.map_or(true, <[Record]>::is_empty);
        match (base_empty, draft_empty) {
            (true, false) => StagedOp::Create,
            (false, true) => StagedOp::Delete,
            _ => StagedOp::Update,
        }
    }

    /// The overlay tag for this op; `None` for no-ops.
    pub fn status_tag(&self) -> Option<StatusTag> {
        match self {
            StagedOp::Create => Some(StatusTag::StagedInsert),
            StagedOp::Update => Some(StatusTag::StagedUpdate),
            StagedOp::Delete => Some(StatusTag::StagedDelete),
            StagedOp::Noop => None,
        }
    }
}

impl fmt::Display for StagedOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StagedOp::Create => write!(f, "create"),
            StagedOp::Update => write!(f, "update"),
            StagedOp::Delete => write!(f, "delete"),
            StagedOp::Noop => write!(f, "noop"),
        }
    }
}

/// Per-slot indicator exposed to overlays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusTag {
    StagedInsert,
    StagedUpdate,
    StagedDelete,
}

impl StatusTag {
    /// Rank used when several entities share a day: delete > insert > update.
    pub fn precedence(&self) -> u8 {
        match self {
            StatusTag::StagedDelete => 3,
            StatusTag::StagedInsert => 2,
            StatusTag::StagedUpdate => 1,
        }
    }
}

impl fmt::Display for StatusTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusTag::StagedInsert => write!(f, "staged-insert"),
            StatusTag::StagedUpdate => write!(f, "staged-update"),
            StatusTag::StagedDelete => write!(f, "staged-delete"),
        }
    }
}

/// Content signatures of base and draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryHashes {
    pub base: String,
    pub draft: String,
}

/// One staged slot. Owned exclusively by the staging store; callers only
/// ever see clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedEntry {
    pub entity_id: EntityId,
    pub date_key: DateKey,

    /// Authoritative records as of the first upsert. Never changes while
    /// the entry exists.
    pub base: Option<Vec<Record>>,

    /// Current candidate; `None` means "delete the slot entirely".
    pub draft: Option<Vec<Record>>,

    pub op: StagedOp,

    /// The op before the latest non-noop upsert, if the entry existed.
    pub previous_op: Option<StagedOp>,

    pub hashes: EntryHashes,

    /// False once the draft matches the base again (noop or reset).
    pub dirty: bool,
}

impl StagedEntry {
    pub fn slot(&self) -> SlotKey {
        SlotKey::new(self.entity_id.clone(), self.date_key.clone())
    }

    /// Base records, with the null snapshot read as an empty day.
    pub fn base_records(&self) -> &[Record] {
        self.base.as_deref().unwrap_or(&[])
    }

    /// Whether this entry belongs in a commit payload. A reset entry is
    /// not dirty but still goes out, carrying its base as the draft.
    pub fn is_committable(&self) -> bool {
        self.op != StagedOp::Noop
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> Vec<Record> {
        vec![Record::new("A", 4.0)]
    }

    #[test]
    fn classify_table() {
        let d = day();
        assert_eq!(StagedOp::classify(Some(&[][..]), Some(d.as_slice())), StagedOp::Create);
        assert_eq!(StagedOp::classify(None, Some(d.as_slice())), StagedOp::Create);
        assert_eq!(StagedOp::classify(Some(d.as_slice()), None), StagedOp::Delete);
        assert_eq!(StagedOp::classify(Some(d.as_slice()), Some(&[][..])), StagedOp::Delete);
        assert_eq!(StagedOp::classify(Some(d.as_slice()), Some(d.as_slice())), StagedOp::Update);
        assert_eq!(StagedOp::classify(Some(&[][..]), None), StagedOp::Update);
    }

    #[test]
    fn noop_has_no_status_tag() {
        assert_eq!(StagedOp::Noop.status_tag(), None);
        assert_eq!(StagedOp::Create.status_tag(), Some(StatusTag::StagedInsert));
        assert_eq!(StagedOp::Delete.status_tag(), Some(StatusTag::StagedDelete));
    }

    #[test]
    fn tags_render_and_serialize_kebab_case() {
        assert_eq!(StatusTag::StagedInsert.to_string(), "staged-insert");
        assert_eq!(
            serde_json::to_string(&StatusTag::StagedDelete).unwrap(),
            "\"staged-delete\""
        );
    }

    #[test]
    fn delete_outranks_insert_outranks_update() {
        assert!(StatusTag::StagedDelete.precedence() > StatusTag::StagedInsert.precedence());
        assert!(StatusTag::StagedInsert.precedence() > StatusTag::StagedUpdate.precedence());
    }
}
