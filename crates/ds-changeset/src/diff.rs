// diff.rs — Slot diff classification.
//
// A SlotDiff describes what staging a candidate sequence would do to one
// slot: which records are inserted, updated or deleted, plus a coarse
// label for the slot as a whole.
//
// Records are reconciled according to an explicit MatchStrategy. The
// default (`IdOrPosition`) matches records carrying an id by id and the
// rest by index, which means a reordering of id-less records reads as a
// series of updates. The other strategies exist so callers can pick the
// behavior they want instead of inheriting that fallback.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ChangeSetError;
use crate::record::Record;
use crate::semantic::record_equal;

/// How records of the original and the staged sequence are paired up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// Records with an id match by id; records without one match by index.
    #[default]
    IdOrPosition,
    /// Every record matches by index, ids are ignored.
    Positional,
    /// Only records with an id can match; id-less records are always
    /// reported as a delete of the old one and an insert of the new one.
    IdOnly,
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchStrategy::IdOrPosition => write!(f, "id_or_position"),
            MatchStrategy::Positional => write!(f, "positional"),
            MatchStrategy::IdOnly => write!(f, "id_only"),
        }
    }
}

impl FromStr for MatchStrategy {
    type Err = ChangeSetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id_or_position" => Ok(MatchStrategy::IdOrPosition),
            "positional" => Ok(MatchStrategy::Positional),
            "id_only" => Ok(MatchStrategy::IdOnly),
            other => Err(ChangeSetError::InvalidData(format!(
                "unknown match strategy '{}'",
                other
            ))),
        }
    }
}

/// Coarse classification of a whole slot diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiffKind {
    /// The staged value is the "delete whole slot" marker.
    SlotDelete,
    /// The slot had no records and now has some.
    NewSlot,
    InsertOnly,
    UpdateOnly,
    DeleteOnly,
    /// Nothing differs.
    NoOp,
    /// Any other combination of inserts, updates and deletes.
    Mixed,
}

impl DiffKind {
    /// The label as used in serialized output (`"slot-delete"`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            DiffKind::SlotDelete => "slot-delete",
            DiffKind::NewSlot => "new-slot",
            DiffKind::InsertOnly => "insert-only",
            DiffKind::UpdateOnly => "update-only",
            DiffKind::DeleteOnly => "delete-only",
            DiffKind::NoOp => "no-op",
            DiffKind::Mixed => "mixed",
        }
    }

    /// Visual tone an overlay should give a slot with this diff.
    pub fn tone(&self) -> DiffTone {
        match self {
            DiffKind::NewSlot => DiffTone::Addition,
            DiffKind::SlotDelete | DiffKind::DeleteOnly => DiffTone::Removal,
            DiffKind::Mixed | DiffKind::UpdateOnly => DiffTone::Modification,
            DiffKind::InsertOnly | DiffKind::NoOp => DiffTone::Neutral,
        }
    }
}

impl fmt::Display for DiffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiffKind {
    type Err = ChangeSetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "slot-delete" => Ok(DiffKind::SlotDelete),
            "new-slot" => Ok(DiffKind::NewSlot),
            "insert-only" => Ok(DiffKind::InsertOnly),
            "update-only" => Ok(DiffKind::UpdateOnly),
            "delete-only" => Ok(DiffKind::DeleteOnly),
            "no-op" => Ok(DiffKind::NoOp),
            "mixed" => Ok(DiffKind::Mixed),
            other => Err(ChangeSetError::InvalidData(format!(
                "unknown diff kind '{}'",
                other
            ))),
        }
    }
}

/// Colour family for rendering a diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffTone {
    Addition,
    Removal,
    Modification,
    Neutral,
}

/// What happened to a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One record-level change. `before` is `None` for inserts and `after` is
/// `None` for deletes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordChange {
    pub kind: ChangeKind,
    pub before: Option<Record>,
    pub after: Option<Record>,
}

impl RecordChange {
    fn insert(after: &Record) -> Self {
        Self {
            kind: ChangeKind::Insert,
            before: None,
            after: Some(after.clone()),
        }
    }

    fn update(before: &Record, after: &Record) -> Self {
        Self {
            kind: ChangeKind::Update,
            before: Some(before.clone()),
            after: Some(after.clone()),
        }
    }

    fn delete(before: &Record) -> Self {
        Self {
            kind: ChangeKind::Delete,
            before: Some(before.clone()),
            after: None,
        }
    }
}

/// The structured diff of one slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlotDiff {
    /// Coarse label for the slot.
    #[serde(rename = "type")]
    pub kind: DiffKind,
    pub inserts: usize,
    pub updates: usize,
    pub deletes: usize,
    /// Deletes and updates in original order, then inserts in staged order.
    pub changes: Vec<RecordChange>,
}

// Identity a record is matched under. Keeping ids and indexes in separate
// variants means an id that happens to look like an index never collides.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum MatchKey<'a> {
    Id(&'a str),
    Index(usize),
    Unmatchable(usize),
}

fn match_key(record: &Record, idx: usize, strategy: MatchStrategy) -> MatchKey<'_> {
    match (strategy, record.id.as_deref()) {
        (MatchStrategy::Positional, _) => MatchKey::Index(idx),
        (MatchStrategy::IdOrPosition, Some(id)) | (MatchStrategy::IdOnly, Some(id)) => {
            MatchKey::Id(id)
        }
        (MatchStrategy::IdOrPosition, None) => MatchKey::Index(idx),
        (MatchStrategy::IdOnly, None) => MatchKey::Unmatchable(idx),
    }
}

// Keyed view of a sequence in first-seen order. A duplicate key replaces
// the earlier record but keeps the earlier position.
struct Keyed<'a> {
    slots: Vec<(MatchKey<'a>, &'a Record)>,
    index: HashMap<MatchKey<'a>, usize>,
}

impl<'a> Keyed<'a> {
    fn build(records: &'a [Record], strategy: MatchStrategy) -> Self {
        let mut slots: Vec<(MatchKey<'a>, &'a Record)> = Vec::with_capacity(records.len());
        let mut index = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            let key = match_key(record, i, strategy);
            let existing = index.get(&key).copied();
            match existing {
                Some(pos) => slots[pos] = (key, record),
                None => {
                    index.insert(key.clone(), slots.len());
                    slots.push((key, record));
                }
            }
        }
        Self { slots, index }
    }

    fn get(&self, key: &MatchKey<'a>) -> Option<&'a Record> {
        // Unmatchable keys never pair with anything on the other side.
        if matches!(key, MatchKey::Unmatchable(_)) {
            return None;
        }
        self.index.get(key).map(|&pos| self.slots[pos].1)
    }

    fn contains(&self, key: &MatchKey<'a>) -> bool {
        self.get(key).is_some()
    }
}

/// Compute the diff of staging `staged` over `original`.
///
/// `staged == None` is the "delete whole slot" marker.
pub fn compute_diff(
    original: &[Record],
    staged: Option<&[Record]>,
    strategy: MatchStrategy,
) -> SlotDiff {
    let staged = match staged {
        None => {
            return SlotDiff {
                kind: DiffKind::SlotDelete,
                inserts: 0,
                updates: 0,
                deletes: original.len(),
                changes: original.iter().map(RecordChange::delete).collect(),
            };
        }
        Some(staged) => staged,
    };

    if original.is_empty() && !staged.is_empty() {
        return SlotDiff {
            kind: DiffKind::NewSlot,
            inserts: staged.len(),
            updates: 0,
            deletes: 0,
            changes: staged.iter().map(RecordChange::insert).collect(),
        };
    }

    let before = Keyed::build(original, strategy);
    let after = Keyed::build(staged, strategy);

    let mut changes = Vec::new();
    let (mut inserts, mut updates, mut deletes) = (0, 0, 0);

    for (key, old) in &before.slots {
        match after.get(key) {
            None => {
                deletes += 1;
                changes.push(RecordChange::delete(old));
            }
            Some(new) if !record_equal(old, new) => {
                updates += 1;
                changes.push(RecordChange::update(old, new));
            }
            Some(_) => {}
        }
    }
    for (key, new) in &after.slots {
        if !before.contains(key) {
            inserts += 1;
            changes.push(RecordChange::insert(new));
        }
    }

    let kind = match (inserts > 0, updates > 0, deletes > 0) {
        (false, false, true) => DiffKind::DeleteOnly,
        (true, false, false) => DiffKind::InsertOnly,
        (false, true, false) => DiffKind::UpdateOnly,
        (false, false, false) => DiffKind::NoOp,
        _ => DiffKind::Mixed,
    };

    SlotDiff {
        kind,
        inserts,
        updates,
        deletes,
        changes,
    }
}

/// Compact human-readable summary of a diff (`"+2 ✎1 −1"`).
pub fn summarize(diff: &SlotDiff) -> String {
    match diff.kind {
        DiffKind::SlotDelete => "slot deleted".to_string(),
        DiffKind::NewSlot => format!("{} new records", diff.inserts),
        DiffKind::NoOp => "no changes".to_string(),
        _ => {
            let mut parts = Vec::new();
            if diff.inserts > 0 {
                parts.push(format!("+{}", diff.inserts));
            }
            if diff.updates > 0 {
                parts.push(format!("✎{}", diff.updates));
            }
            if diff.deletes > 0 {
                parts.push(format!("−{}", diff.deletes));
            }
            parts.join(" ")
        }
    }
}
