// record.rs — The opaque unit of work stored in a day slot.
//
// The engine only looks at `code`, `amount` and `note` when comparing and
// `id` when matching. Everything else a caller's data layer attaches to a
// record rides along in `extra` and is copied, never inspected.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ChangeSetError;

/// A single record inside a slot (e.g. one work entry on one day).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Record {
    /// Classification code (e.g. a project or absence code).
    #[serde(default)]
    pub code: String,

    /// Numeric quantity (e.g. hours).
    #[serde(default)]
    pub amount: f64,

    /// Optional free-text note. Absent and empty compare equal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    /// Optional stable identity used by the diff classifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Caller-owned fields the engine never looks at.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Record {
    /// Create a record with a code and an amount.
    pub fn new(code: impl Into<String>, amount: f64) -> Self {
        Self {
            code: code.into(),
            amount,
            ..Self::default()
        }
    }

    /// Set the note and return self (builder pattern).
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Set the stable id and return self.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// The note as compared by the engine: missing notes read as "".
    pub fn note_text(&self) -> &str {
        self.note.as_deref().unwrap_or("")
    }
}

/// Return an independently owned copy of a record sequence.
///
/// `None` ("delete the whole slot") stays `None`. This is the single place
/// snapshots are taken: first base capture and every draft assignment.
pub fn clone_records(records: Option<&[Record]>) -> Option<Vec<Record>> {
    records.map(<[Record]>::to_vec)
}

/// Parse a JSON array of records as handed over by a caller's data layer.
pub fn records_from_json(json: &str) -> Result<Vec<Record>, ChangeSetError> {
    let records: Vec<Record> = serde_json::from_str(json)?;
    Ok(records)
}
