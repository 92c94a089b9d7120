// store.rs — BaseProvider trait and an in-memory implementation.
//
// The staging engine never owns authoritative data. Whatever the caller's
// data layer holds is handed in through a BaseProvider at the moment a slot
// is first staged, and read again by the merged views for unstaged slots.

use std::collections::BTreeMap;

use ds_changeset::Record;

use crate::slot::{DateKey, EntityId};

/// Source of the authoritative records of a slot.
///
/// Implementations must be cheap and synchronous: the provider is called
/// on every staging request and every merged-view lookup. A slot with no
/// data is an empty sequence, never an error.
pub trait BaseProvider {
    /// The committed records for one entity on one day.
    fn base_records(&self, entity_id: &str, date_key: &str) -> Vec<Record>;
}

impl<F> BaseProvider for F
where
    F: Fn(&str, &str) -> Vec<Record>,
{
    fn base_records(&self, entity_id: &str, date_key: &str) -> Vec<Record> {
        self(entity_id, date_key)
    }
}

/// A provider backed by a plain nested map. Handy for tests and for
/// callers that already hold their day data in memory.
#[derive(Debug, Clone, Default)]
pub struct MapBaseProvider {
    days: BTreeMap<EntityId, BTreeMap<DateKey, Vec<Record>>>,
}

impl MapBaseProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the records of one day and return self (builder pattern).
    pub fn with_day(
        mut self,
        entity_id: impl Into<EntityId>,
        date_key: impl Into<DateKey>,
        records: Vec<Record>,
    ) -> Self {
        self.insert(entity_id, date_key, records);
        self
    }

    /// Replace the records of one day.
    pub fn insert(
        &mut self,
        entity_id: impl Into<EntityId>,
        date_key: impl Into<DateKey>,
        records: Vec<Record>,
    ) {
        self.days
            .entry(entity_id.into())
            .or_default()
            .insert(date_key.into(), records);
    }

    /// All days of one entity.
    pub fn entity_days(&self, entity_id: &str) -> BTreeMap<DateKey, Vec<Record>> {
        self.days.get(entity_id).cloned().unwrap_or_default()
    }
}

impl BaseProvider for MapBaseProvider {
    fn base_records(&self, entity_id: &str, date_key: &str) -> Vec<Record> {
        self.days
            .get(entity_id)
            .and_then(|days| days.get(date_key))
            .cloned()
            .unwrap_or_default()
    }
}
