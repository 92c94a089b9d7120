//! In-memory authoritative store
//!
//! `MemoryBackend` plays both sides of the staging boundary: it supplies
//! base records (`BaseProvider`) and persists committed batches
//! (`ApplyAdapter`). Clones share the same data, so one handle can be given
//! to a session as its provider and another used as the commit adapter.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use ds_changeset::Record;
use ds_workspace::{BaseProvider, DateKey, EntityId};

use crate::adapter::{ApplyAdapter, ApplyError, Result};
use crate::payload::BatchPayload;

#[derive(Debug, Default)]
struct MemoryInner {
    days: BTreeMap<EntityId, BTreeMap<DateKey, Vec<Record>>>,
    fail_next: Option<String>,
    applied_batches: usize,
}

/// Shared in-memory day store.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed one day and return self (builder pattern).
    pub fn with_day(
        self,
        entity_id: impl Into<EntityId>,
        date_key: impl Into<DateKey>,
        records: Vec<Record>,
    ) -> Self {
        self.insert(entity_id, date_key, records);
        self
    }

    /// Replace one day's records. An empty list removes the day.
    pub fn insert(
        &self,
        entity_id: impl Into<EntityId>,
        date_key: impl Into<DateKey>,
        records: Vec<Record>,
    ) {
        let mut inner = self.lock();
        write_day(&mut inner.days, entity_id.into(), date_key.into(), records);
    }

    /// Make the next `apply()` fail with `ApplyError::Rejected(reason)`.
    pub fn fail_next(&self, reason: impl Into<String>) {
        self.lock().fail_next = Some(reason.into());
    }

    /// Number of batches successfully applied so far.
    pub fn applied_batches(&self) -> usize {
        self.lock().applied_batches
    }

    /// Copy of one day's records (empty when absent).
    pub fn day(&self, entity_id: &str, date_key: &str) -> Vec<Record> {
        self.base_records(entity_id, date_key)
    }

    /// Copy of every stored day of one entity.
    pub fn entity_days(&self, entity_id: &str) -> BTreeMap<DateKey, Vec<Record>> {
        self.lock().days.get(entity_id).cloned().unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn write_day(
    days: &mut BTreeMap<EntityId, BTreeMap<DateKey, Vec<Record>>>,
    entity_id: EntityId,
    date_key: DateKey,
    records: Vec<Record>,
) {
    if records.is_empty() {
        if let Some(entity_days) = days.get_mut(&entity_id) {
            entity_days.remove(&date_key);
            if entity_days.is_empty() {
                days.remove(&entity_id);
            }
        }
        return;
    }
    days.entry(entity_id).or_default().insert(date_key, records);
}

impl BaseProvider for MemoryBackend {
    fn base_records(&self, entity_id: &str, date_key: &str) -> Vec<Record> {
        self.lock()
            .days
            .get(entity_id)
            .and_then(|days| days.get(date_key))
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ApplyAdapter for MemoryBackend {
    async fn apply(&self, payload: &BatchPayload) -> Result<()> {
        let mut inner = self.lock();
        if let Some(reason) = inner.fail_next.take() {
            return Err(ApplyError::Rejected(reason));
        }
        for entity in &payload.entities {
            for update in &entity.updates {
                write_day(
                    &mut inner.days,
                    entity.entity_id.clone(),
                    update.date_key.clone(),
                    update.records.clone(),
                );
            }
        }
        inner.applied_batches += 1;
        tracing::debug!(
            entities = payload.entity_count(),
            slots = payload.slot_count(),
            "MemoryBackend: batch applied"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
