// events.rs — Staging event model and notification dispatch.
//
// A session emits an event after every transition that changed the store
// and after every commit that settled. Sinks (tracing, an in-memory
// recorder, anything a caller plugs in) observe these events; they can't
// change what happened.
//
// Dispatch is synchronous and runs after the state lock is released, so a
// sink may read the session it is attached to.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ds_submit::CommitSummary;
use ds_workspace::{DateKey, EntityId, SlotKey, StagedOp};

use crate::error::SessionError;

/// Events emitted by a staging session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum StagingEvent {
    /// A draft was staged for a slot (`op` is `noop` when it settled back
    /// onto its base).
    SlotStaged {
        entity_id: EntityId,
        date_key: DateKey,
        op: StagedOp,
        created: bool,
        timestamp: DateTime<Utc>,
    },

    /// A slot's draft was reverted to its base. `removed` is true when the
    /// base was empty and the slot left the store.
    SlotReset {
        entity_id: EntityId,
        date_key: DateKey,
        removed: bool,
        timestamp: DateTime<Utc>,
    },

    /// The user's edit to a slot was undone.
    SlotRolledBack {
        entity_id: EntityId,
        date_key: DateKey,
        timestamp: DateTime<Utc>,
    },

    /// A slot was dropped programmatically.
    SlotRemoved {
        entity_id: EntityId,
        date_key: DateKey,
        timestamp: DateTime<Utc>,
    },

    /// The whole store was emptied without committing.
    AllDiscarded {
        slots: usize,
        timestamp: DateTime<Utc>,
    },

    /// A batch was accepted by its adapter.
    CommitApplied {
        batch_id: Uuid,
        adapter: String,
        summary: CommitSummary,
        timestamp: DateTime<Utc>,
    },

    /// A batch was rejected and the staged state restored.
    CommitRolledBack {
        batch_id: Uuid,
        adapter: String,
        restored_slots: usize,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

impl StagingEvent {
    /// Get the event type name as a string.
    pub fn event_type(&self) -> &str {
        match self {
            StagingEvent::SlotStaged { .. } => "slot_staged",
            StagingEvent::SlotReset { .. } => "slot_reset",
            StagingEvent::SlotRolledBack { .. } => "slot_rolled_back",
            StagingEvent::SlotRemoved { .. } => "slot_removed",
            StagingEvent::AllDiscarded { .. } => "all_discarded",
            StagingEvent::CommitApplied { .. } => "commit_applied",
            StagingEvent::CommitRolledBack { .. } => "commit_rolled_back",
        }
    }

    /// The slot the event is about, for slot-level events.
    pub fn slot(&self) -> Option<SlotKey> {
        match self {
            StagingEvent::SlotStaged {
                entity_id, date_key, ..
            }
            | StagingEvent::SlotReset {
                entity_id, date_key, ..
            }
            | StagingEvent::SlotRolledBack {
                entity_id, date_key, ..
            }
            | StagingEvent::SlotRemoved {
                entity_id, date_key, ..
            } => Some(SlotKey::new(entity_id.clone(), date_key.clone())),
            _ => None,
        }
    }

    pub fn slot_staged(slot: &SlotKey, op: StagedOp, created: bool) -> Self {
        StagingEvent::SlotStaged {
            entity_id: slot.entity_id.clone(),
            date_key: slot.date_key.clone(),
            op,
            created,
            timestamp: Utc::now(),
        }
    }

    pub fn slot_reset(slot: &SlotKey, removed: bool) -> Self {
        StagingEvent::SlotReset {
            entity_id: slot.entity_id.clone(),
            date_key: slot.date_key.clone(),
            removed,
            timestamp: Utc::now(),
        }
    }

    pub fn slot_rolled_back(slot: &SlotKey) -> Self {
        StagingEvent::SlotRolledBack {
            entity_id: slot.entity_id.clone(),
            date_key: slot.date_key.clone(),
            timestamp: Utc::now(),
        }
    }

    pub fn slot_removed(slot: &SlotKey) -> Self {
        StagingEvent::SlotRemoved {
            entity_id: slot.entity_id.clone(),
            date_key: slot.date_key.clone(),
            timestamp: Utc::now(),
        }
    }

    pub fn all_discarded(slots: usize) -> Self {
        StagingEvent::AllDiscarded {
            slots,
            timestamp: Utc::now(),
        }
    }

    pub fn commit_applied(batch_id: Uuid, adapter: &str, summary: CommitSummary) -> Self {
        StagingEvent::CommitApplied {
            batch_id,
            adapter: adapter.to_string(),
            summary,
            timestamp: Utc::now(),
        }
    }

    pub fn commit_rolled_back(
        batch_id: Uuid,
        adapter: &str,
        restored_slots: usize,
        reason: &str,
    ) -> Self {
        StagingEvent::CommitRolledBack {
            batch_id,
            adapter: adapter.to_string(),
            restored_slots,
            reason: reason.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Trait for receiving staging events.
///
/// Implementations decide what to do with each event: log it, forward it
/// to a UI channel, feed a toast, etc.
pub trait NotificationSink: Send + Sync {
    /// Handle an event. Errors are logged but don't stop the session.
    fn send(&self, event: &StagingEvent) -> Result<(), SessionError>;
}

/// Forwards events to `tracing` at info level.
#[derive(Debug, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn send(&self, event: &StagingEvent) -> Result<(), SessionError> {
        let json = serde_json::to_string(event)
            .map_err(|e| SessionError::Notification(e.to_string()))?;
        tracing::info!(event_type = event.event_type(), event = %json, "staging event");
        Ok(())
    }
}

/// Keeps every event in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<StagingEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every event received so far.
    pub fn events(&self) -> Vec<StagingEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Event type names, in arrival order.
    pub fn event_types(&self) -> Vec<String> {
        self.events()
            .iter()
            .map(|e| e.event_type().to_string())
            .collect()
    }
}

impl NotificationSink for MemorySink {
    fn send(&self, event: &StagingEvent) -> Result<(), SessionError> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }
}

/// Dispatches events to multiple sinks.
///
/// Errors from individual sinks are logged (via tracing) but don't
/// prevent other sinks from receiving the event.
pub struct EventDispatcher {
    sinks: Vec<Box<dyn NotificationSink>>,
}

impl EventDispatcher {
    /// Create a new dispatcher with no sinks.
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    /// Add a notification sink.
    pub fn add_sink(&mut self, sink: Box<dyn NotificationSink>) {
        self.sinks.push(sink);
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Dispatch an event to all sinks.
    pub fn dispatch(&self, event: &StagingEvent) {
        for sink in &self.sinks {
            if let Err(e) = sink.send(event) {
                tracing::warn!("notification sink error: {}", e);
            }
        }
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSink;

    impl NotificationSink for FailingSink {
        fn send(&self, _event: &StagingEvent) -> Result<(), SessionError> {
            Err(SessionError::Notification("sink offline".into()))
        }
    }

    #[test]
    fn event_serialization_round_trip() {
        let event = StagingEvent::slot_staged(&SlotKey::new("e1", "2025-01-05"), StagedOp::Create, true);
        let json = serde_json::to_string(&event).unwrap();
        let restored: StagingEvent = serde_json::from_str(&json).unwrap();

        assert_eq!(event, restored);
        assert!(json.contains("\"slot_staged\""));
        assert!(json.contains("\"create\""));
    }

    #[test]
    fn slot_is_exposed_for_slot_events_only() {
        let slot = SlotKey::new("e1", "2025-01-05");
        assert_eq!(StagingEvent::slot_reset(&slot, false).slot(), Some(slot.clone()));
        assert_eq!(StagingEvent::all_discarded(3).slot(), None);
    }

    #[test]
    fn failing_sink_does_not_block_the_others() {
        let memory = MemorySink::new();
        let mut dispatcher = EventDispatcher::new();
        dispatcher.add_sink(Box::new(FailingSink));
        dispatcher.add_sink(Box::new(memory.clone()));

        dispatcher.dispatch(&StagingEvent::all_discarded(2));
        assert_eq!(memory.event_types(), ["all_discarded"]);
    }

    #[test]
    fn event_type_names() {
        let id = Uuid::new_v4();
        assert_eq!(
            StagingEvent::commit_applied(id, "memory", CommitSummary::default()).event_type(),
            "commit_applied"
        );
        assert_eq!(
            StagingEvent::commit_rolled_back(id, "memory", 1, "offline").event_type(),
            "commit_rolled_back"
        );
    }
}
