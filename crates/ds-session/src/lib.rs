//! # ds-session
//!
//! The caller-facing side of Day Staging: a [`StagingSession`] binds the
//! staging store to a base provider, a configuration, draft validators and
//! notification sinks, and exposes the read-only selectors that overlays
//! render from.
//!
//! ```ignore
//! let backend = MemoryBackend::new();
//! let session = StagingSession::new(backend.clone());
//! session.stage_draft("e1", "2025-01-05", Some(vec![Record::new("A", 4.0)]));
//! assert_eq!(session.status_tag("e1", "2025-01-05"), Some(StatusTag::StagedInsert));
//! session.confirm_all(&backend).await?;
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod selectors;
pub mod session;
pub mod validation;

pub use config::{DiffConfig, LoggingConfig, SelectorConfig, StagingConfig};
pub use error::SessionError;
pub use events::{EventDispatcher, MemorySink, NotificationSink, StagingEvent, TracingSink};
pub use selectors::{StagedItem, StatusMap};
pub use session::StagingSession;
pub use validation::{DraftValidator, ValidatorSet};
