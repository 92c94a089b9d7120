//! # ds-workspace
//!
//! The staging store for Day Staging.
//!
//! Tentative edits to day slots accumulate here without touching the
//! authoritative data. Each slot keeps the base it was staged against and
//! the current draft; commits happen elsewhere (`ds-submit`).
//!
//! ## Key components
//!
//! - [`StagingState`] — entries plus their insertion order, changed only
//!   through [`StagingState::apply`] with a [`StagingAction`]
//! - [`StagedEntry`] — one staged slot (base, draft, derived op, hashes)
//! - [`BaseProvider`] — trait through which callers supply authoritative
//!   records; [`MapBaseProvider`] is an in-memory implementation

pub mod entry;
pub mod error;
pub mod slot;
pub mod staging;
pub mod store;

pub use entry::{EntryHashes, StagedEntry, StagedOp, StatusTag};
pub use error::WorkspaceError;
pub use slot::{DateKey, EntityId, SlotKey};
pub use staging::{reduce, StagingAction, StagingState, Transition};
pub use store::{BaseProvider, MapBaseProvider};
