//! Batch commit for staged day edits
//!
//! This crate turns the pending contents of a staging store into a single
//! all-or-nothing batch. The core abstraction is the `ApplyAdapter` trait;
//! `BatchCommitter` drives it with an optimistic clear and a rollback to
//! the exact previous state when the adapter rejects the batch.

pub mod adapter;
pub mod committer;
pub mod config;
pub mod memory;
pub mod none;
pub mod payload;

pub use adapter::{ApplyAdapter, ApplyError, FnAdapter};
pub use committer::{lock_state, BatchCommitter, CommitError, CommitOutcome, CommitReceipt};
pub use config::{CommitConfig, ConcurrentCommit};
pub use memory::MemoryBackend;
pub use none::NoneAdapter;
pub use payload::{build_batch_payload, BatchPayload, CommitSummary, DayUpdate, EntityUpdate};
