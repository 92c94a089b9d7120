//! # ds-changeset
//!
//! Record model and change classification for Day Staging.
//!
//! A slot holds an ordered sequence of [`Record`]s. This crate answers two
//! questions about a pair of sequences, without owning any state:
//!
//! - are they the same? ([`semantic::equal`], with [`semantic::hash`] as a
//!   cheap pre-check)
//! - if not, what changed? ([`compute_diff`] → [`SlotDiff`], rendered by
//!   [`summarize`])

pub mod diff;
pub mod error;
pub mod record;
pub mod semantic;

pub use diff::{
    compute_diff, summarize, ChangeKind, DiffKind, DiffTone, MatchStrategy, RecordChange,
    SlotDiff,
};
pub use error::ChangeSetError;
pub use record::{clone_records, records_from_json, Record};
