//! # CCR Core
//!
//! Pure domain logic for the clinical coding review client:
//! - Episode wire/domain models tolerant of both backend key casings
//! - List response shape normalization (bare array or `{items, total}`)
//! - List filter to query-pair construction
//! - Code diff reconciliation into one canonical [`diff::DiffResult`]
//! - Clinician query drafts
//!
//! **No API concerns**: authentication, HTTP transport, and workflow
//! execution belong in `ccr-client`. Nothing here performs I/O.

pub mod diff;
pub mod episode;
pub mod query;

pub use diff::{CodeEntry, CodeSets, Deltas, DiffResult};
pub use episode::{Episode, EpisodeDraft, EpisodePage, ListFilter};
pub use query::QueryDraft;

/// Errors returned by the core model layer.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to deserialize payload: {0}")]
    Deserialization(#[from] serde_json::Error),
}

/// Type alias for Results that can fail with a [`ModelError`].
pub type ModelResult<T> = Result<T, ModelError>;
