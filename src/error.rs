//! Error taxonomy for the duplicate detection engine.
//!
//! Variants map onto the distinguishable failure kinds the engine cares
//! about: an underlying cache (SQLite) failure, a missing output root
//! (structural precondition), and an invariant violation that should never
//! occur in correct code and is surfaced rather than silently tolerated.
//! Per-file I/O failures during scanning/hashing are not represented here —
//! they are logged and folded into `DetectorStats::failed` instead, since
//! failing one file must never abort a whole-tree scan.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum DupeError {
    #[error("cache error: {0}")]
    Cache(#[from] rusqlite::Error),

    #[error("output root does not exist: {}", .0.display())]
    OutputRootMissing(PathBuf),

    #[error("invariant violated: {0}")]
    Invariant(String),
}

pub type Result<T> = std::result::Result<T, DupeError>;
