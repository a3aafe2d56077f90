//! Shared data model for the duplicate detection engine: the tagged
//! variants and records that flow between the cache, sampler, detector,
//! resolver, and orchestrator.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Distinguishes which side of a two-tree comparison a cached entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FolderRole {
    Input,
    Output,
}

impl FolderRole {
    pub fn as_str(self) -> &'static str {
        match self {
            FolderRole::Input => "input",
            FolderRole::Output => "output",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "input" => Some(FolderRole::Input),
            "output" => Some(FolderRole::Output),
            _ => None,
        }
    }
}

/// Scan-time snapshot of one regular file. Never carries a fingerprint.
#[derive(Debug, Clone, PartialEq)]
pub struct FileMetadata {
    pub path: PathBuf,
    pub size: u64,
    pub mtime: f64,
    pub extension: Option<String>,
}

/// Tags whether a fingerprint covers the entire byte stream or a sampled
/// head+tail subset. Two entries with differing kinds are never treated as
/// equal even when their hex digests match — comparability is (kind, digest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FingerprintKind {
    Full,
    Sampled { total_bytes: u64 },
}

impl FingerprintKind {
    pub fn as_db_str(self) -> &'static str {
        match self {
            FingerprintKind::Full => "full",
            FingerprintKind::Sampled { .. } => "sampled",
        }
    }
}

/// Advisory, probe-derived facts about a media file. Never authoritative
/// for duplicate determination — used only to pre-filter candidates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaFacts {
    pub duration_seconds: Option<f64>,
    pub codec: Option<String>,
    pub resolution: Option<String>,
}

/// The authoritative per-file record stored in the hash cache.
#[derive(Debug, Clone)]
pub struct CachedEntry {
    pub path: PathBuf,
    pub role: FolderRole,
    pub digest: String,
    pub kind: FingerprintKind,
    pub size: u64,
    pub mtime: f64,
    pub media: Option<MediaFacts>,
    pub last_seen: f64,
}

impl PartialEq for CachedEntry {
    /// Ignores `last_seen` — a cache round-trip is expected to refresh that
    /// timestamp even when every other field is unchanged.
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
            && self.role == other.role
            && self.digest == other.digest
            && self.kind == other.kind
            && self.size == other.size
            && self.mtime == other.mtime
            && self.media == other.media
    }
}

impl CachedEntry {
    /// True when `size`/`mtime` match a fresh filesystem stat, i.e. the
    /// cached fingerprint can be trusted without rehashing.
    pub fn matches_stat(&self, size: u64, mtime: f64) -> bool {
        self.size == size && self.mtime == mtime
    }
}

/// A set of two or more paths sharing (fingerprint-kind, digest, size).
#[derive(Debug, Clone)]
pub struct DuplicateGroup {
    pub kind: FingerprintKind,
    pub digest: String,
    pub size: u64,
    pub members: Vec<CachedEntry>,
}

impl DuplicateGroup {
    pub fn is_actionable(&self) -> bool {
        self.members.len() >= 2
    }

    /// True when members span both `FolderRole` variants.
    pub fn is_cross_tree(&self) -> bool {
        let mut roles = self.members.iter().map(|m| m.role);
        match roles.next() {
            Some(first) => roles.any(|r| r != first),
            None => false,
        }
    }
}

/// The output of the resolver: one survivor, the rest slated for deletion.
#[derive(Debug, Clone)]
pub struct ResolutionOutcome {
    pub winner: PathBuf,
    pub losers: Vec<PathBuf>,
}

/// Aggregate counters surfaced by the detector instead of per-file exceptions.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetectorStats {
    pub scanned: usize,
    pub filtered: usize,
    pub cache_hit: usize,
    pub moved: usize,
    pub hashed: usize,
    pub failed: usize,
}

/// Orchestrator state machine. `Aborted` is reachable from any earlier state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrchestratorState {
    #[default]
    Init,
    Scanning,
    Hashing,
    Grouping,
    Resolving,
    Executing,
    Done,
    Aborted,
}

pub(crate) fn path_depth(path: &Path) -> usize {
    path.components().count()
}

/// Seconds since the Unix epoch, as used for `CachedEntry::last_seen`.
pub(crate) fn now_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
