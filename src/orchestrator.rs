//! Drives the two-phase pipeline: internal deduplication within an input
//! tree (Phase A), then cross-tree deduplication against an output tree
//! (Phase B).

use crate::cache::HashCache;
use crate::cancel::CancellationToken;
use crate::config::Config;
use crate::detector::{detect_duplicates, group_entries};
use crate::error::{DupeError, Result};
use crate::media_probe::MediaProbe;
use crate::resolver;
use crate::types::{CachedEntry, DetectorStats, DuplicateGroup, FolderRole, OrchestratorState};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ResolvedMember {
    pub path: PathBuf,
    pub role: FolderRole,
}

#[derive(Debug, Clone)]
pub struct DeletionPlanEntry {
    pub winner: ResolvedMember,
    pub losers: Vec<ResolvedMember>,
}

#[derive(Debug, Clone, Default)]
pub struct DeletionPlan {
    pub entries: Vec<DeletionPlanEntry>,
}

impl DeletionPlan {
    pub fn total_losers(&self) -> usize {
        self.entries.iter().map(|e| e.losers.len()).sum()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PhaseReport {
    pub state: OrchestratorState,
    pub stats: DetectorStats,
    pub groups_found: usize,
    pub plan: DeletionPlan,
    pub deleted: usize,
    pub delete_failures: usize,
}

fn build_plan(groups: &[DuplicateGroup], config: &Config) -> Result<DeletionPlan> {
    let mut plan = DeletionPlan::default();
    for group in groups {
        if !group.is_actionable() {
            continue;
        }

        let outcome = if config.verify_files {
            resolver::resolve(group, |path| {
                std::fs::metadata(path)
                    .ok()
                    .and_then(|m| m.modified().ok())
                    .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                    .map(|d| d.as_secs_f64())
            })?
        } else {
            resolver::resolve_with_cache(group)?
        };

        let (winner_role, loser_roles) = resolver::winner_and_loser_roles(group, &outcome);
        let losers = outcome
            .losers
            .into_iter()
            .zip(loser_roles)
            .map(|(path, role)| ResolvedMember { path, role })
            .collect();

        plan.entries.push(DeletionPlanEntry {
            winner: ResolvedMember { path: outcome.winner, role: winner_role },
            losers,
        });
    }
    Ok(plan)
}

fn execute_plan(plan: &DeletionPlan, cache: &HashCache) -> (usize, usize) {
    let mut deleted = 0;
    let mut failures = 0;
    for entry in &plan.entries {
        for loser in &entry.losers {
            match std::fs::remove_file(&loser.path) {
                Ok(()) => {
                    deleted += 1;
                    if let Err(error) = cache.delete(&loser.path, loser.role) {
                        tracing::warn!(path = %loser.path.display(), %error, "deleted file but failed to update cache");
                    }
                }
                Err(error) => {
                    failures += 1;
                    tracing::warn!(path = %loser.path.display(), %error, "failed to delete duplicate, skipping");
                }
            }
        }
    }
    (deleted, failures)
}

fn build_cross_tree_groups(input_entries: Vec<CachedEntry>, output_entries: Vec<CachedEntry>) -> Vec<DuplicateGroup> {
    let mut combined = input_entries;
    combined.extend(output_entries);
    group_entries(combined).into_iter().filter(|g| g.is_cross_tree()).collect()
}

/// Runs Phase A and/or Phase B against a persistent hash cache. Not `Sync` —
/// create one per concurrent run.
pub struct Orchestrator<'a> {
    cache: &'a HashCache,
    config: &'a Config,
    media_probe: &'a dyn MediaProbe,
    cancel: CancellationToken,
    state: OrchestratorState,
}

impl<'a> Orchestrator<'a> {
    pub fn new(cache: &'a HashCache, config: &'a Config, media_probe: &'a dyn MediaProbe) -> Self {
        Self { cache, config, media_probe, cancel: CancellationToken::new(), state: OrchestratorState::Init }
    }

    /// A clone of the cancellation token, for signaling from another thread.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    fn transition(&mut self, next: OrchestratorState) {
        tracing::info!(from = ?self.state, to = ?next, "orchestrator state transition");
        self.state = next;
    }

    /// Phase A — deduplicate within the input tree.
    pub fn run_phase_a(&mut self, input_root: &Path) -> Result<PhaseReport> {
        self.transition(OrchestratorState::Scanning);
        self.transition(OrchestratorState::Hashing);
        let (groups, stats) =
            detect_duplicates(input_root, FolderRole::Input, self.cache, self.config, self.media_probe, &self.cancel);

        self.transition(OrchestratorState::Grouping);
        self.transition(OrchestratorState::Resolving);
        let plan = build_plan(&groups, self.config)?;

        let mut report =
            PhaseReport { state: OrchestratorState::Resolving, stats, groups_found: groups.len(), plan, deleted: 0, delete_failures: 0 };

        if self.config.dry_run {
            self.transition(OrchestratorState::Done);
            report.state = OrchestratorState::Done;
            return Ok(report);
        }

        self.transition(OrchestratorState::Executing);
        let (deleted, failures) = execute_plan(&report.plan, self.cache);
        report.deleted = deleted;
        report.delete_failures = failures;

        self.transition(OrchestratorState::Done);
        report.state = OrchestratorState::Done;
        Ok(report)
    }

    /// Phase B — deduplicate the output tree against the input tree's
    /// already-cached fingerprints. Never re-walks or re-hashes the input
    /// tree; Phase A must have already populated the cache for it.
    pub fn run_phase_b(&mut self, output_root: &Path) -> Result<PhaseReport> {
        if self.config.require_output_root && !output_root.exists() {
            self.state = OrchestratorState::Aborted;
            tracing::error!(path = %output_root.display(), "phase B aborted: output root missing");
            return Err(DupeError::OutputRootMissing(output_root.to_path_buf()));
        }

        self.transition(OrchestratorState::Scanning);
        // Snapshot the input side before the output scan starts mutating
        // the cache, so the cross-tree grouping never observes a torn view.
        let input_entries = self.cache.all_for_role(FolderRole::Input)?;

        self.transition(OrchestratorState::Hashing);
        let (_output_groups, output_stats) =
            detect_duplicates(output_root, FolderRole::Output, self.cache, self.config, self.media_probe, &self.cancel);

        self.transition(OrchestratorState::Grouping);
        let output_entries = self.cache.all_for_role(FolderRole::Output)?;
        let cross_groups = build_cross_tree_groups(input_entries, output_entries);

        self.transition(OrchestratorState::Resolving);
        let plan = build_plan(&cross_groups, self.config)?;

        let mut report = PhaseReport {
            state: OrchestratorState::Resolving,
            stats: output_stats,
            groups_found: cross_groups.len(),
            plan,
            deleted: 0,
            delete_failures: 0,
        };

        if self.config.dry_run {
            self.transition(OrchestratorState::Done);
            report.state = OrchestratorState::Done;
            return Ok(report);
        }

        self.transition(OrchestratorState::Executing);
        let (deleted, failures) = execute_plan(&report.plan, self.cache);
        report.deleted = deleted;
        report.delete_failures = failures;

        self.transition(OrchestratorState::Done);
        report.state = OrchestratorState::Done;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media_probe::NullMediaProbe;
    use tempfile::tempdir;

    fn cfg() -> Config {
        let mut c = Config::default();
        c.min_file_size = 0;
        c.use_media_probe = false;
        c.dry_run = false;
        c
    }

    #[test]
    fn phase_a_deletes_all_but_one_duplicate() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.bin"), b"dup").unwrap();
        std::fs::write(dir.path().join("b.bin"), b"dup").unwrap();

        let cache = HashCache::open(&dir.path().join("__cache.db")).unwrap();
        let config = cfg();
        let probe = NullMediaProbe;
        let mut orchestrator = Orchestrator::new(&cache, &config, &probe);
        let report = orchestrator.run_phase_a(dir.path()).unwrap();

        assert_eq!(report.state, OrchestratorState::Done);
        assert_eq!(report.deleted, 1);
        assert_eq!(report.delete_failures, 0);

        let a_exists = dir.path().join("a.bin").exists();
        let b_exists = dir.path().join("b.bin").exists();
        assert_ne!(a_exists, b_exists, "exactly one of the two duplicates should remain");
    }

    #[test]
    fn phase_a_dry_run_deletes_nothing() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.bin"), b"dup").unwrap();
        std::fs::write(dir.path().join("b.bin"), b"dup").unwrap();

        let cache = HashCache::open(&dir.path().join("__cache.db")).unwrap();
        let mut config = cfg();
        config.dry_run = true;
        let probe = NullMediaProbe;
        let mut orchestrator = Orchestrator::new(&cache, &config, &probe);
        let report = orchestrator.run_phase_a(dir.path()).unwrap();

        assert_eq!(report.deleted, 0);
        assert!(dir.path().join("a.bin").exists());
        assert!(dir.path().join("b.bin").exists());
    }

    #[test]
    fn phase_b_aborts_when_output_root_missing() {
        let dir = tempdir().unwrap();
        let cache = HashCache::open(&dir.path().join("__cache.db")).unwrap();
        let config = cfg();
        let probe = NullMediaProbe;
        let mut orchestrator = Orchestrator::new(&cache, &config, &probe);
        let result = orchestrator.run_phase_b(&dir.path().join("nonexistent"));

        assert!(result.is_err());
        assert_eq!(orchestrator.state(), OrchestratorState::Aborted);
    }

    #[test]
    fn phase_b_deletes_output_duplicate_of_input_file() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("input");
        let output = dir.path().join("output");
        std::fs::create_dir_all(&input).unwrap();
        std::fs::create_dir_all(&output).unwrap();
        // A lone input file has no internal duplicate, so a singleton size
        // bucket discards it before fingerprinting and it never enters the
        // cache. Give it a sibling so Phase A actually hashes and caches
        // the survivor before Phase B looks for cross-tree matches.
        std::fs::write(input.join("a.bin"), b"same content").unwrap();
        std::fs::write(input.join("a_backup.bin"), b"same content").unwrap();
        std::fs::write(output.join("copy.bin"), b"same content").unwrap();

        let cache = HashCache::open(&dir.path().join("__cache.db")).unwrap();
        let config = cfg();
        let probe = NullMediaProbe;
        let mut orchestrator = Orchestrator::new(&cache, &config, &probe);
        let phase_a = orchestrator.run_phase_a(&input).unwrap();
        assert_eq!(phase_a.deleted, 1, "the two input-side copies dedup against each other first");

        let report = orchestrator.run_phase_b(&output).unwrap();

        assert_eq!(report.deleted, 1);
        assert!(!output.join("copy.bin").exists());
    }
}
