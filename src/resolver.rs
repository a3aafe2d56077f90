//! Deterministic winner selection among a group of duplicate files.
//!
//! Evaluated strictly in order — each tier either decides the winner or
//! defers to the next:
//!
//! 1. "keep" ancestor priority: the file whose path has the shallowest
//!    component (directory or filename) containing "keep" (case-insensitive)
//!    wins; a match in a directory component outranks a match that only
//!    appears in the filename at the same depth.
//! 2. Path depth: the deepest surviving path wins.
//! 3. Newest mtime, then lexicographically smallest path as a final tiebreak.

use crate::error::{DupeError, Result};
use crate::types::{path_depth, DuplicateGroup, FolderRole, ResolutionOutcome};
use std::path::{Path, PathBuf};

/// Returns (effective_depth, is_filename_only) for the shallowest
/// path component containing "keep", or `None` if there is no match.
///
/// A filename-only match is assigned the same effective depth as its
/// enclosing directory, so the boolean alone breaks the tie between a
/// directory match and a filename match at the same nesting level.
fn keep_rank(path: &Path) -> Option<(usize, bool)> {
    let components: Vec<String> = path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_lowercase())
        .collect();
    let last_index = components.len().saturating_sub(1);
    components.iter().enumerate().find(|(_, name)| name.contains("keep")).map(|(index, _)| {
        let is_filename_only = index == last_index;
        let effective_depth = if is_filename_only { index.saturating_sub(1) } else { index };
        (effective_depth, is_filename_only)
    })
}

fn pick_winner(candidates: &[(PathBuf, f64)]) -> PathBuf {
    // Tier 1: "keep" ancestor priority.
    let ranked: Vec<(&(PathBuf, f64), Option<(usize, bool)>)> =
        candidates.iter().map(|c| (c, keep_rank(&c.0))).collect();
    let best = ranked.iter().filter_map(|(_, r)| *r).min();
    let tier1: Vec<&(PathBuf, f64)> = match best {
        Some(best) => ranked.iter().filter(|(_, r)| *r == Some(best)).map(|(c, _)| *c).collect(),
        None => candidates.iter().collect(),
    };
    if tier1.len() == 1 {
        return tier1[0].0.clone();
    }

    // Tier 2: path depth, deepest wins.
    let max_depth = tier1.iter().map(|c| path_depth(&c.0)).max().expect("tier1 is non-empty");
    let tier2: Vec<&(PathBuf, f64)> = tier1.into_iter().filter(|c| path_depth(&c.0) == max_depth).collect();
    if tier2.len() == 1 {
        return tier2[0].0.clone();
    }

    // Tier 3: newest mtime, then lexicographically smallest path.
    let max_mtime = tier2.iter().map(|c| c.1).fold(f64::NEG_INFINITY, f64::max);
    let mut tier3: Vec<&(PathBuf, f64)> = tier2.into_iter().filter(|c| c.1 == max_mtime).collect();
    tier3.sort_by(|a, b| a.0.cmp(&b.0));
    tier3[0].0.clone()
}

fn check_cardinality(group: &DuplicateGroup) -> Result<()> {
    debug_assert!(
        group.members.len() >= 2,
        "resolver invariant violated: group cardinality < 2"
    );
    if group.members.len() < 2 {
        return Err(DupeError::Invariant(format!(
            "resolver received a group of cardinality {} (must be >= 2)",
            group.members.len()
        )));
    }
    Ok(())
}

fn role_lookup<'a>(group: &'a DuplicateGroup) -> std::collections::HashMap<&'a Path, FolderRole> {
    group.members.iter().map(|m| (m.path.as_path(), m.role)).collect()
}

fn outcome_from(group: &DuplicateGroup, candidates: &[(PathBuf, f64)]) -> ResolutionOutcome {
    let winner = pick_winner(candidates);
    let losers = group
        .members
        .iter()
        .map(|m| m.path.clone())
        .filter(|p| p != &winner)
        .collect();
    ResolutionOutcome { winner, losers }
}

/// Resolve using the cache's snapshot of size/mtime, without touching disk.
pub fn resolve_with_cache(group: &DuplicateGroup) -> Result<ResolutionOutcome> {
    check_cardinality(group)?;
    let candidates: Vec<(PathBuf, f64)> = group.members.iter().map(|m| (m.path.clone(), m.mtime)).collect();
    Ok(outcome_from(group, &candidates))
}

/// Resolve after re-reading mtime from the filesystem via `stat_source`,
/// falling back to the cached value if the stat fails (e.g. the file
/// vanished between scan and resolution).
pub fn resolve<F>(group: &DuplicateGroup, stat_source: F) -> Result<ResolutionOutcome>
where
    F: Fn(&Path) -> Option<f64>,
{
    check_cardinality(group)?;
    let candidates: Vec<(PathBuf, f64)> = group
        .members
        .iter()
        .map(|m| (m.path.clone(), stat_source(&m.path).unwrap_or(m.mtime)))
        .collect();
    Ok(outcome_from(group, &candidates))
}

/// Role of each path in a resolved group, used by the orchestrator to route
/// cross-tree deletions to the cache row under the correct role.
pub fn winner_and_loser_roles(group: &DuplicateGroup, outcome: &ResolutionOutcome) -> (FolderRole, Vec<FolderRole>) {
    let lookup = role_lookup(group);
    let winner_role = lookup[outcome.winner.as_path()];
    let loser_roles = outcome.losers.iter().map(|p| lookup[p.as_path()]).collect();
    (winner_role, loser_roles)
}
