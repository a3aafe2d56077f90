//! Walks a directory tree and groups its files into duplicate sets.
//!
//! Pipeline: walk → filter → cache-reconcile → size-group → pre-filter by
//! media duration → fingerprint → group by (kind, digest, size).

use crate::cache::HashCache;
use crate::cancel::CancellationToken;
use crate::config::Config;
use crate::hash::StreamingHasher;
use crate::media_probe::MediaProbe;
use crate::sampler::{self, SamplePlan};
use crate::types::{now_seconds, CachedEntry, DetectorStats, DuplicateGroup, FileMetadata, FingerprintKind, FolderRole};
use ignore::{WalkBuilder, WalkState};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const VIDEO_EXTENSIONS: &[&str] =
    &["mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v", "mpg", "mpeg", "ts", "m2ts", "3gp"];

fn ext_of(path: &Path) -> Option<String> {
    path.extension().and_then(|e| e.to_str()).map(|s| s.to_lowercase())
}

fn is_video_ext(ext: &Option<String>) -> bool {
    ext.as_deref().map(|e| VIDEO_EXTENSIONS.contains(&e)).unwrap_or(false)
}

fn mtime_secs(meta: &std::fs::Metadata) -> f64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Either an already-fingerprinted cache entry or a file still awaiting one.
enum Candidate {
    Known(CachedEntry),
    Unhashed(FileMetadata),
}

impl Candidate {
    fn path(&self) -> &Path {
        match self {
            Candidate::Known(e) => &e.path,
            Candidate::Unhashed(f) => &f.path,
        }
    }

    fn size(&self) -> u64 {
        match self {
            Candidate::Known(e) => e.size,
            Candidate::Unhashed(f) => f.size,
        }
    }

    fn cached_duration(&self) -> Option<f64> {
        match self {
            Candidate::Known(e) => e.media.as_ref().and_then(|m| m.duration_seconds),
            Candidate::Unhashed(_) => None,
        }
    }
}

fn walk_regular_files(root: &Path, cancel: &CancellationToken) -> Vec<PathBuf> {
    let results: Mutex<Vec<PathBuf>> = Mutex::new(Vec::new());

    WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .follow_links(false)
        .filter_entry(|entry| !entry.file_type().is_some_and(|ft| ft.is_symlink()))
        .build_parallel()
        .run(|| {
            let results = &results;
            let cancel = cancel.clone();
            Box::new(move |entry| {
                if cancel.is_cancelled() {
                    return WalkState::Quit;
                }
                let entry = match entry {
                    Ok(e) => e,
                    Err(_) => return WalkState::Continue,
                };
                let is_file = entry.file_type().map(|ft| ft.is_file()).unwrap_or(false);
                if is_file {
                    results.lock().expect("walk results mutex poisoned").push(entry.into_path());
                }
                WalkState::Continue
            })
        });

    results.into_inner().expect("walk results mutex poisoned")
}

fn stat_and_filter(paths: Vec<PathBuf>, config: &Config, stats: &mut DetectorStats) -> Vec<FileMetadata> {
    paths
        .into_iter()
        .filter_map(|path| {
            stats.scanned += 1;
            let meta = match std::fs::symlink_metadata(&path) {
                Ok(m) => m,
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "failed to stat file, skipping");
                    stats.failed += 1;
                    return None;
                }
            };
            if !meta.is_file() {
                return None;
            }

            let size = meta.len();
            let extension = ext_of(&path);

            if config.skip_images {
                if let Some(ref ext) = extension {
                    if config.image_extensions.contains(ext) {
                        stats.filtered += 1;
                        return None;
                    }
                }
            }
            if size < config.min_file_size {
                stats.filtered += 1;
                return None;
            }

            Some(FileMetadata { path, size, mtime: mtime_secs(&meta), extension })
        })
        .collect()
}

/// Attempts to transplant a cache row whose (size, mtime) match an entry
/// under the same role but whose old path no longer exists on disk.
fn try_moved_file_recovery(cache: &HashCache, meta: &FileMetadata, role: FolderRole) -> Option<CachedEntry> {
    let candidates = cache.get_by_identity(meta.size, meta.mtime, None).ok()?;
    let mut unambiguous = candidates
        .into_iter()
        .filter(|c| c.role == role && c.path != meta.path && !c.path.exists());

    let old = unambiguous.next()?;
    if unambiguous.next().is_some() {
        return None;
    }

    let transplanted = CachedEntry {
        path: meta.path.clone(),
        role,
        digest: old.digest,
        kind: old.kind,
        size: meta.size,
        mtime: meta.mtime,
        media: old.media,
        last_seen: now_seconds(),
    };

    if cache.delete(&old.path, role).is_err() || cache.put(&transplanted).is_err() {
        return None;
    }
    Some(transplanted)
}

/// Sub-partitions a size bucket by rounded-to-second media duration. Members
/// with unknown duration fall into a "must hash" partition that always
/// proceeds; known-duration sub-partitions of cardinality 1 are dropped.
///
/// Checked for cancellation before every probe — a bucket's worth of videos
/// can be large enough on its own to matter for responsiveness — and bails
/// out with whatever has been partitioned so far rather than probing the
/// remainder.
fn prefilter_bucket(
    bucket: Vec<Candidate>,
    media_probe: &dyn MediaProbe,
    probe_duration: bool,
    cancel: &CancellationToken,
) -> Vec<Candidate> {
    if cancel.is_cancelled() {
        return Vec::new();
    }

    let any_video = bucket.iter().any(|c| is_video_ext(&ext_of(c.path())));
    if !any_video || !probe_duration {
        return bucket;
    }

    let mut by_duration: BTreeMap<i64, Vec<Candidate>> = BTreeMap::new();
    let mut must_hash: Vec<Candidate> = Vec::new();

    for candidate in bucket {
        if cancel.is_cancelled() {
            break;
        }
        let duration = candidate
            .cached_duration()
            .or_else(|| media_probe.probe(candidate.path()).and_then(|m| m.duration_seconds));
        match duration {
            Some(d) => by_duration.entry(d.round() as i64).or_default().push(candidate),
            None => must_hash.push(candidate),
        }
    }

    let mut out = must_hash;
    for (_, group) in by_duration {
        if group.len() >= 2 {
            out.extend(group);
        }
    }
    out
}

fn read_range(file: &mut File, start: u64, len: u64, buf: &mut [u8], hasher: &mut StreamingHasher) -> std::io::Result<()> {
    file.seek(SeekFrom::Start(start))?;
    let mut remaining = len;
    while remaining > 0 {
        let chunk = remaining.min(buf.len() as u64) as usize;
        let n = file.read(&mut buf[..chunk])?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        remaining -= n as u64;
    }
    Ok(())
}

fn fingerprint_file(path: &Path, size: u64, config: &Config) -> std::io::Result<(String, FingerprintKind)> {
    let plan = sampler::plan_for_size(size, config);
    let mut file = File::open(path)?;
    let mut hasher = StreamingHasher::new(config.hash_algorithm);
    let mut buf = vec![0u8; 1024 * 1024];

    match plan {
        SamplePlan::Full => loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        },
        SamplePlan::Sampled(ranges) => {
            read_range(&mut file, 0, ranges.head_len, &mut buf, &mut hasher)?;
            let tail_start = size.saturating_sub(ranges.tail_len);
            read_range(&mut file, tail_start, ranges.tail_len, &mut buf, &mut hasher)?;
        }
    }

    Ok((hasher.finish_hex(), plan.kind(size)))
}

#[derive(PartialEq, Eq, Hash)]
struct GroupKey {
    kind: FingerprintKind,
    digest: String,
    size: u64,
}

pub(crate) fn group_entries(entries: Vec<CachedEntry>) -> Vec<DuplicateGroup> {
    let mut groups: HashMap<GroupKey, Vec<CachedEntry>> = HashMap::new();
    for entry in entries {
        groups
            .entry(GroupKey { kind: entry.kind, digest: entry.digest.clone(), size: entry.size })
            .or_default()
            .push(entry);
    }
    groups
        .into_iter()
        .filter(|(_, members)| members.len() >= 2)
        .map(|(key, members)| DuplicateGroup { kind: key.kind, digest: key.digest, size: key.size, members })
        .collect()
}

/// Walks `root`, reconciles against the cache, fingerprints what's left,
/// and returns every duplicate group found within this single tree.
pub fn detect_duplicates(
    root: &Path,
    role: FolderRole,
    cache: &HashCache,
    config: &Config,
    media_probe: &dyn MediaProbe,
    cancel: &CancellationToken,
) -> (Vec<DuplicateGroup>, DetectorStats) {
    let mut stats = DetectorStats::default();

    let paths = walk_regular_files(root, cancel);
    let files = stat_and_filter(paths, config, &mut stats);

    let known = cache
        .get_by_paths(&files.iter().map(|f| f.path.clone()).collect::<Vec<_>>(), role)
        .unwrap_or_default();

    let mut resolved: Vec<Candidate> = Vec::with_capacity(files.len());
    for file in files {
        if cancel.is_cancelled() {
            break;
        }
        match known.get(&file.path) {
            Some(entry) if entry.matches_stat(file.size, file.mtime) => {
                stats.cache_hit += 1;
                resolved.push(Candidate::Known(entry.clone()));
            }
            _ => {
                if let Some(recovered) = try_moved_file_recovery(cache, &file, role) {
                    stats.moved += 1;
                    resolved.push(Candidate::Known(recovered));
                } else {
                    resolved.push(Candidate::Unhashed(file));
                }
            }
        }
    }

    let mut by_size: HashMap<u64, Vec<Candidate>> = HashMap::new();
    for candidate in resolved {
        by_size.entry(candidate.size()).or_default().push(candidate);
    }
    by_size.retain(|_, bucket| bucket.len() >= 2);

    // One bounded pool backs both media probing and fingerprinting — both
    // are I/O-bound per-file operations and share the same concurrency
    // budget (`max_workers`).
    let pool = if config.parallel_hashing {
        match rayon::ThreadPoolBuilder::new().num_threads(config.max_workers.max(1)).build() {
            Ok(pool) => Some(pool),
            Err(error) => {
                tracing::warn!(%error, "failed to build worker thread pool, falling back to sequential probing and hashing");
                None
            }
        }
    } else {
        None
    };

    let probe_duration_enabled = config.probe_duration && config.use_media_probe;
    let buckets: Vec<Vec<Candidate>> = by_size.into_values().collect();
    let to_process: Vec<Candidate> = match &pool {
        Some(pool) => pool.install(|| {
            buckets
                .into_par_iter()
                .flat_map(|bucket| prefilter_bucket(bucket, media_probe, probe_duration_enabled, cancel))
                .collect()
        }),
        None => buckets
            .into_iter()
            .flat_map(|bucket| prefilter_bucket(bucket, media_probe, probe_duration_enabled, cancel))
            .collect(),
    };

    let mut known_entries: Vec<CachedEntry> = Vec::new();
    let mut unhashed: Vec<FileMetadata> = Vec::new();
    for candidate in to_process {
        match candidate {
            Candidate::Known(entry) => known_entries.push(entry),
            Candidate::Unhashed(meta) => unhashed.push(meta),
        }
    }

    let failed_hashing = std::sync::atomic::AtomicUsize::new(0);
    let work = |fm: FileMetadata| -> Option<CachedEntry> {
        if cancel.is_cancelled() {
            return None;
        }
        match fingerprint_file(&fm.path, fm.size, config) {
            Ok((digest, kind)) => Some(CachedEntry {
                path: fm.path,
                role,
                digest,
                kind,
                size: fm.size,
                mtime: fm.mtime,
                media: None,
                last_seen: now_seconds(),
            }),
            Err(error) => {
                tracing::warn!(path = %fm.path.display(), %error, "failed to fingerprint file, skipping");
                failed_hashing.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                None
            }
        }
    };

    let fingerprinted: Vec<CachedEntry> = match &pool {
        Some(pool) => pool.install(|| unhashed.into_par_iter().filter_map(work).collect()),
        None => unhashed.into_iter().filter_map(work).collect(),
    };

    stats.hashed = fingerprinted.len();
    stats.failed += failed_hashing.into_inner();

    if !fingerprinted.is_empty() {
        if let Err(error) = cache.put_batch(&fingerprinted) {
            tracing::warn!(%error, "failed to persist fingerprints to hash cache");
        }
    }

    known_entries.extend(fingerprinted);
    let groups = group_entries(known_entries);

    (groups, stats)
}
