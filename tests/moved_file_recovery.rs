//! A file renamed within its tree (same size and mtime, different path) is
//! recognized via the cache's moved-file recovery path instead of being
//! rehashed from scratch.

mod helpers;

use helpers::fixtures::set_mtime;
use helpers::Workspace;

#[test]
fn renamed_file_is_recovered_without_rehashing() {
    let ws = Workspace::new();
    // A lone file has no internal duplicate, so a singleton size bucket
    // discards it before fingerprinting and it never enters the cache. Give
    // it a same-content sibling so the first scan actually hashes and caches
    // a survivor, then rename that survivor and look for it again.
    let original = ws.write("tree/original.bin", b"unique payload, never duplicated");
    let sibling = ws.write("tree/original_sibling.bin", b"unique payload, never duplicated");
    set_mtime(&original, 1_700_000_000);
    set_mtime(&sibling, 1_700_000_000);

    let first = ws.run_phase_a("tree");
    assert_eq!(first.stats.hashed, 2, "both copies must be hashed before one is deleted");
    assert_eq!(first.deleted, 1, "the two copies dedup against each other first");

    // Lexicographically smaller path wins the tie-break, so `original.bin`
    // is the survivor left on disk and in the cache.
    assert!(ws.path("tree/original.bin").exists());
    assert!(!ws.path("tree/original_sibling.bin").exists());

    let moved = ws.path("tree/moved.bin");
    std::fs::rename(&original, &moved).unwrap();
    set_mtime(&moved, 1_700_000_000);

    let second = ws.run_phase_a("tree");
    assert_eq!(second.stats.hashed, 0, "renamed file must not be rehashed");
    assert_eq!(second.stats.moved, 1, "renamed file must be recovered via identity lookup");
}

#[test]
fn moved_file_recovery_does_not_fire_when_content_coexists() {
    let ws = Workspace::new();
    // A lone file is never cached on its own (singleton bucket discard), so
    // the first run here leaves nothing in the cache to recover from.
    let original = ws.write("tree/original.bin", b"shared content, still present");
    set_mtime(&original, 1_700_000_000);
    ws.run_phase_a("tree");

    // Same size/mtime as `original.bin`, but `original.bin` is still on disk —
    // this is a genuine new duplicate, not a move, and both must be hashed.
    let sibling = ws.write("tree/sibling.bin", b"shared content, still present");
    set_mtime(&sibling, 1_700_000_000);

    let report = ws.run_phase_a("tree");
    assert_eq!(report.stats.moved, 0);
    assert_eq!(report.stats.hashed, 2);
    assert_eq!(report.groups_found, 1);
}
