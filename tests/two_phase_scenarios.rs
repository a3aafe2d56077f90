//! End-to-end exercises of the two-phase orchestration against a real
//! filesystem: internal dedup within a tree, then cross-tree dedup against
//! a second tree, with the "keep" resolution policy driving which copy
//! actually survives deletion.

mod helpers;

use dupe_engine::types::OrchestratorState;
use helpers::Workspace;

#[test]
fn phase_a_keeps_the_keep_tagged_copy() {
    let ws = Workspace::new();
    ws.write("input/keep/movie.mp4", b"the only copy that should survive");
    ws.write("input/downloads/random/nested/movie.mp4", b"the only copy that should survive");

    let report = ws.run_phase_a("input");

    assert_eq!(report.state, OrchestratorState::Done);
    assert_eq!(report.deleted, 1);
    assert!(ws.path("input/keep/movie.mp4").exists());
    assert!(!ws.path("input/downloads/random/nested/movie.mp4").exists());
}

#[test]
fn phase_b_removes_output_copy_of_an_input_file() {
    let ws = Workspace::new();
    // A lone input file with no internal duplicate is never fingerprinted
    // (singleton size buckets are discarded before hashing), so it would
    // never enter the cache for Phase B to find. Give it an internal
    // duplicate so Phase A actually hashes and caches the survivor.
    ws.write("input/originals/clip.mp4", b"master copy lives in input");
    ws.write("input/originals/clip_backup.mp4", b"master copy lives in input");
    ws.write("output/misc/clip_copy.mp4", b"master copy lives in input");
    ws.write("output/misc/unrelated.mp4", b"not a duplicate of anything");

    let phase_a = ws.run_phase_a("input");
    assert_eq!(phase_a.deleted, 1, "the two input-side copies dedup against each other first");

    let phase_b = ws.run_phase_b("output");

    assert_eq!(phase_b.state, OrchestratorState::Done);
    assert_eq!(phase_b.deleted, 1);
    assert!(!ws.path("output/misc/clip_copy.mp4").exists());
    assert!(ws.path("output/misc/unrelated.mp4").exists());
}

#[test]
fn phase_b_without_output_root_present_aborts_cleanly() {
    let ws = Workspace::new();
    ws.write("input/a.mp4", b"anything");
    ws.run_phase_a("input");

    let mut orchestrator =
        dupe_engine::orchestrator::Orchestrator::new(ws.cache(), &ws.config, &ws.probe);
    let result = orchestrator.run_phase_b(&ws.path("output-does-not-exist"));

    assert!(result.is_err());
    assert_eq!(orchestrator.state(), OrchestratorState::Aborted);
}

#[test]
fn repeated_phase_a_runs_are_idempotent() {
    let ws = Workspace::new();
    ws.write("input/a.mp4", b"dup");
    ws.write("input/b.mp4", b"dup");

    let first = ws.run_phase_a("input");
    assert_eq!(first.deleted, 1);

    let second = ws.run_phase_a("input");
    assert_eq!(second.deleted, 0, "nothing left to deduplicate on a second pass");
    assert_eq!(second.groups_found, 0);
}
