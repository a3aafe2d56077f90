//! Test harness shared by the engine's integration tests.

pub mod fixtures;

use dupe_engine::cache::HashCache;
use dupe_engine::config::Config;
use dupe_engine::media_probe::NullMediaProbe;
use dupe_engine::orchestrator::{Orchestrator, PhaseReport};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A scratch workspace with its own hash cache, ready for orchestrator runs.
pub struct Workspace {
    pub config: Config,
    pub probe: NullMediaProbe,
    cache: HashCache,
    _temp_dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        // Best-effort: surfaces the crate's tracing output under `cargo test
        // -- --nocapture`. Every test binary calls this, so a second
        // `try_init` failing (subscriber already set) is expected, not an error.
        let _ = tracing_subscriber::fmt().with_test_writer().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).try_init();

        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let cache = HashCache::open(&temp_dir.path().join("hashes.db")).expect("failed to open hash cache");

        let mut config = Config::default();
        config.min_file_size = 0;
        config.use_media_probe = false;
        config.dry_run = false;

        Workspace { config, probe: NullMediaProbe, cache, _temp_dir: temp_dir }
    }

    pub fn root(&self) -> &Path {
        self._temp_dir.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root().join(rel)
    }

    pub fn write(&self, rel: &str, contents: &[u8]) -> PathBuf {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent dir");
        }
        std::fs::write(&path, contents).expect("failed to write fixture file");
        path
    }

    pub fn run_phase_a(&self, input_rel: &str) -> PhaseReport {
        let mut orchestrator = Orchestrator::new(&self.cache, &self.config, &self.probe);
        orchestrator.run_phase_a(&self.path(input_rel)).expect("phase A failed")
    }

    pub fn run_phase_b(&self, output_rel: &str) -> PhaseReport {
        let mut orchestrator = Orchestrator::new(&self.cache, &self.config, &self.probe);
        orchestrator.run_phase_b(&self.path(output_rel)).expect("phase B failed")
    }

    pub fn cache(&self) -> &HashCache {
        &self.cache
    }
}
