//! Content-addressed duplicate detection, caching, and resolution engine
//! for very large local file collections.
//!
//! This crate covers one stage of a larger file-organization pipeline:
//! given an input tree, find duplicate files within it and, optionally,
//! against a second output tree, then delete the losers of a deterministic
//! resolution policy. Directory walking and argument parsing for any
//! surrounding tool are the caller's responsibility — this crate owns the
//! hash cache, the sampler, the detector, the resolver, and the two-phase
//! orchestrator that ties them together.
//!
//! Typical use:
//!
//! ```no_run
//! use dupe_engine::cache::HashCache;
//! use dupe_engine::config::Config;
//! use dupe_engine::media_probe::NullMediaProbe;
//! use dupe_engine::orchestrator::Orchestrator;
//! use std::path::Path;
//!
//! let cache = HashCache::open(Path::new("/var/cache/dupe-engine/hashes.db"))?;
//! let config = Config::default();
//! let probe = NullMediaProbe;
//! let mut orchestrator = Orchestrator::new(&cache, &config, &probe);
//! let report = orchestrator.run_phase_a(Path::new("/data/incoming"))?;
//! println!("found {} duplicate groups", report.groups_found);
//! # Ok::<(), dupe_engine::error::DupeError>(())
//! ```

pub mod cache;
pub mod cancel;
pub mod config;
pub mod detector;
pub mod error;
pub mod hash;
pub mod media_probe;
pub mod orchestrator;
pub mod resolver;
pub mod sampler;
pub mod types;
