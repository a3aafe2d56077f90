//! Fixture helpers for integration tests.

use std::path::Path;
use std::time::{Duration, SystemTime};

/// Sets a file's mtime to an exact value, independent of filesystem
/// timestamp resolution, so cache-identity tests are deterministic.
pub fn set_mtime(path: &Path, seconds_since_epoch: u64) {
    let time = SystemTime::UNIX_EPOCH + Duration::from_secs(seconds_since_epoch);
    let file = std::fs::File::open(path).expect("failed to open fixture file");
    file.set_modified(time).expect("failed to set mtime");
}
