//! Hash cache durability: fingerprints survive a close/reopen cycle and a
//! corrupted database file is recovered from rather than treated as fatal.

use dupe_engine::cache::HashCache;
use dupe_engine::types::{CachedEntry, FingerprintKind, FolderRole};
use std::path::PathBuf;
use tempfile::tempdir;

fn entry(path: &str) -> CachedEntry {
    CachedEntry {
        path: PathBuf::from(path),
        role: FolderRole::Input,
        digest: "feedface".to_string(),
        kind: FingerprintKind::Full,
        size: 42,
        mtime: 1_700_000_000.0,
        media: None,
        last_seen: 1_700_000_000.0,
    }
}

#[test]
fn fingerprints_survive_close_and_reopen() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("hashes.db");

    {
        let cache = HashCache::open(&db_path).unwrap();
        cache.put(&entry("/library/movie.mp4")).unwrap();
        cache.close().unwrap();
    }

    let cache = HashCache::open(&db_path).unwrap();
    let fetched = cache.get(&PathBuf::from("/library/movie.mp4"), FolderRole::Input).unwrap();
    assert_eq!(fetched.unwrap().digest, "feedface");
}

#[test]
fn corrupted_database_file_is_reinitialized_not_fatal() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("hashes.db");
    std::fs::write(&db_path, b"definitely not a sqlite database").unwrap();

    let cache = HashCache::open(&db_path).unwrap();
    cache.put(&entry("/library/movie.mp4")).unwrap();
    assert!(cache.get(&PathBuf::from("/library/movie.mp4"), FolderRole::Input).unwrap().is_some());
}

#[test]
fn put_batch_is_visible_to_a_fresh_connection() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("hashes.db");

    let cache = HashCache::open(&db_path).unwrap();
    let entries = vec![entry("/a.mp4"), entry("/b.mp4"), entry("/c.mp4")];
    cache.put_batch(&entries).unwrap();
    drop(cache);

    let reopened = HashCache::open(&db_path).unwrap();
    let all = reopened.all_for_role(FolderRole::Input).unwrap();
    assert_eq!(all.len(), 3);
}
