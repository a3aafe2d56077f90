//! Persistent, content-addressed hash cache.
//!
//! Backed by a single SQLite database (`rusqlite`, bundled libsqlite3) in
//! WAL mode. A `DashMap` write-through layer sits in front of it so
//! concurrent hashing workers can publish fingerprints without contending
//! on the database for every file; the map is authoritative for any row it
//! holds, and the orchestrator flushes it to SQLite via `put_batch` at
//! phase boundaries.

use crate::error::{DupeError, Result};
use crate::types::{CachedEntry, FingerprintKind, FolderRole, MediaFacts};
use dashmap::DashMap;
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

const READER_POOL_SIZE: usize = 4;
const BUSY_TIMEOUT_MS: u32 = 30_000;
const PATH_BATCH_SIZE: usize = 400;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS hashes (
    path TEXT NOT NULL,
    role TEXT NOT NULL,
    digest TEXT NOT NULL,
    kind TEXT NOT NULL,
    sample_bytes INTEGER,
    size INTEGER NOT NULL,
    mtime REAL NOT NULL,
    duration REAL,
    codec TEXT,
    resolution TEXT,
    last_seen REAL NOT NULL,
    PRIMARY KEY (path, role)
);
CREATE INDEX IF NOT EXISTS idx_hashes_identity ON hashes(size, mtime, digest);
CREATE INDEX IF NOT EXISTS idx_hashes_digest ON hashes(digest);
CREATE INDEX IF NOT EXISTS idx_hashes_role ON hashes(role);
";

type CacheKey = (PathBuf, &'static str);

fn key_for(path: &Path, role: FolderRole) -> CacheKey {
    (path.to_path_buf(), role.as_str())
}

pub struct HashCache {
    writer: Mutex<Connection>,
    readers: Vec<Mutex<Connection>>,
    next_reader: AtomicUsize,
    write_through: DashMap<CacheKey, CachedEntry>,
}

impl HashCache {
    pub fn open(location: &Path) -> Result<Self> {
        if let Some(parent) = location.parent() {
            if !parent.as_os_str().is_empty() {
                let _ = std::fs::create_dir_all(parent);
            }
        }

        let writer = match Self::open_writer(location) {
            Ok(conn) => conn,
            Err(error) => {
                tracing::warn!(
                    path = %location.display(),
                    %error,
                    "hash cache failed integrity check or failed to open, reinitializing"
                );
                Self::discard(location);
                Self::open_writer(location)?
            }
        };

        restrict_permissions(location);

        let mut readers = Vec::with_capacity(READER_POOL_SIZE);
        for _ in 0..READER_POOL_SIZE {
            readers.push(Mutex::new(Self::open_reader(location)?));
        }

        Ok(Self {
            writer: Mutex::new(writer),
            readers,
            next_reader: AtomicUsize::new(0),
            write_through: DashMap::new(),
        })
    }

    fn open_writer(location: &Path) -> Result<Connection> {
        let conn = Connection::open(location)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(std::time::Duration::from_millis(BUSY_TIMEOUT_MS as u64))?;
        let quick_check: String = conn.query_row("PRAGMA quick_check", [], |row| row.get(0))?;
        if quick_check != "ok" {
            return Err(DupeError::Invariant(format!("quick_check reported: {quick_check}")));
        }
        conn.execute_batch(SCHEMA)?;
        Ok(conn)
    }

    fn open_reader(location: &Path) -> Result<Connection> {
        let conn = Connection::open_with_flags(
            location,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(std::time::Duration::from_millis(BUSY_TIMEOUT_MS as u64))?;
        Ok(conn)
    }

    fn discard(location: &Path) {
        for suffix in ["", "-wal", "-shm", "-journal"] {
            let candidate = PathBuf::from(format!("{}{}", location.display(), suffix));
            let _ = std::fs::remove_file(candidate);
        }
    }

    fn reader(&self) -> &Mutex<Connection> {
        let index = self.next_reader.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        &self.readers[index]
    }

    pub fn close(self) -> Result<()> {
        Ok(())
    }

    pub fn get(&self, path: &Path, role: FolderRole) -> Result<Option<CachedEntry>> {
        let key = key_for(path, role);
        if let Some(entry) = self.write_through.get(&key) {
            return Ok(Some(entry.clone()));
        }

        let conn = self.reader().lock().expect("hash cache reader mutex poisoned");
        let row = conn
            .query_row(
                "SELECT path, role, digest, kind, sample_bytes, size, mtime, duration, codec, resolution, last_seen
                 FROM hashes WHERE path = ?1 AND role = ?2",
                rusqlite::params![path.to_string_lossy(), role.as_str()],
                row_to_raw,
            )
            .optional()?;

        Ok(row.and_then(raw_to_entry))
    }

    pub fn put(&self, entry: &CachedEntry) -> Result<()> {
        self.put_batch(std::slice::from_ref(entry))
    }

    pub fn put_batch(&self, entries: &[CachedEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut conn = self.writer.lock().expect("hash cache writer mutex poisoned");
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO hashes (path, role, digest, kind, sample_bytes, size, mtime, duration, codec, resolution, last_seen)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(path, role) DO UPDATE SET
                     digest = excluded.digest,
                     kind = excluded.kind,
                     sample_bytes = excluded.sample_bytes,
                     size = excluded.size,
                     mtime = excluded.mtime,
                     duration = excluded.duration,
                     codec = excluded.codec,
                     resolution = excluded.resolution,
                     last_seen = excluded.last_seen",
            )?;
            for entry in entries {
                let (kind_str, sample_bytes) = match entry.kind {
                    FingerprintKind::Full => ("full", None),
                    FingerprintKind::Sampled { total_bytes } => ("sampled", Some(total_bytes as i64)),
                };
                let (duration, codec, resolution) = match &entry.media {
                    Some(m) => (m.duration_seconds, m.codec.clone(), m.resolution.clone()),
                    None => (None, None, None),
                };
                stmt.execute(rusqlite::params![
                    entry.path.to_string_lossy(),
                    entry.role.as_str(),
                    entry.digest,
                    kind_str,
                    sample_bytes,
                    entry.size as i64,
                    entry.mtime,
                    duration,
                    codec,
                    resolution,
                    entry.last_seen,
                ])?;
            }
        }
        tx.commit()?;
        drop(conn);

        for entry in entries {
            self.write_through.insert(key_for(&entry.path, entry.role), entry.clone());
        }
        Ok(())
    }

    pub fn get_by_identity(&self, size: u64, mtime: f64, digest: Option<&str>) -> Result<Vec<CachedEntry>> {
        let conn = self.reader().lock().expect("hash cache reader mutex poisoned");
        let rows = if let Some(digest) = digest {
            let mut stmt = conn.prepare(
                "SELECT path, role, digest, kind, sample_bytes, size, mtime, duration, codec, resolution, last_seen
                 FROM hashes WHERE size = ?1 AND mtime = ?2 AND digest = ?3",
            )?;
            let rows = stmt.query_map(rusqlite::params![size as i64, mtime, digest], row_to_raw)?
                .filter_map(|r| r.ok())
                .collect::<Vec<_>>();
            rows
        } else {
            let mut stmt = conn.prepare(
                "SELECT path, role, digest, kind, sample_bytes, size, mtime, duration, codec, resolution, last_seen
                 FROM hashes WHERE size = ?1 AND mtime = ?2",
            )?;
            let rows = stmt.query_map(rusqlite::params![size as i64, mtime], row_to_raw)?
                .filter_map(|r| r.ok())
                .collect::<Vec<_>>();
            rows
        };
        drop(conn);

        Ok(rows.into_iter().filter_map(raw_to_entry).collect())
    }

    pub fn get_by_paths(&self, paths: &[PathBuf], role: FolderRole) -> Result<std::collections::HashMap<PathBuf, CachedEntry>> {
        let mut out = std::collections::HashMap::with_capacity(paths.len());
        let mut missing = Vec::new();

        for path in paths {
            let key = key_for(path, role);
            if let Some(entry) = self.write_through.get(&key) {
                out.insert(path.clone(), entry.clone());
            } else {
                missing.push(path.clone());
            }
        }

        for chunk in missing.chunks(PATH_BATCH_SIZE) {
            let placeholders = chunk.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            let sql = format!(
                "SELECT path, role, digest, kind, sample_bytes, size, mtime, duration, codec, resolution, last_seen
                 FROM hashes WHERE role = ? AND path IN ({placeholders})"
            );
            let conn = self.reader().lock().expect("hash cache reader mutex poisoned");
            let mut stmt = conn.prepare(&sql)?;
            let mut params: Vec<&dyn rusqlite::ToSql> = Vec::with_capacity(chunk.len() + 1);
            let role_str = role.as_str();
            params.push(&role_str);
            let path_strings: Vec<String> = chunk.iter().map(|p| p.to_string_lossy().into_owned()).collect();
            for s in &path_strings {
                params.push(s);
            }
            let rows: Vec<_> = stmt
                .query_map(params.as_slice(), row_to_raw)?
                .filter_map(|r| r.ok())
                .collect();
            drop(stmt);
            drop(conn);

            for raw in rows {
                if let Some(entry) = raw_to_entry(raw) {
                    out.insert(entry.path.clone(), entry);
                }
            }
        }

        Ok(out)
    }

    pub fn all_for_role(&self, role: FolderRole) -> Result<Vec<CachedEntry>> {
        let conn = self.reader().lock().expect("hash cache reader mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT path, role, digest, kind, sample_bytes, size, mtime, duration, codec, resolution, last_seen
             FROM hashes WHERE role = ?1",
        )?;
        let rows: Vec<_> = stmt
            .query_map([role.as_str()], row_to_raw)?
            .filter_map(|r| r.ok())
            .collect();
        drop(stmt);
        drop(conn);

        let mut by_key: std::collections::HashMap<CacheKey, CachedEntry> = rows
            .into_iter()
            .filter_map(raw_to_entry)
            .map(|e| (key_for(&e.path, e.role), e))
            .collect();

        for item in self.write_through.iter() {
            let (path, role_str) = item.key();
            if *role_str == role.as_str() {
                by_key.insert((path.clone(), *role_str), item.value().clone());
            }
        }

        Ok(by_key.into_values().collect())
    }

    pub fn delete(&self, path: &Path, role: FolderRole) -> Result<()> {
        self.write_through.remove(&key_for(path, role));
        let conn = self.writer.lock().expect("hash cache writer mutex poisoned");
        conn.execute(
            "DELETE FROM hashes WHERE path = ?1 AND role = ?2",
            rusqlite::params![path.to_string_lossy(), role.as_str()],
        )?;
        Ok(())
    }
}

type RawRow = (String, String, String, String, Option<i64>, i64, f64, Option<f64>, Option<String>, Option<String>, f64);

fn row_to_raw(row: &rusqlite::Row) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
    ))
}

fn raw_to_entry(raw: RawRow) -> Option<CachedEntry> {
    let (path, role, digest, kind, sample_bytes, size, mtime, duration, codec, resolution, last_seen) = raw;

    let role = match FolderRole::parse(&role) {
        Some(r) => r,
        None => {
            tracing::warn!(role, "dropping cache row with unrecognized role");
            return None;
        }
    };

    let kind = match kind.as_str() {
        "full" => FingerprintKind::Full,
        "sampled" => match sample_bytes {
            Some(bytes) => FingerprintKind::Sampled { total_bytes: bytes as u64 },
            None => {
                tracing::warn!(path, "dropping sampled cache row missing sample_bytes");
                return None;
            }
        },
        other => {
            tracing::warn!(path, kind = other, "dropping cache row with unrecognized fingerprint kind");
            return None;
        }
    };

    let media = if duration.is_some() || codec.is_some() || resolution.is_some() {
        Some(MediaFacts { duration_seconds: duration, codec, resolution })
    } else {
        None
    };

    Some(CachedEntry {
        path: PathBuf::from(path),
        role,
        digest,
        kind,
        size: size as u64,
        mtime,
        media,
        last_seen,
    })
}

fn restrict_permissions(location: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = std::fs::metadata(location) {
            let mut perms = metadata.permissions();
            perms.set_mode(0o600);
            let _ = std::fs::set_permissions(location, perms);
        }
    }
    #[cfg(not(unix))]
    {
        let _ = location;
    }
}
