//! On-disk snapshots of reference collections
//!
//! Stores a collection as a JSON file with an expiry timestamp so a fresh
//! process can fill the reference cache without calling the API.

use chrono::{DateTime, Duration, Utc};
use directories::ProjectDirs;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::PathBuf;

/// Default time-to-live of a snapshot, in hours
pub const DEFAULT_SNAPSHOT_TTL_HOURS: u64 = 24;

/// File layout of a snapshot
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile<T> {
    records: T,
    written_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// A snapshot read back from disk
#[derive(Debug)]
pub struct Snapshot<T> {
    pub records: T,
    pub written_at: DateTime<Utc>,
    pub is_expired: bool,
}

/// Reads and writes collection snapshots in one directory
///
/// The default directory is the XDG cache dir (`~/.cache/splitstream/` on Linux).
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
    ttl_hours: u64,
}

impl SnapshotStore {
    /// Creates a store in the platform cache directory
    ///
    /// Returns `None` if no home directory can be determined.
    pub fn new(ttl_hours: u64) -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "splitstream")?;
        Some(Self::with_dir(project_dirs.cache_dir().to_path_buf(), ttl_hours))
    }

    pub fn with_dir(dir: PathBuf, ttl_hours: u64) -> Self {
        Self { dir, ttl_hours }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }

    /// Writes `records` under `name`, replacing any previous snapshot
    pub fn write<T: Serialize>(&self, name: &str, records: &T) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;

        let now = Utc::now();
        let expires_at = i64::try_from(self.ttl_hours)
            .ok()
            .and_then(Duration::try_hours)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let file = SnapshotFile {
            records,
            written_at: now,
            expires_at,
        };

        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(self.path(name), json)
    }

    /// Reads the snapshot stored under `name`, expired or not
    ///
    /// Returns `None` if it is missing or cannot be parsed.
    pub fn read<T: DeserializeOwned>(&self, name: &str) -> Option<Snapshot<T>> {
        let content = fs::read_to_string(self.path(name)).ok()?;
        let file: SnapshotFile<T> = serde_json::from_str(&content).ok()?;

        Some(Snapshot {
            records: file.records,
            written_at: file.written_at,
            is_expired: Utc::now() > file.expires_at,
        })
    }

    /// Reads the snapshot stored under `name` only if it has not expired
    pub fn read_fresh<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.read(name)
            .filter(|snapshot: &Snapshot<T>| !snapshot.is_expired)
            .map(|snapshot| snapshot.records)
    }
}
