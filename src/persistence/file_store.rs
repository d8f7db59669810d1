//! JSON snapshot files in a data directory
//!
//! Layout: `auction_{0..6}.json` per weekday, `auction.json` for the
//! weekly average and `day` holding the last weekday written. Every write
//! goes to a `.tmp` sibling first and is renamed into place.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{Bucket, SnapshotStore, StoreError};
use crate::pricing::ItemIndex;

const DAY_FILE: &str = "day";
const LOCK_FILE: &str = ".lock";

/// Snapshot store backed by JSON files
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    /// Open a store, creating the directory if needed
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create snapshot directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn bucket_path(&self, bucket: Bucket) -> PathBuf {
        self.dir.join(bucket.file_name())
    }

    /// Take the advisory lock for this directory. Released on drop.
    ///
    /// A lock file naming a process that no longer exists is left over from
    /// a crash; it is removed and the lock taken.
    pub fn lock(&self) -> Result<DirLock> {
        let path = self.dir.join(LOCK_FILE);
        match create_lock_file(&path)? {
            Some(lock) => Ok(lock),
            None => {
                match lock_holder(&path) {
                    Some(pid) if !process_alive(pid) => {
                        warn!(path = %path.display(), pid, "Removing stale snapshot lock");
                        fs::remove_file(&path).with_context(|| {
                            format!("Failed to remove stale lock {}", path.display())
                        })?;
                        create_lock_file(&path)?
                            .ok_or_else(|| StoreError::Locked(path.display().to_string()).into())
                    }
                    _ => Err(StoreError::Locked(path.display().to_string()).into()),
                }
            }
        }
    }
}

/// Create the lock file holding our pid, or `None` if it already exists
fn create_lock_file(path: &Path) -> Result<Option<DirLock>> {
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(None),
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to create lock file {}", path.display()));
        }
    };
    let lock = DirLock {
        path: path.to_path_buf(),
    };
    writeln!(file, "{}", std::process::id())
        .with_context(|| format!("Failed to write lock file {}", path.display()))?;
    Ok(Some(lock))
}

/// Pid recorded in a lock file, if it can be read
fn lock_holder(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

// Without procfs there is no cheap liveness check; keep the lock.
#[cfg(not(target_os = "linux"))]
fn process_alive(_pid: u32) -> bool {
    true
}

/// Held while a pass writes its snapshots
#[derive(Debug)]
pub struct DirLock {
    path: PathBuf,
}

impl Drop for DirLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to release snapshot lock");
        }
    }
}

/// Write to `<path>.tmp`, fsync, then rename over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    {
        let mut file = File::create(&tmp_path)
            .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
        file.write_all(bytes)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        file.sync_all()
            .with_context(|| format!("Failed to sync {}", tmp_path.display()))?;
    }
    fs::rename(&tmp_path, path).with_context(|| {
        format!(
            "Failed to move {} to {}",
            tmp_path.display(),
            path.display()
        )
    })?;
    Ok(())
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self, bucket: Bucket) -> Result<Option<ItemIndex>> {
        let path = self.bucket_path(bucket);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        let index: ItemIndex = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse snapshot {}", path.display()))?;
        debug!(bucket = %bucket, items = index.len(), "Loaded snapshot");
        Ok(Some(index))
    }

    fn store(&mut self, bucket: Bucket, index: &ItemIndex) -> Result<()> {
        let path = self.bucket_path(bucket);
        let json = serde_json::to_vec_pretty(index).context("Failed to serialize snapshot")?;
        write_atomic(&path, &json)?;
        debug!(bucket = %bucket, items = index.len(), path = %path.display(), "Stored snapshot");
        Ok(())
    }

    fn list_buckets(&self) -> Result<BTreeSet<Bucket>> {
        let mut buckets = BTreeSet::new();
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("Failed reading {}", self.dir.display()))?
        {
            let entry = entry?;
            if !entry.path().is_file() {
                continue;
            }
            if let Some(bucket) = entry.file_name().to_str().and_then(Bucket::from_file_name) {
                buckets.insert(bucket);
            }
        }
        Ok(buckets)
    }

    fn last_day(&self) -> Result<Option<u8>> {
        let path = self.dir.join(DAY_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let day: i32 = raw
            .trim()
            .parse()
            .with_context(|| format!("Corrupt day marker {:?} in {}", raw, path.display()))?;
        // A negative marker means "never written".
        Ok(u8::try_from(day).ok().filter(|d| *d <= 6))
    }

    fn set_last_day(&mut self, day: u8) -> Result<()> {
        write_atomic(&self.dir.join(DAY_FILE), day.to_string().as_bytes())
    }
}
