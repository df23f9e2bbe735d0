//! JSON persistence for report artifacts
//!
//! Writes go through a temp file in the destination directory followed by a
//! rename, so readers never observe a half-written file. Read-modify-write
//! spans over shared files are serialized with [`ReportLock`].

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::{Error, Result};

/// Read and parse a JSON file. A missing file yields `Ok(None)`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::io_at(path, e)),
    };

    serde_json::from_slice(&data)
        .map(Some)
        .map_err(|e| Error::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

/// Serialize `value` as pretty JSON and atomically replace `path`
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let data = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &data)
}

/// Atomically replace `path` with `data`
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| Error::io_at(parent, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|e| Error::Persist {
        path: path.to_path_buf(),
        source: e,
    })?;
    tmp.write_all(data)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| Error::Persist {
            path: path.to_path_buf(),
            source: e,
        })?;
    tmp.persist(path).map_err(|e| Error::Persist {
        path: path.to_path_buf(),
        source: e.error,
    })?;

    debug!("Wrote {} ({} bytes)", path.display(), data.len());
    Ok(())
}

/// Exclusive advisory lock held for the lifetime of the value.
///
/// On unix this is a `flock(2)` on the lock file. Elsewhere no lock is taken
/// and callers must ensure a single writer per report directory.
pub struct ReportLock {
    path: PathBuf,
    #[cfg(unix)]
    _guard: nix::fcntl::Flock<File>,
    #[cfg(not(unix))]
    _file: File,
}

impl ReportLock {
    /// Block until the lock at `path` is acquired
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::io_at(parent, e))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(|e| Error::io_at(path, e))?;

        #[cfg(unix)]
        {
            use nix::fcntl::{Flock, FlockArg};
            let guard = Flock::lock(file, FlockArg::LockExclusive).map_err(|(_, errno)| {
                Error::Lock {
                    path: path.to_path_buf(),
                    reason: errno.to_string(),
                }
            })?;
            debug!("Acquired lock {}", path.display());
            Ok(Self {
                path: path.to_path_buf(),
                _guard: guard,
            })
        }

        #[cfg(not(unix))]
        {
            Ok(Self {
                path: path.to_path_buf(),
                _file: file,
            })
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for ReportLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportLock").field("path", &self.path).finish()
    }
}
