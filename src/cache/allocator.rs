//! Process-scoped scratch directories.
//!
//! Each directory is named `<prefix>_<pid>_<unique>` under the temp root.
//! The pid makes names collision-free across concurrent runs and lets a
//! later run find directories left behind by a crashed one. Do not change
//! the scheme without updating [`parse_scratch_name`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::liveness::{platform_probe, Liveness, ProcessProbe};
use crate::error::{Result, StencilError};

/// Default prefix for scratch directory names.
pub const DEFAULT_PREFIX: &str = "stencil";

/// An allocated scratch directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheHandle {
    path: PathBuf,
    pid: u32,
    created_at: DateTime<Utc>,
}

impl CacheHandle {
    /// The scratch directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Process that owns the directory.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// When the directory was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Size information about a scratch directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheInfo {
    /// Whether the directory is present.
    pub exists: bool,
    /// Regular files found while walking the tree.
    pub file_count: u64,
    /// Sum of file sizes in bytes.
    pub size_bytes: u64,
}

/// Outcome of an orphan sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReclaimReport {
    /// Directories with a matching name.
    pub scanned: usize,
    /// Directories deleted because their owner is dead.
    pub reclaimed: Vec<PathBuf>,
    /// Directories kept because their owner is (or may be) alive.
    pub kept: usize,
    /// Orphans whose deletion failed.
    pub failed: usize,
}

/// A scratch directory discovered on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchEntry {
    /// Directory path.
    pub path: PathBuf,
    /// Owning pid parsed from the name.
    pub pid: u32,
    /// Probe result for the owner.
    pub liveness: Liveness,
    /// Whether this process allocated it.
    pub owned: bool,
}

/// Creates, tracks and cleans up scratch directories.
///
/// One allocator is owned by the top-level invocation. Dropping it releases
/// every directory it still tracks.
pub struct CacheAllocator {
    root: PathBuf,
    prefix: String,
    pid: u32,
    probe: Box<dyn ProcessProbe>,
    tracked: Vec<CacheHandle>,
}

impl std::fmt::Debug for CacheAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheAllocator")
            .field("root", &self.root)
            .field("prefix", &self.prefix)
            .field("pid", &self.pid)
            .field("tracked", &self.tracked.len())
            .finish()
    }
}

impl CacheAllocator {
    /// Allocator under the system temp directory.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::with_root(std::env::temp_dir(), prefix)
    }

    /// Allocator under a custom root.
    pub fn with_root(root: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            prefix: prefix.into(),
            pid: std::process::id(),
            probe: platform_probe(),
            tracked: Vec::new(),
        }
    }

    /// Replace the liveness probe.
    pub fn with_probe(mut self, probe: Box<dyn ProcessProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Root under which scratch directories are created.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Name prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Handles not yet released.
    pub fn tracked(&self) -> &[CacheHandle] {
        &self.tracked
    }

    /// Create a new scratch directory owned by this process.
    pub fn allocate(&mut self) -> Result<CacheHandle> {
        let name_prefix = format!("{}_{}_", self.prefix, self.pid);
        let dir = tempfile::Builder::new()
            .prefix(&name_prefix)
            .rand_bytes(8)
            .tempdir_in(&self.root)
            .map_err(|source| StencilError::Allocation {
                root: self.root.clone(),
                source,
            })?;

        let handle = CacheHandle {
            path: dir.keep(),
            pid: self.pid,
            created_at: Utc::now(),
        };

        tracing::debug!("Allocated scratch directory {}", handle.path.display());
        self.tracked.push(handle.clone());
        Ok(handle)
    }

    /// Delete a scratch directory and stop tracking it.
    ///
    /// A missing directory is fine. The handle is untracked even if the
    /// deletion fails, so a handle is never released twice.
    pub fn release(&mut self, handle: &CacheHandle) {
        self.tracked.retain(|h| h.path != handle.path);

        match fs::remove_dir_all(&handle.path) {
            Ok(()) => tracing::debug!("Released scratch directory {}", handle.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "Failed to remove scratch directory {}: {}",
                handle.path.display(),
                e
            ),
        }
    }

    /// Release every tracked handle.
    pub fn release_all(&mut self) {
        for handle in std::mem::take(&mut self.tracked) {
            self.release(&handle);
        }
    }

    /// List scratch directories with this allocator's prefix.
    pub fn scan(&self) -> Vec<ScratchEntry> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Cannot read {}: {}", self.root.display(), e);
                return Vec::new();
            }
        };

        let mut found = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(pid) = entry
                .file_name()
                .to_str()
                .and_then(|name| parse_scratch_name(name, &self.prefix))
            else {
                continue;
            };

            let owned = pid == self.pid || self.tracked.iter().any(|h| h.path == path);
            let liveness = if pid == self.pid {
                Liveness::Alive
            } else {
                self.probe.probe(pid)
            };

            found.push(ScratchEntry {
                path,
                pid,
                liveness,
                owned,
            });
        }

        found.sort_by(|a, b| a.path.cmp(&b.path));
        found
    }

    /// Delete scratch directories whose owning process is confirmed dead.
    pub fn reclaim_orphans(&mut self) -> ReclaimReport {
        let mut report = ReclaimReport::default();

        for entry in self.scan() {
            report.scanned += 1;

            if entry.owned || entry.liveness.may_be_alive() {
                report.kept += 1;
                continue;
            }

            match fs::remove_dir_all(&entry.path) {
                Ok(()) => {
                    tracing::info!(
                        "Reclaimed orphaned scratch directory {} (pid {})",
                        entry.path.display(),
                        entry.pid
                    );
                    report.reclaimed.push(entry.path);
                }
                // Another run reclaimed it first
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!("Failed to reclaim {}: {}", entry.path.display(), e);
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Existence, file count and size of a handle's directory.
    pub fn info(&self, handle: &CacheHandle) -> CacheInfo {
        directory_info(&handle.path)
    }
}

impl Drop for CacheAllocator {
    fn drop(&mut self) {
        self.release_all();
    }
}

/// Parse `<prefix>_<pid>_<unique>` and return the pid.
pub fn parse_scratch_name(name: &str, prefix: &str) -> Option<u32> {
    let rest = name.strip_prefix(prefix)?.strip_prefix('_')?;
    let (pid, unique) = rest.split_once('_')?;
    if unique.is_empty() || !pid.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    pid.parse().ok()
}

/// Walk a directory tree, skipping anything unreadable.
pub fn directory_info(path: &Path) -> CacheInfo {
    if !path.is_dir() {
        return CacheInfo::default();
    }

    let mut info = CacheInfo {
        exists: true,
        ..CacheInfo::default()
    };
    let mut stack = vec![path.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                stack.push(entry.path());
            } else if file_type.is_file() {
                info.file_count += 1;
                info.size_bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
            }
        }
    }

    info
}
