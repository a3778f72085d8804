//! Temp file allocation for materialized payloads.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tempfile::TempDir;
use tracing::debug;

/// Allocates paths for payload files and records which ones are in use.
pub trait TempAllocator: Send + Sync {
    /// Reserves a fresh path for a payload file.
    ///
    /// # Errors
    ///
    /// Fails when the backing directory cannot be written.
    fn allocate(&self) -> io::Result<PathBuf>;

    /// Marks `path` as holding a materialized payload.
    fn bind(&self, path: &Path);
}

/// Allocator backed by a private temp directory, removed on drop.
pub struct TempFileAllocator {
    dir: TempDir,
    next: AtomicU64,
    bound: Mutex<Vec<PathBuf>>,
}

impl TempFileAllocator {
    /// Creates the backing directory.
    ///
    /// # Errors
    ///
    /// Fails when the system temp location is not writable.
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            dir: TempDir::new()?,
            next: AtomicU64::new(0),
            bound: Mutex::new(Vec::new()),
        })
    }

    /// Paths currently bound to materialized payloads.
    #[must_use]
    pub fn bound_paths(&self) -> Vec<PathBuf> {
        self.bound
            .lock()
            .map(|paths| paths.clone())
            .unwrap_or_default()
    }
}

impl TempAllocator for TempFileAllocator {
    fn allocate(&self) -> io::Result<PathBuf> {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        Ok(self.dir.path().join(format!("payload-{id}.bin")))
    }

    fn bind(&self, path: &Path) {
        debug!(path = %path.display(), "temp payload bound");
        if let Ok(mut paths) = self.bound.lock() {
            paths.push(path.to_path_buf());
        }
    }
}
