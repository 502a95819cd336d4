//! On-disk thumbnail cache.
//!
//! Rendering is the expensive part of serving a thumbnail. This module keeps
//! every rendered thumbnail on disk so later requests for the same
//! (source, size) pair are a plain file read.
//!
//! # Design
//!
//! The cache is a single flat directory. Entries are addressed by file name
//! only, as derived by [`PathResolver::cache_path`](crate::paths::PathResolver::cache_path):
//! `{stem}_{width}x{height}{ext}`. There is no manifest and no index: an
//! entry exists if and only if its file exists.
//!
//! Entries are never invalidated or evicted. Replacing a source image, or
//! changing the background color or quality, leaves stale thumbnails in
//! place until the directory is cleared by hand.
//!
//! ## Publishing
//!
//! Thumbnails are written to a temporary file inside the cache directory,
//! flushed, then renamed over the final name. Concurrent generators for the
//! same entry each publish a complete file and the last rename wins; a reader
//! sees either no file or a whole one, never a truncated one.
//!
//! ## Startup
//!
//! [`ThumbnailCache::initialize`] creates the directory once, before the
//! server accepts requests. Generation never creates directories.

use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Handle on the cache directory.
#[derive(Debug, Clone)]
pub struct ThumbnailCache {
    dir: PathBuf,
}

impl ThumbnailCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the cache directory (and parents). Safe to call repeatedly.
    pub fn initialize(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.dir)
    }

    /// Whether a finished entry exists at `path`.
    pub fn contains(&self, path: &Path) -> bool {
        path.is_file()
    }

    /// Read a finished entry.
    pub fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    /// Atomically publish `bytes` at `path`.
    ///
    /// The temporary file lives next to the target so the final rename never
    /// crosses filesystems. On error the temporary file is removed.
    pub fn store(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let parent = path.parent().unwrap_or(&self.dir);
        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

/// Summary of cache performance for a warm run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    pub fn miss(&mut self) {
        self.misses += 1;
    }

    pub fn total(&self) -> u32 {
        self.hits + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} generated ({} total)",
                self.hits,
                self.misses,
                self.total()
            )
        } else {
            write!(f, "{} generated", self.misses)
        }
    }
}
