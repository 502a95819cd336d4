//! Virtual-to-physical path mapping and cache path derivation.
//!
//! ## Layout
//!
//! ```text
//! <web_root>/
//! └── images/                     # images_directory (the intercepted segment)
//!     ├── photo.jpg               # source
//!     ├── trips/beach.png         # nested source
//!     └── _thumbs/                # cache_directory, flat
//!         ├── photo_100x100.jpg
//!         └── beach_300x200.png
//! ```
//!
//! Cache names are `{stem}_{width}x{height}{ext}`. The key holds nothing
//! else: changing the background color or quality does not invalidate
//! existing entries, and two sources with the same file name in different
//! subdirectories share a cache slot.
//!
//! ## Sandboxing
//!
//! Request paths are joined onto the web root one segment at a time. Any
//! `..`, root, or prefix component, any backslash, and any NUL byte is a
//! [`PathError::Traversal`]; the filesystem is never touched for such paths.

use crate::size::SizeSpec;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("path escapes the web root: {0}")]
    Traversal(String),
    #[error("malformed percent-escape in path: {0}")]
    Encoding(String),
}

/// Resolves request paths against a web root.
#[derive(Debug, Clone)]
pub struct PathResolver {
    web_root: PathBuf,
    images_directory: String,
    cache_dir: PathBuf,
}

impl PathResolver {
    /// `images_directory` and `cache_directory` are single path segments.
    pub fn new(web_root: impl Into<PathBuf>, images_directory: &str, cache_directory: &str) -> Self {
        let web_root = web_root.into();
        let cache_dir = web_root.join(images_directory).join(cache_directory);
        Self {
            web_root,
            images_directory: images_directory.to_string(),
            cache_dir,
        }
    }

    pub fn web_root(&self) -> &Path {
        &self.web_root
    }

    /// Physical directory holding all cache entries.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Physical directory of the intercepted segment.
    pub fn images_dir(&self) -> PathBuf {
        self.web_root.join(&self.images_directory)
    }

    /// Whether `request_path` lies under `/<images_directory>/`.
    ///
    /// Segment-wise and ASCII case-insensitive: `/Images/a.jpg` matches,
    /// `/imagesx/a.jpg` and `/images` (no file) do not.
    pub fn matches(&self, request_path: &str) -> bool {
        let rest = request_path.strip_prefix('/').unwrap_or(request_path);
        let Some((first, tail)) = rest.split_once('/') else {
            return false;
        };
        first.eq_ignore_ascii_case(&self.images_directory) && !tail.is_empty()
    }

    /// Map a virtual path (percent-encoded, as received) onto the web root.
    ///
    /// A leading segment naming the images directory in any case resolves
    /// to the configured spelling.
    pub fn resolve_source(&self, request_path: &str) -> Result<PathBuf, PathError> {
        let decoded = percent_decode(request_path)?;
        let mut resolved = self.web_root.clone();
        let mut leading = true;

        for segment in decoded.split('/') {
            if segment.contains('\\') || segment.contains('\0') {
                return Err(PathError::Traversal(decoded.clone()));
            }
            let mut components = Path::new(segment).components();
            match (components.next(), components.next()) {
                (None, _) | (Some(Component::CurDir), None) => {}
                (Some(Component::Normal(name)), None) => {
                    if leading && name.eq_ignore_ascii_case(&self.images_directory) {
                        resolved.push(&self.images_directory);
                    } else {
                        resolved.push(name);
                    }
                    leading = false;
                }
                _ => return Err(PathError::Traversal(decoded.clone())),
            }
        }

        Ok(resolved)
    }

    /// Whether a resolved path points into the cache directory.
    pub fn is_cache_entry(&self, path: &Path) -> bool {
        path.starts_with(&self.cache_dir)
    }

    /// Cache path for a resolved source at a given size.
    ///
    /// [`SizeSpec::Original`] maps to the source itself.
    pub fn cache_path(&self, source: &Path, size: SizeSpec) -> PathBuf {
        let SizeSpec::Fit(target) = size else {
            return source.to_path_buf();
        };

        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy())
            .unwrap_or_default();
        let ext = source
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        self.cache_dir
            .join(format!("{stem}_{}x{}{ext}", target.width(), target.height()))
    }
}

/// Decode `%XX` escapes. The result must be valid UTF-8.
fn percent_decode(input: &str) -> Result<String, PathError> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes
                .get(i + 1..i + 3)
                .filter(|h| h.iter().all(u8::is_ascii_hexdigit))
                .and_then(|h| std::str::from_utf8(h).ok())
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or_else(|| PathError::Encoding(input.to_string()))?;
            out.push(hex);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| PathError::Encoding(input.to_string()))
}
