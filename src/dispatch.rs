//! Request dispatch: decide what a request gets, then produce it.
//!
//! Every request for a path goes through the same checks, in order:
//!
//! | Step | Fails with | Disposition |
//! |---|---|---|
//! | path under `/<images_directory>/` with a supported extension | | [`Unmatched`](Disposition::Unmatched) |
//! | `size` token parses and fits `max_dimension` | [`DispatchError::InvalidSize`], [`DispatchError::SizeTooLarge`] | |
//! | path resolves inside the web root | [`DispatchError::Path`] | |
//! | source file exists | | [`SourceMissing`](Disposition::SourceMissing) |
//! | `size=full` | | [`NoResizeRequested`](Disposition::NoResizeRequested) |
//! | cache entry exists | | [`CacheHit`](Disposition::CacheHit) |
//! | otherwise | | [`CacheMiss`](Disposition::CacheMiss) |
//!
//! [`Dispatcher::classify`] only looks at the filesystem; it never decodes or
//! writes. [`Dispatcher::generate`] does the rendering for a cache miss and
//! publishes the result. [`Dispatcher::dispatch`] runs both synchronously;
//! the HTTP layer calls them separately so rendering can move off the async
//! runtime.

use crate::cache::ThumbnailCache;
use crate::config::Config;
use crate::imaging::{BackendError, ImageBackend, ThumbnailConfig, create_thumbnail, is_supported};
use crate::paths::{PathError, PathResolver};
use crate::size::{SizeSpec, SizeSpecError, TargetBox, parse_size};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    InvalidSize(#[from] SizeSpecError),
    #[error("requested size {requested} exceeds the maximum dimension {max}")]
    SizeTooLarge { requested: TargetBox, max: u32 },
    #[error(transparent)]
    Path(#[from] PathError),
    #[error("cannot decode source image: {0}")]
    Decode(String),
    #[error("cannot encode thumbnail: {0}")]
    Encode(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl DispatchError {
    /// Whether the request itself is at fault (as opposed to the server).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidSize(_) | Self::SizeTooLarge { .. } | Self::Path(_)
        )
    }
}

impl From<BackendError> for DispatchError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::Io(e) => Self::Io(e),
            BackendError::Decode(msg) => Self::Decode(msg),
            BackendError::Encode(msg) => Self::Encode(msg),
        }
    }
}

/// Where a request ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Not an image request; handed to the next handler.
    Unmatched,
    /// Under the images directory but no such source; handed on.
    SourceMissing,
    /// `size=full`: the source bytes are served as-is.
    NoResizeRequested,
    /// A finished thumbnail is already on disk.
    CacheHit,
    /// The thumbnail has to be rendered first.
    CacheMiss,
}

impl Disposition {
    pub fn is_passthrough(self) -> bool {
        matches!(self, Self::Unmatched | Self::SourceMissing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unmatched => "unmatched",
            Self::SourceMissing => "source-missing",
            Self::NoResizeRequested => "original",
            Self::CacheHit => "hit",
            Self::CacheMiss => "miss",
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything known about one image request after parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailRequest {
    /// Request path as received.
    pub requested_path: String,
    pub source_path: PathBuf,
    /// Cache entry to serve; the source itself when `target` is `None`.
    pub thumbnail_path: PathBuf,
    /// `None` means serve the original.
    pub target: Option<TargetBox>,
}

/// Result of [`Dispatcher::classify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub disposition: Disposition,
    /// Absent for [`Disposition::Unmatched`].
    pub request: Option<ThumbnailRequest>,
}

impl Decision {
    fn unmatched() -> Self {
        Self {
            disposition: Disposition::Unmatched,
            request: None,
        }
    }
}

/// Result of [`Dispatcher::dispatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing was served; the caller should run the next handler.
    Passthrough(Disposition),
    /// Bytes to serve, read from (or just written to) `path`.
    Image {
        disposition: Disposition,
        path: PathBuf,
        bytes: Vec<u8>,
    },
}

/// Request-independent settings of a [`Dispatcher`].
#[derive(Debug, Clone, Copy)]
pub struct DispatchOptions {
    pub default_size: TargetBox,
    /// Upper bound on either edge of a requested box.
    pub max_dimension: u32,
    pub thumbnail: ThumbnailConfig,
}

/// Shared, stateless request dispatcher.
pub struct Dispatcher<B: ImageBackend> {
    resolver: PathResolver,
    cache: ThumbnailCache,
    backend: B,
    options: DispatchOptions,
}

impl<B: ImageBackend> Dispatcher<B> {
    pub fn new(resolver: PathResolver, backend: B, options: DispatchOptions) -> Self {
        let cache = ThumbnailCache::new(resolver.cache_dir());
        Self {
            resolver,
            cache,
            backend,
            options,
        }
    }

    pub fn from_config(config: &Config, backend: B) -> Self {
        Self::new(config.resolver(), backend, config.thumbnails.dispatch_options())
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn cache(&self) -> &ThumbnailCache {
        &self.cache
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Decide what `request_path` gets without rendering anything.
    pub fn classify(
        &self,
        request_path: &str,
        size_token: Option<&str>,
    ) -> Result<Decision, DispatchError> {
        if !self.resolver.matches(request_path) || !is_supported(Path::new(request_path)) {
            return Ok(Decision::unmatched());
        }

        // Cache entries are served as stored, never re-thumbnailed.
        let source_path = self.resolver.resolve_source(request_path);
        if matches!(&source_path, Ok(path) if self.resolver.is_cache_entry(path)) {
            return Ok(Decision::unmatched());
        }

        let size = parse_size(size_token, self.options.default_size)?;
        if let SizeSpec::Fit(target) = size
            && target.longest_edge() > self.options.max_dimension
        {
            return Err(DispatchError::SizeTooLarge {
                requested: target,
                max: self.options.max_dimension,
            });
        }

        let source_path = source_path?;
        let request = ThumbnailRequest {
            requested_path: request_path.to_string(),
            thumbnail_path: self.resolver.cache_path(&source_path, size),
            source_path,
            target: size.target(),
        };

        let disposition = if !request.source_path.is_file() {
            Disposition::SourceMissing
        } else if request.target.is_none() {
            Disposition::NoResizeRequested
        } else if self.cache.contains(&request.thumbnail_path) {
            Disposition::CacheHit
        } else {
            Disposition::CacheMiss
        };

        debug!(path = request_path, %size, %disposition, "classified request");
        Ok(Decision {
            disposition,
            request: Some(request),
        })
    }

    /// Render and publish the thumbnail for a cache miss.
    ///
    /// If the entry appeared since classification (another request won the
    /// race) its bytes are returned instead of rendering again.
    pub fn generate(&self, request: &ThumbnailRequest) -> Result<Vec<u8>, DispatchError> {
        let Some(target) = request.target else {
            return Ok(self.cache.read(&request.source_path)?);
        };
        if self.cache.contains(&request.thumbnail_path) {
            return Ok(self.cache.read(&request.thumbnail_path)?);
        }

        let start = Instant::now();
        let bytes = create_thumbnail(
            &self.backend,
            &request.source_path,
            target,
            &self.options.thumbnail,
        )
        .inspect_err(|e| warn!(source = %request.source_path.display(), error = %e, "thumbnail failed"))?;
        self.cache.store(&request.thumbnail_path, &bytes)?;

        info!(
            source = %request.source_path.display(),
            %target,
            bytes = bytes.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "generated thumbnail"
        );
        Ok(bytes)
    }

    /// Classify and serve in one call.
    pub fn dispatch(
        &self,
        request_path: &str,
        size_token: Option<&str>,
    ) -> Result<Outcome, DispatchError> {
        let Decision {
            disposition,
            request,
        } = self.classify(request_path, size_token)?;
        let Some(request) = request.filter(|_| !disposition.is_passthrough()) else {
            return Ok(Outcome::Passthrough(disposition));
        };

        let bytes = match disposition {
            Disposition::CacheMiss => self.generate(&request)?,
            _ => self.cache.read(&request.thumbnail_path)?,
        };
        Ok(Outcome::Image {
            disposition,
            path: request.thumbnail_path,
            bytes,
        })
    }
}
