//! High-level image operations.
//!
//! These functions combine calculations with backend execution.
//! They take configuration, compute parameters, and call the backend.

use super::backend::{BackendError, ImageBackend};
use super::calculations::calculate_fit;
use super::params::{Background, Quality, ThumbnailParams};
use crate::size::TargetBox;
use image::ImageFormat;
use std::path::Path;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Get image dimensions using the backend.
pub fn get_dimensions(backend: &impl ImageBackend, path: &Path) -> Result<(u32, u32)> {
    let dims = backend.identify(path)?;
    Ok((dims.width, dims.height))
}

/// Rendering settings shared by every thumbnail.
///
/// Neither value takes part in the cache key.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThumbnailConfig {
    pub background: Background,
    pub quality: Quality,
}

/// Plan a thumbnail operation without executing it.
///
/// Reads only the source header. Zero-sized sources and unknown formats are
/// decode errors.
pub fn plan_thumbnail(
    backend: &impl ImageBackend,
    source: &Path,
    target: TargetBox,
    config: &ThumbnailConfig,
) -> Result<ThumbnailParams> {
    let format = ImageFormat::from_path(source)
        .map_err(|e| BackendError::Decode(format!("{}: {}", source.display(), e)))?;
    let dims = get_dimensions(backend, source)?;
    let placement = calculate_fit(dims, (target.width(), target.height())).ok_or_else(|| {
        BackendError::Decode(format!(
            "{} has zero dimensions ({}x{})",
            source.display(),
            dims.0,
            dims.1
        ))
    })?;

    Ok(ThumbnailParams {
        source: source.to_path_buf(),
        canvas: target,
        placement,
        background: config.background,
        quality: config.quality,
        format,
    })
}

/// Render a fit-and-pad thumbnail and return its encoded bytes.
///
/// Nothing is written to disk here; see [`crate::cache::ThumbnailCache::store`].
pub fn create_thumbnail(
    backend: &impl ImageBackend,
    source: &Path,
    target: TargetBox,
    config: &ThumbnailConfig,
) -> Result<Vec<u8>> {
    let params = plan_thumbnail(backend, source, target, config)?;
    backend.thumbnail(&params)
}
