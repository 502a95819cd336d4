//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `image::image_dimensions` (header only) |
//! | Decode (JPEG, PNG, TIFF, WebP) | `image::ImageReader` with content sniffing |
//! | Resize | `image::imageops::resize` with `CatmullRom` (bicubic) filter |
//! | Pad | `RgbaImage::from_pixel` canvas + `image::imageops::overlay` (alpha blend) |
//! | Encode → JPEG | `JpegEncoder::new_with_quality` |
//! | Encode → PNG/TIFF/WebP | `DynamicImage::write_to` (lossless, quality unused) |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::{Quality, ThumbnailParams};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageError, ImageFormat, ImageReader, Rgba, RgbaImage};
use std::io::Cursor;
use std::path::Path;
use std::sync::LazyLock;

/// Extensions whose decoders are compiled in.
const PHOTO_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    PHOTO_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled() && fmt.writing_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of image file extensions that can be both read and written.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Whether a path names a file this backend can thumbnail.
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            supported_input_extensions()
                .iter()
                .any(|s| s.eq_ignore_ascii_case(ext))
        })
}

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_error(path: &Path, err: ImageError) -> BackendError {
    match err {
        ImageError::IoError(e) => BackendError::Io(e),
        other => BackendError::Decode(format!("{}: {}", path.display(), other)),
    }
}

/// Load and decode an image from disk, sniffing the real format.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    let img = ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| decode_error(path, e))?;
    if img.width() == 0 || img.height() == 0 {
        return Err(BackendError::Decode(format!(
            "{} has zero dimensions",
            path.display()
        )));
    }
    Ok(img)
}

/// Scale the source into place on a background-filled canvas.
fn compose(img: &DynamicImage, params: &ThumbnailParams) -> RgbaImage {
    let placement = params.placement;
    let scaled = imageops::resize(
        &img.to_rgba8(),
        placement.width,
        placement.height,
        FilterType::CatmullRom,
    );

    let mut canvas = RgbaImage::from_pixel(
        params.canvas.width(),
        params.canvas.height(),
        Rgba(params.background.rgba()),
    );
    imageops::overlay(
        &mut canvas,
        &scaled,
        i64::from(placement.offset_x),
        i64::from(placement.offset_y),
    );
    canvas
}

/// Encode a canvas in the given format.
///
/// JPEG has no alpha channel: the canvas is flattened to RGB first.
fn encode(canvas: RgbaImage, format: ImageFormat, quality: Quality) -> Result<Vec<u8>, BackendError> {
    let mut buf = Cursor::new(Vec::new());
    let result = match format {
        ImageFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(canvas).to_rgb8());
            let encoder = JpegEncoder::new_with_quality(&mut buf, quality.value() as u8);
            rgb.write_with_encoder(encoder)
        }
        other => DynamicImage::ImageRgba8(canvas).write_to(&mut buf, other),
    };
    result.map_err(|e| BackendError::Encode(format!("{format:?}: {e}")))?;
    Ok(buf.into_inner())
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = ImageReader::open(path)?
            .with_guessed_format()?
            .into_dimensions()
            .map_err(|e| decode_error(path, e))?;
        Ok(Dimensions { width, height })
    }

    fn thumbnail(&self, params: &ThumbnailParams) -> Result<Vec<u8>, BackendError> {
        let img = load_image(&params.source)?;
        let canvas = compose(&img, params);
        encode(canvas, params.format, params.quality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::calculations::calculate_fit;
    use crate::imaging::params::Background;
    use crate::size::TargetBox;
    use image::{ImageEncoder, RgbImage};

    const RED: [u8; 4] = [255, 0, 0, 255];

    #[test]
    fn supported_extensions_match_decodable_formats() {
        let exts = super::supported_input_extensions();
        for expected in &["jpg", "jpeg", "png", "tif", "tiff", "webp"] {
            assert!(
                exts.contains(expected),
                "expected {expected} in supported extensions"
            );
        }
    }

    #[test]
    fn is_supported_ignores_case() {
        assert!(is_supported(Path::new("a/photo.JPG")));
        assert!(is_supported(Path::new("photo.webp")));
        assert!(!is_supported(Path::new("notes.txt")));
        assert!(!is_supported(Path::new("README")));
    }

    /// Create a small valid JPEG file with the given dimensions.
    fn create_test_jpeg(path: &Path, width: u32, height: u32) {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let file = std::fs::File::create(path).unwrap();
        let writer = std::io::BufWriter::new(file);
        image::codecs::jpeg::JpegEncoder::new(writer)
            .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
            .unwrap();
    }

    /// Create a solid-color PNG (lossless, so pixels can be checked exactly).
    fn create_solid_png(path: &Path, width: u32, height: u32, color: [u8; 4]) {
        RgbaImage::from_pixel(width, height, Rgba(color))
            .save_with_format(path, ImageFormat::Png)
            .unwrap();
    }

    fn params_for(source: &Path, src: (u32, u32), canvas: (u32, u32), format: ImageFormat) -> ThumbnailParams {
        ThumbnailParams {
            source: source.to_path_buf(),
            canvas: TargetBox::new(canvas.0, canvas.1).unwrap(),
            placement: calculate_fit(src, canvas).unwrap(),
            background: Background([0, 0, 255, 255]),
            quality: Quality::new(85),
            format,
        }
    }

    fn close_to(actual: &Rgba<u8>, expected: [u8; 4]) -> bool {
        actual
            .0
            .iter()
            .zip(expected)
            .all(|(a, e)| a.abs_diff(e) <= 2)
    }

    #[test]
    fn identify_synthetic_jpeg() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("test.jpg");
        create_test_jpeg(&path, 200, 150);

        let backend = RustBackend::new();
        let dims = backend.identify(&path).unwrap();
        assert_eq!(dims.width, 200);
        assert_eq!(dims.height, 150);
    }

    #[test]
    fn identify_and_render_agree_on_misnamed_source() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("really_a_png.jpg");
        create_solid_png(&path, 60, 30, RED);

        let backend = RustBackend::new();
        let dims = backend.identify(&path).unwrap();
        assert_eq!((dims.width, dims.height), (60, 30));

        let bytes = backend
            .thumbnail(&params_for(&path, (60, 30), (20, 20), ImageFormat::Jpeg))
            .unwrap();
        let thumb = image::load_from_memory(&bytes).unwrap();
        assert_eq!((thumb.width(), thumb.height()), (20, 20));
    }

    #[test]
    fn identify_nonexistent_file_errors() {
        let backend = RustBackend::new();
        let result = backend.identify(Path::new("/nonexistent/image.jpg"));
        assert!(matches!(result, Err(BackendError::Io(_))));
    }

    #[test]
    fn thumbnail_corrupt_source_is_decode_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("broken.png");
        std::fs::write(&path, b"definitely not a png").unwrap();

        let backend = RustBackend::new();
        let result = backend.thumbnail(&params_for(&path, (10, 10), (5, 5), ImageFormat::Png));
        assert!(matches!(result, Err(BackendError::Decode(_))));
    }

    #[test]
    fn thumbnail_pads_landscape_source() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("photo.png");
        create_solid_png(&source, 400, 200, RED);

        let backend = RustBackend::new();
        let bytes = backend
            .thumbnail(&params_for(&source, (400, 200), (100, 100), ImageFormat::Png))
            .unwrap();

        let thumb = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(thumb.dimensions(), (100, 100));

        // 100x50 source band centered, 25px of background above and below
        let blue = [0, 0, 255, 255];
        for x in [0, 50, 99] {
            assert_eq!(thumb.get_pixel(x, 0).0, blue);
            assert_eq!(thumb.get_pixel(x, 24).0, blue);
            assert!(close_to(thumb.get_pixel(x, 26), RED));
            assert!(close_to(thumb.get_pixel(x, 50), RED));
            assert!(close_to(thumb.get_pixel(x, 73), RED));
            assert_eq!(thumb.get_pixel(x, 75).0, blue);
            assert_eq!(thumb.get_pixel(x, 99).0, blue);
        }
    }

    #[test]
    fn thumbnail_pads_portrait_source() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("tall.png");
        create_solid_png(&source, 100, 300, RED);

        let backend = RustBackend::new();
        let bytes = backend
            .thumbnail(&params_for(&source, (100, 300), (90, 60), ImageFormat::Png))
            .unwrap();

        // scale 0.2 → 20x60 at x offset 35
        let thumb = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(thumb.dimensions(), (90, 60));
        assert_eq!(thumb.get_pixel(34, 30).0, [0, 0, 255, 255]);
        assert!(close_to(thumb.get_pixel(45, 30), RED));
        assert_eq!(thumb.get_pixel(55, 30).0, [0, 0, 255, 255]);
    }

    #[test]
    fn thumbnail_keeps_jpeg_format() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("photo.jpg");
        create_test_jpeg(&source, 400, 200);

        let backend = RustBackend::new();
        let bytes = backend
            .thumbnail(&params_for(&source, (400, 200), (100, 100), ImageFormat::Jpeg))
            .unwrap();

        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Jpeg);
        let thumb = image::load_from_memory(&bytes).unwrap();
        assert_eq!((thumb.width(), thumb.height()), (100, 100));
    }

    #[test]
    fn thumbnail_upscales_small_source() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("small.png");
        create_solid_png(&source, 10, 5, RED);

        let backend = RustBackend::new();
        let bytes = backend
            .thumbnail(&params_for(&source, (10, 5), (200, 200), ImageFormat::Png))
            .unwrap();

        let thumb = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(thumb.dimensions(), (200, 200));
        assert!(close_to(thumb.get_pixel(100, 100), RED));
        assert_eq!(thumb.get_pixel(100, 10).0, [0, 0, 255, 255]);
    }

    #[test]
    fn thumbnail_one_pixel_box() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("wide.png");
        create_solid_png(&source, 300, 2, RED);

        let backend = RustBackend::new();
        let bytes = backend
            .thumbnail(&params_for(&source, (300, 2), (1, 1), ImageFormat::Png))
            .unwrap();

        let thumb = image::load_from_memory(&bytes).unwrap();
        assert_eq!((thumb.width(), thumb.height()), (1, 1));
    }

    #[test]
    fn thumbnail_to_webp() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("photo.webp");
        RgbaImage::from_pixel(64, 32, Rgba(RED))
            .save_with_format(&source, ImageFormat::WebP)
            .unwrap();

        let backend = RustBackend::new();
        let bytes = backend
            .thumbnail(&params_for(&source, (64, 32), (32, 32), ImageFormat::WebP))
            .unwrap();

        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::WebP);
    }
}
