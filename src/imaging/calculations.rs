//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Where the scaled source lands on the target canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Scaled source width.
    pub width: u32,
    /// Scaled source height.
    pub height: u32,
    /// Left edge of the scaled source on the canvas.
    pub offset_x: u32,
    /// Top edge of the scaled source on the canvas.
    pub offset_y: u32,
}

/// Fit a source inside a target box without cropping or distortion.
///
/// Uses the largest uniform scale that keeps the whole source inside the
/// box (`min(tw / sw, th / sh)`), which may upscale. The scaled size is
/// rounded and clamped to at least one pixel, and centered with rounded
/// offsets; one axis always fills the box exactly.
///
/// # Arguments
/// * `source` - Original image dimensions (width, height)
/// * `target` - Canvas dimensions (width, height)
///
/// # Returns
/// * `None` if any source or target dimension is zero
///
/// # Examples
/// ```
/// # use simple_thumbs::imaging::{calculate_fit, Placement};
/// // 400x200 landscape into a 100x100 box: 100x50 with 25px bands
/// assert_eq!(
///     calculate_fit((400, 200), (100, 100)),
///     Some(Placement { width: 100, height: 50, offset_x: 0, offset_y: 25 })
/// );
/// ```
pub fn calculate_fit(source: (u32, u32), target: (u32, u32)) -> Option<Placement> {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;
    if src_w == 0 || src_h == 0 || tgt_w == 0 || tgt_h == 0 {
        return None;
    }

    let scale = f64::min(
        tgt_w as f64 / src_w as f64,
        tgt_h as f64 / src_h as f64,
    );

    let width = scale_edge(src_w, scale, tgt_w);
    let height = scale_edge(src_h, scale, tgt_h);

    Some(Placement {
        width,
        height,
        offset_x: center_offset(tgt_w, width),
        offset_y: center_offset(tgt_h, height),
    })
}

fn scale_edge(edge: u32, scale: f64, limit: u32) -> u32 {
    ((edge as f64 * scale).round() as u32).clamp(1, limit)
}

fn center_offset(canvas: u32, content: u32) -> u32 {
    ((canvas - content) as f64 / 2.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fit(source: (u32, u32), target: (u32, u32)) -> Placement {
        calculate_fit(source, target).unwrap()
    }

    #[test]
    fn landscape_into_square() {
        // scale = min(100/400, 100/200) = 0.25 → 100x50, 25px top and bottom
        assert_eq!(
            fit((400, 200), (100, 100)),
            Placement {
                width: 100,
                height: 50,
                offset_x: 0,
                offset_y: 25
            }
        );
    }

    #[test]
    fn portrait_into_square() {
        assert_eq!(
            fit((300, 600), (120, 120)),
            Placement {
                width: 60,
                height: 120,
                offset_x: 30,
                offset_y: 0
            }
        );
    }

    #[test]
    fn same_aspect_fills_box() {
        assert_eq!(
            fit((800, 600), (400, 300)),
            Placement {
                width: 400,
                height: 300,
                offset_x: 0,
                offset_y: 0
            }
        );
    }

    #[test]
    fn upscales_small_sources() {
        // 50x25 into 200x200: scale 4 → 200x100
        assert_eq!(
            fit((50, 25), (200, 200)),
            Placement {
                width: 200,
                height: 100,
                offset_x: 0,
                offset_y: 50
            }
        );
    }

    #[test]
    fn odd_padding_rounds_offset() {
        // 400x200 into 100x101: 100x50, (101 - 50) / 2 = 25.5 → 26
        let p = fit((400, 200), (100, 101));
        assert_eq!((p.width, p.height), (100, 50));
        assert_eq!(p.offset_y, 26);
    }

    #[test]
    fn rounds_scaled_dimensions() {
        // 1000x333 into 100x100: scale 0.1 → 100x33.3 → 100x33
        let p = fit((1000, 333), (100, 100));
        assert_eq!((p.width, p.height), (100, 33));
        // (100 - 33) / 2 = 33.5 → 34
        assert_eq!(p.offset_y, 34);
    }

    #[test]
    fn tiny_box_clamps_to_one_pixel() {
        // 1000x10 into 1x1: scale 0.001 → 1x0.01 → clamped to 1x1
        assert_eq!(
            fit((1000, 10), (1, 1)),
            Placement {
                width: 1,
                height: 1,
                offset_x: 0,
                offset_y: 0
            }
        );
    }

    #[test]
    fn extreme_aspect_keeps_one_pixel_edge() {
        let p = fit((5000, 2), (100, 100));
        assert_eq!((p.width, p.height), (100, 1));
        assert_eq!(p.offset_y, 50);
    }

    #[test]
    fn scaled_never_exceeds_box() {
        for source in [(3, 7), (1920, 1080), (1, 1), (4000, 3), (333, 999)] {
            for target in [(1, 1), (17, 5), (128, 128), (640, 480)] {
                let p = fit(source, target);
                assert!(p.width >= 1 && p.width <= target.0, "{source:?} → {target:?}");
                assert!(p.height >= 1 && p.height <= target.1, "{source:?} → {target:?}");
                assert!(p.offset_x + p.width <= target.0);
                assert!(p.offset_y + p.height <= target.1);
            }
        }
    }

    #[test]
    fn zero_dimensions_have_no_fit() {
        assert_eq!(calculate_fit((0, 100), (10, 10)), None);
        assert_eq!(calculate_fit((100, 0), (10, 10)), None);
        assert_eq!(calculate_fit((100, 100), (0, 10)), None);
    }
}
