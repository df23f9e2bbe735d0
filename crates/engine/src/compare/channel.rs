//! Per-channel absolute tolerance diff

use image::RgbaImage;

use super::{DiffEngine, PixelDiff, DIFF_COLOR, MATCH_COLOR};

/// Flags a pixel when any RGBA channel differs by more than
/// `tolerance * 255`. Cheap and predictable, but blind to anti-aliasing.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelEngine;

impl ChannelEngine {
    fn pixels_differ(a: &[u8], b: &[u8], tolerance: i32) -> bool {
        a.iter()
            .zip(b)
            .any(|(x, y)| (i32::from(*x) - i32::from(*y)).abs() > tolerance)
    }
}

impl DiffEngine for ChannelEngine {
    fn name(&self) -> &'static str {
        "channel"
    }

    fn diff(&self, baseline: &RgbaImage, candidate: &RgbaImage, tolerance: f64) -> PixelDiff {
        let (width, height) = baseline.dimensions();
        let channel_tolerance = (tolerance.clamp(0.0, 1.0) * 255.0).round() as i32;

        let mut raster = RgbaImage::from_pixel(width, height, MATCH_COLOR);
        let mut diff_pixels = 0u64;

        for (x, y, a) in baseline.enumerate_pixels() {
            let b = candidate.get_pixel(x, y);
            if Self::pixels_differ(&a.0, &b.0, channel_tolerance) {
                diff_pixels += 1;
                raster.put_pixel(x, y, DIFF_COLOR);
            }
        }

        PixelDiff {
            diff_pixels,
            raster,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_within_tolerance() {
        let a = RgbaImage::from_pixel(3, 3, Rgba([100, 100, 100, 255]));
        let b = RgbaImage::from_pixel(3, 3, Rgba([110, 100, 100, 255]));

        // 0.1 * 255 rounds to 26
        assert_eq!(ChannelEngine.diff(&a, &b, 0.1).diff_pixels, 0);
        assert_eq!(ChannelEngine.diff(&a, &b, 0.0).diff_pixels, 9);
    }

    #[test]
    fn test_alpha_channel_counts() {
        let a = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 0, 255]));
        let mut b = a.clone();
        b.put_pixel(1, 0, Rgba([0, 0, 0, 0]));

        let out = ChannelEngine.diff(&a, &b, 0.1);
        assert_eq!(out.diff_pixels, 1);
        assert_eq!(*out.raster.get_pixel(1, 0), DIFF_COLOR);
        assert_eq!(*out.raster.get_pixel(0, 0), MATCH_COLOR);
    }
}
