//! Perceptual per-pixel diff in YIQ space with anti-aliasing detection
//!
//! The tolerance in `[0, 1]` scales the maximum acceptable YIQ distance.
//! Pixels whose difference is explained by anti-aliasing in either image are
//! not counted and stay transparent in the diff raster.

use image::{Rgba, RgbaImage};

use super::{DiffEngine, PixelDiff, DIFF_COLOR, MATCH_COLOR};

/// Largest possible YIQ delta between two colors
const MAX_YIQ_DELTA: f64 = 35215.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct PixelmatchEngine {
    /// Count anti-aliased pixels as differences
    pub include_anti_aliased: bool,
}

impl DiffEngine for PixelmatchEngine {
    fn name(&self) -> &'static str {
        "pixelmatch"
    }

    fn diff(&self, baseline: &RgbaImage, candidate: &RgbaImage, tolerance: f64) -> PixelDiff {
        let (width, height) = baseline.dimensions();
        let mut raster = RgbaImage::from_pixel(width, height, MATCH_COLOR);

        if baseline.as_raw() == candidate.as_raw() {
            return PixelDiff {
                diff_pixels: 0,
                raster,
            };
        }

        let max_delta = MAX_YIQ_DELTA * tolerance * tolerance;
        let mut diff_pixels = 0u64;

        for y in 0..height {
            for x in 0..width {
                let a = baseline.get_pixel(x, y);
                let b = candidate.get_pixel(x, y);
                let delta = color_delta(a, b, false);

                if delta.abs() <= max_delta {
                    continue;
                }

                if !self.include_anti_aliased
                    && (anti_aliased(baseline, candidate, x, y)
                        || anti_aliased(candidate, baseline, x, y))
                {
                    continue;
                }

                raster.put_pixel(x, y, DIFF_COLOR);
                diff_pixels += 1;
            }
        }

        PixelDiff {
            diff_pixels,
            raster,
        }
    }
}

fn rgb2y(r: f64, g: f64, b: f64) -> f64 {
    r * 0.29889531 + g * 0.58662247 + b * 0.11448223
}

fn rgb2i(r: f64, g: f64, b: f64) -> f64 {
    r * 0.59597799 - g * 0.27417610 - b * 0.32180189
}

fn rgb2q(r: f64, g: f64, b: f64) -> f64 {
    r * 0.21147017 - g * 0.52261711 + b * 0.31114694
}

/// Composite a translucent pixel over white
fn blend_on_white(px: &Rgba<u8>) -> (f64, f64, f64) {
    let [r, g, b, a] = px.0;
    let (r, g, b) = (f64::from(r), f64::from(g), f64::from(b));
    if a == 255 {
        return (r, g, b);
    }
    let alpha = f64::from(a) / 255.0;
    let blend = |c: f64| 255.0 + (c - 255.0) * alpha;
    (blend(r), blend(g), blend(b))
}

/// Squared YIQ distance between two pixels, signed negative when `a` is
/// brighter than `b`. With `y_only` the signed luma difference is returned.
fn color_delta(a: &Rgba<u8>, b: &Rgba<u8>, y_only: bool) -> f64 {
    if a == b {
        return 0.0;
    }

    let (r1, g1, b1) = blend_on_white(a);
    let (r2, g2, b2) = blend_on_white(b);

    let y1 = rgb2y(r1, g1, b1);
    let y2 = rgb2y(r2, g2, b2);
    let y = y1 - y2;

    if y_only {
        return y;
    }

    let i = rgb2i(r1, g1, b1) - rgb2i(r2, g2, b2);
    let q = rgb2q(r1, g1, b1) - rgb2q(r2, g2, b2);
    let delta = 0.5053 * y * y + 0.299 * i * i + 0.1957 * q * q;

    if y1 > y2 {
        -delta
    } else {
        delta
    }
}

/// Inclusive 3x3 neighbourhood bounds clamped to the image
fn neighbourhood(x: u32, y: u32, width: u32, height: u32) -> (u32, u32, u32, u32) {
    (
        x.saturating_sub(1),
        y.saturating_sub(1),
        (x + 1).min(width - 1),
        (y + 1).min(height - 1),
    )
}

fn on_edge(x: u32, y: u32, bounds: (u32, u32, u32, u32)) -> bool {
    let (x0, y0, x2, y2) = bounds;
    x == x0 || x == x2 || y == y0 || y == y2
}

/// Whether the pixel at `(x, y)` in `img` looks like an anti-aliasing
/// artifact, judged against its neighbours and the `other` image
fn anti_aliased(img: &RgbaImage, other: &RgbaImage, x: u32, y: u32) -> bool {
    let (width, height) = img.dimensions();
    let bounds = neighbourhood(x, y, width, height);
    let (x0, y0, x2, y2) = bounds;
    let center = img.get_pixel(x, y);

    let mut zeroes = u32::from(on_edge(x, y, bounds));
    let mut min = 0.0f64;
    let mut max = 0.0f64;
    let mut min_at = (0, 0);
    let mut max_at = (0, 0);

    for nx in x0..=x2 {
        for ny in y0..=y2 {
            if nx == x && ny == y {
                continue;
            }

            let delta = color_delta(center, img.get_pixel(nx, ny), true);
            if delta == 0.0 {
                zeroes += 1;
                // More than two identical siblings: a solid region, not an edge
                if zeroes > 2 {
                    return false;
                }
            } else if delta < min {
                min = delta;
                min_at = (nx, ny);
            } else if delta > max {
                max = delta;
                max_at = (nx, ny);
            }
        }
    }

    // Needs both a darker and a brighter neighbour
    if min == 0.0 || max == 0.0 {
        return false;
    }

    (has_many_siblings(img, min_at.0, min_at.1) && has_many_siblings(other, min_at.0, min_at.1))
        || (has_many_siblings(img, max_at.0, max_at.1)
            && has_many_siblings(other, max_at.0, max_at.1))
}

/// Whether the pixel has more than two identical neighbours
fn has_many_siblings(img: &RgbaImage, x: u32, y: u32) -> bool {
    let (width, height) = img.dimensions();
    let bounds = neighbourhood(x, y, width, height);
    let (x0, y0, x2, y2) = bounds;
    let center = img.get_pixel(x, y);

    let mut zeroes = u32::from(on_edge(x, y, bounds));
    for nx in x0..=x2 {
        for ny in y0..=y2 {
            if nx == x && ny == y {
                continue;
            }
            if img.get_pixel(nx, ny) == center {
                zeroes += 1;
            }
            if zeroes > 2 {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    #[test]
    fn test_identical_images_have_no_diff() {
        let img = RgbaImage::from_pixel(8, 8, WHITE);
        let out = PixelmatchEngine::default().diff(&img, &img.clone(), 0.1);
        assert_eq!(out.diff_pixels, 0);
        assert!(out.raster.pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn test_solid_block_change_is_counted() {
        let a = RgbaImage::from_pixel(10, 10, WHITE);
        let mut b = a.clone();
        for y in 0..5 {
            for x in 0..5 {
                b.put_pixel(x, y, BLACK);
            }
        }

        let out = PixelmatchEngine::default().diff(&a, &b, 0.1);
        assert_eq!(out.diff_pixels, 25);
        assert_eq!(*out.raster.get_pixel(2, 2), DIFF_COLOR);
        assert_eq!(*out.raster.get_pixel(9, 9), MATCH_COLOR);
    }

    #[test]
    fn test_tolerance_hides_small_color_shift() {
        let a = RgbaImage::from_pixel(4, 4, Rgba([200, 200, 200, 255]));
        let b = RgbaImage::from_pixel(4, 4, Rgba([203, 203, 203, 255]));

        assert_eq!(PixelmatchEngine::default().diff(&a, &b, 0.1).diff_pixels, 0);
        assert_eq!(PixelmatchEngine::default().diff(&a, &b, 0.0).diff_pixels, 16);
    }

    #[test]
    fn test_color_delta_sign_and_alpha() {
        assert_eq!(color_delta(&WHITE, &WHITE, false), 0.0);
        assert!(color_delta(&WHITE, &BLACK, false) < 0.0);
        assert!(color_delta(&BLACK, &WHITE, false) > 0.0);
        // Fully transparent anything composites to white
        let clear = Rgba([0, 0, 0, 0]);
        assert!(color_delta(&clear, &WHITE, false).abs() < 1e-9);
    }

    #[test]
    fn test_max_delta_bounds_black_white() {
        let delta = color_delta(&BLACK, &WHITE, false);
        assert!(delta <= MAX_YIQ_DELTA + 1.0);
        assert!(delta > MAX_YIQ_DELTA * 0.9);
    }

    #[test]
    fn test_anti_aliased_edge_pixel_is_ignored() {
        // Left half black, right half white, with a mid-grey seam column in
        // the candidate where the baseline had a hard edge.
        let mut a = RgbaImage::from_pixel(9, 9, WHITE);
        for y in 0..9 {
            for x in 0..4 {
                a.put_pixel(x, y, BLACK);
            }
        }
        let mut b = a.clone();
        b.put_pixel(4, 4, Rgba([128, 128, 128, 255]));

        let strict = PixelmatchEngine {
            include_anti_aliased: true,
        };
        assert_eq!(strict.diff(&a, &b, 0.1).diff_pixels, 1);
        assert_eq!(PixelmatchEngine::default().diff(&a, &b, 0.1).diff_pixels, 0);
    }
}
