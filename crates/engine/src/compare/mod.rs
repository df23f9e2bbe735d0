//! Screenshot comparison
//!
//! [`Comparator`] loads a baseline and a candidate, runs a [`DiffEngine`]
//! picked from an [`EngineRegistry`], always writes the diff raster, and
//! scores the result against the pass/fail threshold.

mod channel;
mod pixelmatch;

pub use channel::ChannelEngine;
pub use pixelmatch::PixelmatchEngine;

use image::{ImageFormat, Rgba, RgbaImage};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use visreg_common::config::DEFAULT_ENGINE;
use visreg_common::{ComparisonResult, Dimensions};

use crate::error::{VisregError, VisregResult};

/// Diff raster color for differing pixels
pub const DIFF_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);

/// Diff raster color for matching pixels
pub const MATCH_COLOR: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Engines that are recognised by name but not implemented yet
pub const DEFERRED_ENGINES: &[&str] = &["odiff", "ssim"];

/// Output of a diff engine
#[derive(Debug, Clone)]
pub struct PixelDiff {
    /// Pixels classified as different
    pub diff_pixels: u64,
    /// Same dimensions as the inputs; transparent where pixels match
    pub raster: RgbaImage,
}

/// A pixel comparison algorithm.
///
/// Inputs always share dimensions; the [`Comparator`] rejects mismatches
/// before calling an engine. `tolerance` is the per-pixel sensitivity in
/// `[0, 1]`, distinct from the aggregate pass threshold.
pub trait DiffEngine: Send + Sync {
    fn name(&self) -> &'static str;

    fn diff(&self, baseline: &RgbaImage, candidate: &RgbaImage, tolerance: f64) -> PixelDiff;
}

/// Diff engines keyed by name
#[derive(Clone)]
pub struct EngineRegistry {
    engines: HashMap<String, Arc<dyn DiffEngine>>,
    default_engine: Arc<dyn DiffEngine>,
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl EngineRegistry {
    /// Registry with `pixelmatch` (default) and `channel`
    pub fn with_builtin() -> Self {
        let default_engine: Arc<dyn DiffEngine> = Arc::new(PixelmatchEngine::default());
        let mut registry = Self {
            engines: HashMap::new(),
            default_engine: default_engine.clone(),
        };
        registry.register(default_engine);
        registry.register(Arc::new(ChannelEngine));
        registry
    }

    pub fn register(&mut self, engine: Arc<dyn DiffEngine>) {
        self.engines.insert(engine.name().to_string(), engine);
    }

    /// Exact lookup
    pub fn get(&self, name: &str) -> VisregResult<Arc<dyn DiffEngine>> {
        self.engines
            .get(name)
            .cloned()
            .ok_or_else(|| VisregError::EngineUnavailable(name.to_string()))
    }

    /// Lookup that falls back to the default engine with a warning
    pub fn resolve(&self, name: &str) -> Arc<dyn DiffEngine> {
        match self.get(name) {
            Ok(engine) => engine,
            Err(e) => {
                if DEFERRED_ENGINES.contains(&name) {
                    warn!(
                        "{}: engine is declared but not implemented, falling back to '{}'",
                        e,
                        self.default_engine.name()
                    );
                } else {
                    warn!(
                        "{}: unknown engine, falling back to '{}'",
                        e,
                        self.default_engine.name()
                    );
                }
                self.default_engine.clone()
            }
        }
    }
}

/// Compares screenshot files on disk
#[derive(Clone)]
pub struct Comparator {
    registry: EngineRegistry,
    pixel_tolerance: f64,
}

impl Default for Comparator {
    fn default() -> Self {
        Self::new(EngineRegistry::with_builtin(), 0.1)
    }
}

impl Comparator {
    pub fn new(registry: EngineRegistry, pixel_tolerance: f64) -> Self {
        Self {
            registry,
            pixel_tolerance,
        }
    }

    /// Compare `compare_path` against `baseline_path` and write the diff
    /// raster to `diff_path`.
    ///
    /// Nothing is written when either input is missing or the dimensions
    /// differ. Inputs are never modified.
    pub fn compare(
        &self,
        baseline_path: &Path,
        compare_path: &Path,
        diff_path: &Path,
        threshold: f64,
        engine: &str,
    ) -> VisregResult<ComparisonResult> {
        let baseline_bytes =
            read_input(baseline_path, |path| VisregError::BaselineMissing { path })?;
        let candidate_bytes =
            read_input(compare_path, |path| VisregError::CandidateMissing { path })?;

        // Fallback warnings apply to identical inputs too
        let engine = self.registry.resolve(engine);

        let name = baseline_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        let baseline = decode(baseline_path, &baseline_bytes)?;

        // Byte-identical files: skip pixel work, still emit an empty diff
        if hash(&baseline_bytes) == hash(&candidate_bytes) {
            debug!(
                "Screenshots for '{}' are byte-identical, skipping {}",
                name,
                engine.name()
            );
            let (width, height) = baseline.dimensions();
            write_diff(diff_path, &RgbaImage::from_pixel(width, height, MATCH_COLOR))?;
            return Ok(ComparisonResult::compared(
                name,
                baseline_path.to_path_buf(),
                compare_path.to_path_buf(),
                diff_path.to_path_buf(),
                0.0,
                threshold,
                Dimensions { width, height },
            ));
        }

        let candidate = decode(compare_path, &candidate_bytes)?;

        if baseline.dimensions() != candidate.dimensions() {
            return Err(VisregError::IncompatibleDimensions {
                baseline: baseline.dimensions(),
                candidate: candidate.dimensions(),
            });
        }

        let (width, height) = baseline.dimensions();
        let dimensions = Dimensions { width, height };

        let PixelDiff {
            diff_pixels,
            raster,
        } = engine.diff(&baseline, &candidate, self.pixel_tolerance);
        write_diff(diff_path, &raster)?;

        let total_pixels = dimensions.pixel_count();
        let diff_percentage = if total_pixels == 0 {
            0.0
        } else {
            diff_pixels as f64 / total_pixels as f64
        };

        let result = ComparisonResult::compared(
            name,
            baseline_path.to_path_buf(),
            compare_path.to_path_buf(),
            diff_path.to_path_buf(),
            diff_percentage,
            threshold,
            dimensions,
        );

        if result.passed {
            info!(
                "'{}' matches baseline ({:.4} <= {:.4}, engine {})",
                result.name,
                diff_percentage,
                threshold,
                engine.name()
            );
        } else {
            warn!(
                "Visual change in '{}': {:.2}% pixels differ (threshold: {:.2}%)",
                result.name,
                diff_percentage * 100.0,
                threshold * 100.0
            );
        }

        Ok(result)
    }
}

fn read_input(
    path: &Path,
    missing: impl FnOnce(PathBuf) -> VisregError,
) -> VisregResult<Vec<u8>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(missing(path.to_path_buf())),
        Err(e) => Err(VisregError::io(path, e)),
    }
}

fn decode(path: &Path, bytes: &[u8]) -> VisregResult<RgbaImage> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgba8())
        .map_err(|source| VisregError::Decode {
            path: path.to_path_buf(),
            source,
        })
}

fn hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn write_diff(path: &Path, raster: &RgbaImage) -> VisregResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| VisregError::io(parent, e))?;
    }
    raster.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}
