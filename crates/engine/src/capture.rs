//! Screenshot capture capability
//!
//! Each automation driver is adapted behind [`ScreenshotDriver`]; the engine
//! only sees the returned bytes and decodes them as a raster.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

use visreg_common::{Dimensions, Framework, ScreenshotIdentity};

use crate::error::{VisregError, VisregResult};

/// Driver-independent capture options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureOptions {
    /// Capture the full scrollable page rather than the viewport
    pub full_page: bool,
    /// Restrict the capture to one element
    pub selector: Option<String>,
    /// Viewport to use, if the driver supports resizing
    pub viewport: Option<Dimensions>,
}

/// A driver that can produce PNG bytes for a screenshot identity
#[async_trait]
pub trait ScreenshotDriver: Send + Sync {
    fn framework(&self) -> Framework;

    async fn capture(
        &self,
        identity: &ScreenshotIdentity,
        options: &CaptureOptions,
    ) -> VisregResult<Vec<u8>>;
}

/// Adapter for screenshots an external runner already wrote to disk
#[derive(Debug, Clone)]
pub struct FileDriver {
    framework: Framework,
    source: PathBuf,
}

impl FileDriver {
    pub fn new(framework: Framework, source: impl Into<PathBuf>) -> Self {
        Self {
            framework,
            source: source.into(),
        }
    }
}

#[async_trait]
impl ScreenshotDriver for FileDriver {
    fn framework(&self) -> Framework {
        self.framework
    }

    async fn capture(
        &self,
        identity: &ScreenshotIdentity,
        _options: &CaptureOptions,
    ) -> VisregResult<Vec<u8>> {
        debug!("Reading screenshot for {} from {}", identity, self.source.display());
        tokio::fs::read(&self.source)
            .await
            .map_err(|e| VisregError::Capture {
                name: identity.name.clone(),
                reason: format!("{}: {}", self.source.display(), e),
            })
    }
}
