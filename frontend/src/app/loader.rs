use std::fmt;
use std::future::Future;

use bom::{BomRadarAPI, RadarUrls};
use image::RgbaImage;
use thiserror::Error;

use crate::app::utils::decode_image;

/// A decoded image, owned by whichever layer set or frame sequence holds it
pub struct RadarImage {
    pixels: RgbaImage,
}

impl RadarImage {
    pub fn from_rgba(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Only surfaces look at the pixels
    pub(crate) fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}

impl fmt::Debug for RadarImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RadarImage({}x{})", self.width(), self.height())
    }
}

/// A single image failed to load
#[derive(Debug, Error)]
#[error("failed to load {url}: {source}")]
pub struct LoadError {
    pub url: String,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl LoadError {
    pub fn new(url: &str, source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self {
            url: url.to_string(),
            source: source.into(),
        }
    }
}

/// Resolves a remote image reference to a decoded image
pub trait ImageLoader {
    /// URL scheme the references are built from
    fn urls(&self) -> &RadarUrls;

    /// Load one image; one request per call, no retry
    fn load(&self, url: &str) -> impl Future<Output = Result<RadarImage, LoadError>> + Send;
}

/// Loads images from the radar image host
pub struct BomImageLoader {
    api: BomRadarAPI,
}

impl BomImageLoader {
    pub fn new(api: BomRadarAPI) -> Self {
        Self { api }
    }
}

impl ImageLoader for BomImageLoader {
    fn urls(&self) -> &RadarUrls {
        self.api.urls()
    }

    async fn load(&self, url: &str) -> Result<RadarImage, LoadError> {
        debug!("preloading {}", url);
        let bytes = self
            .api
            .fetch_image_bytes(url)
            .await
            .map_err(|e| LoadError::new(url, e))?;
        decode_image(&bytes).map_err(|e| LoadError::new(url, e))
    }
}
