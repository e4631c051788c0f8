//! Image sources and asynchronous image loading.

use crate::BoxFuture;
use crate::surface::{RasterImage, SurfaceError};
use kurbo::Point;
use std::path::PathBuf;
use thiserror::Error;

/// Image loading errors.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Invalid image source: {0}")]
    InvalidSource(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Fetching {url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error(transparent)]
    Surface(#[from] SurfaceError),
    #[error("Unsupported image source: {0}")]
    Unsupported(String),
}

/// Where an image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Inline `data:` URI.
    DataUri(String),
    /// `http://` or `https://` URL.
    Url(String),
    /// Local file, given as a path or a `file://` URL.
    Path(PathBuf),
}

impl ImageSource {
    /// Classify a user-supplied reference.
    pub fn parse(reference: &str) -> Result<Self, LoadError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(LoadError::InvalidSource("empty reference".to_string()));
        }

        let lower = reference.to_ascii_lowercase();
        if lower.starts_with("data:") {
            Ok(Self::DataUri(reference.to_string()))
        } else if lower.starts_with("http://") || lower.starts_with("https://") {
            Ok(Self::Url(reference.to_string()))
        } else if lower.starts_with("file://") {
            Ok(Self::Path(PathBuf::from(&reference["file://".len()..])))
        } else {
            Ok(Self::Path(PathBuf::from(reference)))
        }
    }
}

/// Fetches and decodes images into straight RGBA buffers.
pub trait ImageLoader {
    fn load<'a>(&'a self, source: &'a ImageSource) -> BoxFuture<'a, Result<RasterImage, LoadError>>;
}

/// Why an image is being loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImagePurpose {
    /// Placed by the image tool. Recorded and persisted once drawn.
    Place,
    /// Persisted raster redrawn at startup. Only drawn.
    Restore,
}

/// An image load requested by the session, to be completed by the host.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingImage {
    pub source: String,
    /// Top-left corner of the drawn image.
    pub at: Point,
    pub purpose: ImagePurpose,
    pub(crate) epoch: u64,
}

impl PendingImage {
    /// Surface epoch the load was requested in.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}
