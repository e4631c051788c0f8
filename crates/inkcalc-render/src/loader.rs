//! Image loader that fetches bytes and decodes them with the `image` crate.

use inkcalc_core::BoxFuture;
use inkcalc_core::loader::{ImageLoader, ImageSource, LoadError};
use inkcalc_core::surface::{RasterImage, decode_data_uri};

/// Loads data URIs, local files and HTTP(S) URLs.
#[derive(Debug, Clone, Default)]
pub struct DecodingImageLoader {
    client: reqwest::Client,
}

impl DecodingImageLoader {
    pub fn new() -> Self {
        Self::default()
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, LoadError> {
        log::debug!("Fetching image from {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn read_file(path: &std::path::Path) -> Result<Vec<u8>, LoadError> {
    Ok(std::fs::read(path)?)
}

#[cfg(target_arch = "wasm32")]
fn read_file(path: &std::path::Path) -> Result<Vec<u8>, LoadError> {
    Err(LoadError::Unsupported(format!(
        "local file {} in the browser",
        path.display()
    )))
}

/// Decode PNG, JPEG or WebP bytes into straight RGBA.
pub fn decode_image(bytes: &[u8]) -> Result<RasterImage, LoadError> {
    let decoded = image::load_from_memory(bytes).map_err(|e| LoadError::Decode(e.to_string()))?;
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(RasterImage::new(width, height, rgba.into_vec())?)
}

impl ImageLoader for DecodingImageLoader {
    fn load<'a>(
        &'a self,
        source: &'a ImageSource,
    ) -> BoxFuture<'a, Result<RasterImage, LoadError>> {
        Box::pin(async move {
            let bytes = match source {
                ImageSource::DataUri(uri) => decode_data_uri(uri)?.1,
                ImageSource::Url(url) => self.fetch(url).await?,
                ImageSource::Path(path) => read_file(path)?,
            };
            decode_image(&bytes)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RasterSurface;
    use inkcalc_core::surface::{DrawingSurface, to_png_data_uri};
    use kurbo::Point;

    fn sample_png() -> Vec<u8> {
        let mut surface = RasterSurface::new(3, 2).unwrap();
        let image = RasterImage::new(1, 1, vec![0, 200, 0, 255]).unwrap();
        surface.draw_image(&image, Point::new(1.0, 1.0));
        surface.encode_png().unwrap()
    }

    #[test]
    fn test_decode_image() {
        let image = decode_image(&sample_png()).unwrap();
        assert_eq!((image.width, image.height), (3, 2));
        assert_eq!(&image.pixels[16..20], &[0, 200, 0, 255]);
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(decode_image(b"not an image"), Err(LoadError::Decode(_))));
    }

    #[tokio::test]
    async fn test_load_data_uri() {
        let loader = DecodingImageLoader::new();
        let source = ImageSource::parse(&to_png_data_uri(&sample_png())).unwrap();
        let image = loader.load(&source).await.unwrap();
        assert_eq!((image.width, image.height), (3, 2));
    }

    #[tokio::test]
    async fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dot.png");
        std::fs::write(&path, sample_png()).unwrap();

        let loader = DecodingImageLoader::new();
        let image = loader.load(&ImageSource::Path(path)).await.unwrap();
        assert_eq!(image.width, 3);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let loader = DecodingImageLoader::new();
        let source = ImageSource::Path("/nonexistent/inkcalc/dot.png".into());
        assert!(matches!(loader.load(&source).await, Err(LoadError::Io(_))));
    }
}
