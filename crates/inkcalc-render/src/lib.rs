//! InkCalc Render Library
//!
//! CPU raster surface and image decoding for InkCalc. The surface uses
//! tiny-skia so it runs the same natively and in WebAssembly.

mod loader;
mod raster;

pub use loader::{DecodingImageLoader, decode_image};
pub use raster::RasterSurface;
