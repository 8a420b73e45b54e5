//! # Carrier Images
//!
//! Loading and saving the pixel buffers that hold a container.
//!
//! Any format the `image` crate can decode is accepted as a cover, but output
//! is always PNG: lossy recompression (JPEG, lossy WebP) rewrites low-order
//! bits and destroys the hidden container.

use image::{DynamicImage, GenericImageView, ImageFormat, RgbaImage};
use std::path::Path;

use crate::common::error::StegoError;

/// An RGBA8 pixel buffer used as a steganographic carrier.
///
/// Channel 0 (red) is the embedding channel; the others are never touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarrierImage {
    pixels: RgbaImage,
}

impl CarrierImage {
    pub fn new(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    /// Decode a carrier from encoded image bytes (PNG, JPEG, BMP, ...).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StegoError> {
        let img = image::load_from_memory(bytes)?;
        Ok(Self::from(img))
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StegoError> {
        let img = image::open(path)?;
        Ok(Self::from(img))
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut RgbaImage {
        &mut self.pixels
    }

    pub fn into_pixels(self) -> RgbaImage {
        self.pixels
    }

    /// Encode as PNG bytes.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>, StegoError> {
        let mut output_bytes = Vec::new();
        self.pixels.write_to(
            &mut std::io::Cursor::new(&mut output_bytes),
            ImageFormat::Png,
        )?;
        Ok(output_bytes)
    }

    /// Save as PNG regardless of the extension on `path`.
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<(), StegoError> {
        self.pixels
            .save_with_format(path, ImageFormat::Png)
            .map_err(StegoError::from)
    }
}

impl From<DynamicImage> for CarrierImage {
    fn from(img: DynamicImage) -> Self {
        let (width, height) = img.dimensions();
        log::debug!("Loaded carrier {}x{} ({:?})", width, height, img.color());
        Self {
            pixels: img.to_rgba8(),
        }
    }
}

impl From<RgbaImage> for CarrierImage {
    fn from(pixels: RgbaImage) -> Self {
        Self { pixels }
    }
}
