// argus-camera/src/frame.rs
use crate::{CameraError, Result};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use std::io::Write;

/// One decoded RGB frame.
///
/// The device loop keeps a single `Frame` as its working buffer and
/// lets every read overwrite it, so transforms see the pixels of the
/// current tick only.  A zero-sized image means "no frame this tick".
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbImage,
}

impl Default for Frame {
    fn default() -> Self {
        Self::empty()
    }
}

impl Frame {
    pub fn empty() -> Self {
        Self { image: RgbImage::new(0, 0) }
    }

    pub fn from_image(image: RgbImage) -> Self {
        Self { image }
    }

    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbImage {
        &mut self.image
    }

    /// Swap in freshly decoded pixels.
    pub fn replace(&mut self, image: RgbImage) {
        self.image = image;
    }

    /// Drop the pixels, leaving an empty frame behind.
    pub fn clear(&mut self) {
        self.image = RgbImage::new(0, 0);
    }

    /// JPEG-encode into `out` (one complete SOI..EOI image).
    pub fn write_jpeg<W: Write>(&self, out: &mut W, quality: u8) -> Result<()> {
        if self.is_empty() {
            return Err(CameraError::EmptyFrame);
        }
        let mut encoder = JpegEncoder::new_with_quality(out, quality.clamp(1, 100));
        encoder.encode_image(&self.image)?;
        Ok(())
    }

    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>> {
        // typical 720p JPEG is well under this
        let mut buf = Vec::with_capacity(128 * 1024);
        self.write_jpeg(&mut buf, quality)?;
        Ok(buf)
    }
}
