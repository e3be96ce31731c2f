//! Decoded, uncompressed image data.

use bytes::Bytes;
use image::{DynamicImage, RgbaImage};

use crate::error::{PipelineError, Result};

/// RGBA8 pixel buffer with dimensions. The common currency between the
/// decode and encode dispatchers.
#[derive(Debug, Clone)]
pub struct PixelData {
    width: u32,
    height: u32,
    data: Bytes,
}

impl PixelData {
    pub fn new(width: u32, height: u32, data: Bytes) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(PipelineError::Decode(
                "Error al decodificar la imagen.".to_string(),
            ));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn from_image(image: DynamicImage) -> Self {
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self {
            width,
            height,
            data: Bytes::from(rgba.into_raw()),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Rebuilds an owned `image` buffer, e.g. for codecs that need one.
    pub fn to_rgba_image(&self) -> RgbaImage {
        // Length was validated at construction, from_raw cannot fail here.
        RgbaImage::from_raw(self.width, self.height, self.data.to_vec())
            .unwrap_or_else(|| RgbaImage::new(self.width, self.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_image_roundtrip() {
        let img = DynamicImage::new_rgba8(4, 3);
        let pixels = PixelData::from_image(img);
        assert_eq!(pixels.width(), 4);
        assert_eq!(pixels.height(), 3);
        assert_eq!(pixels.data().len(), 4 * 3 * 4);

        let back = pixels.to_rgba_image();
        assert_eq!(back.dimensions(), (4, 3));
    }

    #[test]
    fn test_new_rejects_wrong_length() {
        let result = PixelData::new(2, 2, Bytes::from_static(&[0u8; 3]));
        assert!(result.is_err());
    }
}
