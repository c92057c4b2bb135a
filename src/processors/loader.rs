// pixform/src/processors/loader.rs
use crate::core::{PipelineError, Result};
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use std::io::Cursor;

#[derive(Clone)]
pub struct Loader {
    max_dimensions: Option<(u32, u32)>,
}

impl Loader {
    pub fn new() -> Self {
        Self {
            max_dimensions: Some((100_000, 100_000)),
        }
    }

    pub fn with_max_dimensions(mut self, width: u32, height: u32) -> Self {
        self.max_dimensions = Some((width, height));
        self
    }

    /// Decodes raw bytes in any supported raster format.
    pub fn load_from_bytes(&self, data: &[u8]) -> Result<DynamicImage> {
        if data.is_empty() {
            return Err(PipelineError::DecodeError("empty input".to_string()));
        }

        let image = ImageReader::new(Cursor::new(data))
            .with_guessed_format()?
            .decode()
            .map_err(|e| PipelineError::DecodeError(format!("Failed to decode image: {}", e)))?;

        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(PipelineError::DecodeError(format!(
                "Image has empty dimensions {}x{}",
                width, height
            )));
        }

        if let Some((max_w, max_h)) = self.max_dimensions {
            if width > max_w || height > max_h {
                return Err(PipelineError::DecodeError(format!(
                    "Image dimensions {}x{} exceed maximum {}x{}",
                    width, height, max_w, max_h
                )));
            }
        }

        log::debug!(
            "Decoded image: {}x{} pixels, color: {:?}",
            width,
            height,
            image.color()
        );

        Ok(image)
    }

    /// Format implied by a path or storage key extension.
    pub fn detect_format(&self, key: &str) -> Option<ImageFormat> {
        ImageFormat::from_path(key).ok()
    }

    pub fn guess_format(&self, data: &[u8]) -> Option<ImageFormat> {
        image::guess_format(data).ok()
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn png_bytes() -> Vec<u8> {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 255])));
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_decodes_png() {
        let loader = Loader::new();
        let image = loader.load_from_bytes(&png_bytes()).unwrap();
        assert_eq!(image.dimensions(), (3, 2));
        assert_eq!(loader.guess_format(&png_bytes()), Some(ImageFormat::Png));
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let loader = Loader::new();
        assert!(matches!(
            loader.load_from_bytes(b"definitely not an image"),
            Err(PipelineError::DecodeError(_))
        ));
        assert!(matches!(
            loader.load_from_bytes(&[]),
            Err(PipelineError::DecodeError(_))
        ));
    }

    #[test]
    fn test_dimension_limit() {
        let loader = Loader::new().with_max_dimensions(2, 2);
        assert!(matches!(
            loader.load_from_bytes(&png_bytes()),
            Err(PipelineError::DecodeError(_))
        ));
    }

    #[test]
    fn test_detect_format_from_key() {
        let loader = Loader::new();
        assert_eq!(loader.detect_format("a/b/photo.JPG"), Some(ImageFormat::Jpeg));
        assert_eq!(loader.detect_format("notes.txt"), None);
    }
}
