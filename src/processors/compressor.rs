// pixform/src/processors/compressor.rs
use crate::core::{PipelineError, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use oxipng::{optimize_from_memory, Options};
use std::io::Cursor;
use std::path::Path;

pub struct Compressor {
    quality: u8,
    optimize_png: bool,
}

impl Compressor {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
            optimize_png: true,
        }
    }

    pub fn with_png_optimization(mut self, optimize: bool) -> Self {
        self.optimize_png = optimize;
        self
    }

    pub fn save_with_format(
        &self,
        image: &DynamicImage,
        path: &Path,
        format: ImageFormat,
    ) -> Result<u64> {
        let data = self.compress_to_bytes(image, format)?;
        std::fs::write(path, &data)?;

        log::info!("Saved image: {} ({} bytes)", path.display(), data.len());
        Ok(data.len() as u64)
    }

    /// Encodes `image` in `format`.
    pub fn compress_to_bytes(&self, image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
        log::debug!(
            "Encoding {}x{} image as {:?}, quality: {}",
            image.width(),
            image.height(),
            format,
            self.quality
        );

        let mut buffer = Cursor::new(Vec::new());

        match format {
            ImageFormat::Jpeg => {
                // JPEG has no alpha channel
                let rgb = DynamicImage::ImageRgb8(flatten(image, PAPER));
                let encoder = JpegEncoder::new_with_quality(&mut buffer, self.quality);
                rgb.write_with_encoder(encoder).map_err(encode_error)?;
            }
            ImageFormat::Png => {
                image.write_to(&mut buffer, ImageFormat::Png).map_err(encode_error)?;
                if self.optimize_png {
                    return self.optimize_png_bytes(&buffer.into_inner());
                }
            }
            _ => {
                image.write_to(&mut buffer, format).map_err(encode_error)?;
            }
        }

        Ok(buffer.into_inner())
    }

    fn optimize_png_bytes(&self, data: &[u8]) -> Result<Vec<u8>> {
        optimize_from_memory(data, &Options::default())
            .map_err(|e| PipelineError::EncodeError(format!("PNG optimization failed: {}", e)))
    }

    pub fn calculate_savings(&self, original_size: u64, compressed_size: u64) -> f64 {
        if original_size == 0 {
            return 0.0;
        }

        let savings = (original_size as f64 - compressed_size as f64) / original_size as f64 * 100.0;
        savings.max(0.0)
    }
}

/// Fill behind transparent pixels for formats without alpha.
const PAPER: Rgb<u8> = Rgb([255, 255, 255]);

/// Composites `image` over an opaque `paper` color.
fn flatten(image: &DynamicImage, paper: Rgb<u8>) -> RgbImage {
    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = u32::from(a);
        let mix = |c: u8, p: u8| {
            ((u32::from(c) * alpha + u32::from(p) * (255 - alpha) + 127) / 255) as u8
        };
        Rgb([mix(r, paper[0]), mix(g, paper[1]), mix(b, paper[2])])
    })
}

fn encode_error(e: image::ImageError) -> PipelineError {
    PipelineError::EncodeError(e.to_string())
}
