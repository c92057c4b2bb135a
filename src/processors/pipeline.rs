// pixform/src/processors/pipeline.rs
use super::{adjust, blur, edges, pixelate, posterize, Resizer};
use crate::core::{PipelineError, PipelineOptions, Result, Settings};
use image::{DynamicImage, GenericImageView};

/// The fixed stage order applied to every image.
///
/// 1. posterize
/// 2. pixelate
/// 3. gaussian blur
/// 4. edge detection
/// 5. line art
/// 6. contrast, brightness, saturation
/// 7. background fill
/// 8. resize to the output size
///
/// Every stage is a no-op at its identity setting. The input image is never
/// modified.
pub struct Pipeline {
    options: PipelineOptions,
    resizer: Resizer,
}

impl Pipeline {
    pub fn new(options: PipelineOptions) -> Self {
        let resizer = Resizer::new(options.resize_filter);
        Self { options, resizer }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn transform(&self, image: &DynamicImage, settings: &Settings) -> Result<DynamicImage> {
        settings.validate()?;
        self.options.validate()?;

        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(PipelineError::DecodeError(format!(
                "Image has empty dimensions {}x{}",
                width, height
            )));
        }

        let mut current = image.to_rgba8();

        current = posterize::posterize(&current, settings.posterize);
        current = pixelate::pixelate(&current, settings.pixelation);
        current = blur::gaussian_blur(&current, settings.blur);

        if settings.edge_detection || settings.line_art {
            let edge_map = edges::edge_map(&current);
            if settings.edge_detection {
                current = edges::apply_edges(&current, &edge_map, self.options.edge_mode);
            }
            if settings.line_art {
                current = edges::line_art(&edge_map, self.options.line_art_threshold);
            }
        }

        current = adjust::adjust_contrast(&current, settings.contrast);
        current = adjust::adjust_brightness(&current, settings.brightness);
        current = adjust::adjust_saturation(&current, settings.saturation);

        if let Some(fill) = settings.background_color.fill() {
            current = adjust::composite_background(&current, fill);
        }

        current = self.resizer.fit_longest_edge(&current, settings.output_size);

        Ok(DynamicImage::ImageRgba8(current))
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PipelineOptions::default())
    }
}

/// Runs the pipeline with the default kernel policy.
pub fn transform(image: &DynamicImage, settings: &Settings) -> Result<DynamicImage> {
    Pipeline::default().transform(image, settings)
}
