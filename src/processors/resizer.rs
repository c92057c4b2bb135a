// pixform/src/processors/resizer.rs
use crate::core::ResizeAlgorithm;
use image::{imageops::FilterType, RgbaImage};

pub struct Resizer {
    algorithm: ResizeAlgorithm,
}

impl Resizer {
    pub fn new(algorithm: ResizeAlgorithm) -> Self {
        Self { algorithm }
    }

    /// Scales the image so its longest edge equals `edge`, keeping the aspect ratio.
    pub fn fit_longest_edge(&self, image: &RgbaImage, edge: u32) -> RgbaImage {
        let (width, height) = self.calculate_dimensions(image.width(), image.height(), edge);

        if width == image.width() && height == image.height() {
            log::debug!("Image dimensions unchanged, skipping resize");
            return image.clone();
        }

        log::debug!(
            "Resizing image from {}x{} to {}x{}",
            image.width(),
            image.height(),
            width,
            height
        );

        image::imageops::resize(image, width, height, self.get_filter_type())
    }

    fn calculate_dimensions(&self, orig_width: u32, orig_height: u32, edge: u32) -> (u32, u32) {
        if edge == 0 || orig_width.max(orig_height) == edge {
            return (orig_width, orig_height);
        }

        if orig_width >= orig_height {
            let ratio = edge as f64 / orig_width as f64;
            let height = (orig_height as f64 * ratio).round() as u32;
            (edge, height.max(1))
        } else {
            let ratio = edge as f64 / orig_height as f64;
            let width = (orig_width as f64 * ratio).round() as u32;
            (width.max(1), edge)
        }
    }

    fn get_filter_type(&self) -> FilterType {
        match self.algorithm {
            ResizeAlgorithm::Nearest => FilterType::Nearest,
            ResizeAlgorithm::Bilinear => FilterType::Triangle,
            ResizeAlgorithm::Bicubic => FilterType::CatmullRom,
            ResizeAlgorithm::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

impl Default for Resizer {
    fn default() -> Self {
        Self::new(ResizeAlgorithm::Lanczos3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_landscape_scales_width_to_edge() {
        let resizer = Resizer::default();
        assert_eq!(resizer.calculate_dimensions(400, 200, 256), (256, 128));
        assert_eq!(resizer.calculate_dimensions(100, 100, 512), (512, 512));
    }

    #[test]
    fn test_portrait_scales_height_to_edge() {
        let resizer = Resizer::default();
        assert_eq!(resizer.calculate_dimensions(300, 900, 300), (100, 300));
        assert_eq!(resizer.calculate_dimensions(3, 2000, 256), (1, 256));
    }

    #[test]
    fn test_matching_edge_skips_resize() {
        let image = RgbaImage::from_fn(256, 10, |x, _| Rgba([x as u8, 0, 0, 255]));
        let output = Resizer::new(ResizeAlgorithm::Bicubic).fit_longest_edge(&image, 256);
        assert_eq!(output, image);
    }

    #[test]
    fn test_resize_output_dimensions() {
        let image = RgbaImage::from_pixel(40, 20, Rgba([9, 9, 9, 255]));
        let output = Resizer::default().fit_longest_edge(&image, 256);
        assert_eq!(output.dimensions(), (256, 128));
    }
}
