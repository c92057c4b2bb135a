// pixform/src/processors/edges.rs
use crate::core::EdgeMode;
use image::{GrayImage, Luma, Rgba, RgbaImage};

/// Largest single-direction Sobel response for 8-bit input.
const SOBEL_SCALE: f32 = 4.0;

/// Sobel gradient magnitude of the image luma, scaled to 0-255.
pub fn edge_map(image: &RgbaImage) -> GrayImage {
    let gray = image::imageops::grayscale(image);
    let gradients = imageproc::gradients::sobel_gradients(&gray);

    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let magnitude = f32::from(gradients.get_pixel(x, y).0[0]) / SOBEL_SCALE;
        Luma([magnitude.round().min(255.0) as u8])
    })
}

/// Combines the edge map with the image colour channels. Alpha is kept.
pub fn apply_edges(image: &RgbaImage, edges: &GrayImage, mode: EdgeMode) -> RgbaImage {
    log::debug!("Applying edge map ({:?})", mode);

    let factor = match mode {
        EdgeMode::Replace => 1.0,
        EdgeMode::Blend(factor) => factor.clamp(0.0, 1.0),
    };

    RgbaImage::from_fn(image.width(), image.height(), |x, y| {
        let Rgba([r, g, b, a]) = *image.get_pixel(x, y);
        let e = f32::from(edges.get_pixel(x, y).0[0]);
        let mix = |v: u8| (f32::from(v) * (1.0 - factor) + e * factor).round() as u8;
        Rgba([mix(r), mix(g), mix(b), a])
    })
}

/// Thresholds the edge map into opaque black strokes.
///
/// Everything below the threshold becomes fully transparent so the
/// background stage decides the paper colour.
pub fn line_art(edges: &GrayImage, threshold: u8) -> RgbaImage {
    log::debug!("Rendering line art, threshold {}", threshold);

    RgbaImage::from_fn(edges.width(), edges.height(), |x, y| {
        if edges.get_pixel(x, y).0[0] >= threshold {
            Rgba([0, 0, 0, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split_image() -> RgbaImage {
        RgbaImage::from_fn(10, 10, |x, _| {
            if x < 5 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        })
    }

    #[test]
    fn test_flat_image_has_no_edges() {
        let image = RgbaImage::from_pixel(8, 8, Rgba([40, 80, 120, 255]));
        assert!(edge_map(&image).pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn test_boundary_is_detected() {
        let edges = edge_map(&split_image());
        assert!(edges.get_pixel(5, 5).0[0] > 200);
        assert_eq!(edges.get_pixel(1, 5).0[0], 0);
        assert_eq!(edges.get_pixel(8, 5).0[0], 0);
    }

    #[test]
    fn test_replace_and_blend() {
        let image = split_image();
        let edges = edge_map(&image);

        let replaced = apply_edges(&image, &edges, EdgeMode::Replace);
        assert_eq!(replaced.get_pixel(8, 5), &Rgba([0, 0, 0, 255]));

        let untouched = apply_edges(&image, &edges, EdgeMode::Blend(0.0));
        assert_eq!(untouched, image);
    }

    #[test]
    fn test_line_art_is_binary() {
        let strokes = line_art(&edge_map(&split_image()), 64);

        for pixel in strokes.pixels() {
            assert!(pixel.0 == [0, 0, 0, 255] || pixel.0 == [0, 0, 0, 0]);
        }
        assert_eq!(strokes.get_pixel(5, 5).0[3], 255);
        assert_eq!(strokes.get_pixel(0, 5).0[3], 0);
    }
}
