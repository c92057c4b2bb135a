// pixform/src/processors/blur.rs
use image::{GrayImage, Luma, Rgba, RgbaImage};

/// Separable Gaussian blur applied to each RGBA channel independently.
///
/// `sigma` is the blur radius from the settings. Non-positive values return
/// the image unchanged since `imageproc` panics on them.
pub fn gaussian_blur(image: &RgbaImage, sigma: f32) -> RgbaImage {
    if sigma <= 0.0 {
        return image.clone();
    }

    log::debug!("Applying gaussian blur, sigma {}", sigma);

    let (width, height) = image.dimensions();
    let channels: [GrayImage; 4] = std::array::from_fn(|c| {
        GrayImage::from_fn(width, height, |x, y| Luma([image.get_pixel(x, y).0[c]]))
    });
    let blurred: [GrayImage; 4] =
        std::array::from_fn(|c| imageproc::filter::gaussian_blur_f32(&channels[c], sigma));

    RgbaImage::from_fn(width, height, |x, y| {
        Rgba(std::array::from_fn(|c| blurred[c].get_pixel(x, y).0[0]))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_sigma_is_identity() {
        let image = RgbaImage::from_fn(4, 4, |x, y| Rgba([x as u8 * 50, y as u8 * 50, 7, 255]));
        assert_eq!(gaussian_blur(&image, 0.0), image);
    }

    #[test]
    fn test_smooths_sharp_edge() {
        let image = RgbaImage::from_fn(12, 6, |x, _| {
            if x < 6 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        });
        let blurred = gaussian_blur(&image, 2.0);

        assert!(blurred.get_pixel(5, 3).0[0] > 0);
        assert!(blurred.get_pixel(6, 3).0[0] < 255);
        assert_eq!(blurred.dimensions(), (12, 6));
    }

    #[test]
    fn test_uniform_image_stays_uniform() {
        let image = RgbaImage::from_pixel(9, 9, Rgba([90, 120, 30, 255]));
        let blurred = gaussian_blur(&image, 1.5);
        for pixel in blurred.pixels() {
            for (got, want) in pixel.0.iter().zip([90u8, 120, 30, 255]) {
                assert!((i16::from(*got) - i16::from(want)).abs() <= 1);
            }
        }
    }
}
