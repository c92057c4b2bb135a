// pixform/src/processors/posterize.rs
use crate::core::settings::POSTERIZE_OFF;
use image::RgbaImage;

/// Quantizes each colour channel to `levels` evenly spaced values.
///
/// Alpha is left alone. `levels` at or above 16 returns the image unchanged.
pub fn posterize(image: &RgbaImage, levels: u8) -> RgbaImage {
    if levels >= POSTERIZE_OFF || levels < 2 {
        return image.clone();
    }

    log::debug!("Posterizing to {} levels per channel", levels);

    let step = 255.0 / f32::from(levels - 1);
    let lut: Vec<u8> = (0..=255u8)
        .map(|v| ((f32::from(v) / step).round() * step).round().clamp(0.0, 255.0) as u8)
        .collect();

    let mut output = image.clone();
    for pixel in output.pixels_mut() {
        for channel in pixel.0.iter_mut().take(3) {
            *channel = lut[usize::from(*channel)];
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::collections::BTreeSet;

    fn gradient() -> RgbaImage {
        RgbaImage::from_fn(64, 4, |x, y| {
            Rgba([(x * 4) as u8, (255 - x * 4) as u8, (y * 60) as u8, 200])
        })
    }

    #[test]
    fn test_two_levels_yields_two_values_per_channel() {
        let output = posterize(&gradient(), 2);

        for c in 0..3 {
            let values: BTreeSet<u8> = output.pixels().map(|p| p.0[c]).collect();
            assert!(values.len() <= 2, "channel {} has {:?}", c, values);
            assert!(values.iter().all(|v| *v == 0 || *v == 255));
        }
    }

    #[test]
    fn test_idempotent() {
        for levels in 2..16 {
            let once = posterize(&gradient(), levels);
            let twice = posterize(&once, levels);
            assert_eq!(once, twice, "levels = {}", levels);
        }
    }

    #[test]
    fn test_alpha_untouched() {
        let output = posterize(&gradient(), 3);
        assert!(output.pixels().all(|p| p.0[3] == 200));
    }

    #[test]
    fn test_off_value_is_identity() {
        let image = gradient();
        assert_eq!(posterize(&image, 16), image);
    }
}
