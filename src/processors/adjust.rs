// pixform/src/processors/adjust.rs
//! Linear tone adjustments and background compositing.
//!
//! Contrast and brightness work on RGB values, saturation goes through HSL.
//! Each adjustment is skipped at 100 percent.

use image::{Rgba, RgbaImage};

const IDENTITY_PERCENT: u32 = 100;

pub fn adjust_contrast(image: &RgbaImage, percent: u32) -> RgbaImage {
    if percent == IDENTITY_PERCENT {
        return image.clone();
    }
    let k = percent as f32 / 100.0;
    map_rgb(image, |v| (v - 128.0) * k + 128.0)
}

pub fn adjust_brightness(image: &RgbaImage, percent: u32) -> RgbaImage {
    if percent == IDENTITY_PERCENT {
        return image.clone();
    }
    let k = percent as f32 / 100.0;
    map_rgb(image, |v| v * k)
}

pub fn adjust_saturation(image: &RgbaImage, percent: u32) -> RgbaImage {
    if percent == IDENTITY_PERCENT {
        return image.clone();
    }
    let k = percent as f32 / 100.0;

    let mut output = image.clone();
    for pixel in output.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        let mut hsl = rgb_to_hsl(unit(r), unit(g), unit(b));
        hsl.s = (hsl.s * k).clamp(0.0, 1.0);
        let (r, g, b) = hsl_to_rgb(hsl);
        *pixel = Rgba([byte(r * 255.0), byte(g * 255.0), byte(b * 255.0), a]);
    }
    output
}

/// Replaces every fully transparent pixel with `fill`.
pub fn composite_background(image: &RgbaImage, fill: Rgba<u8>) -> RgbaImage {
    let mut output = image.clone();
    for pixel in output.pixels_mut().filter(|p| p.0[3] == 0) {
        *pixel = fill;
    }
    output
}

fn map_rgb(image: &RgbaImage, f: impl Fn(f32) -> f32) -> RgbaImage {
    let lut: Vec<u8> = (0..=255u8).map(|v| byte(f(f32::from(v)))).collect();
    let mut output = image.clone();
    for pixel in output.pixels_mut() {
        for channel in pixel.0.iter_mut().take(3) {
            *channel = lut[usize::from(*channel)];
        }
    }
    output
}

fn unit(v: u8) -> f32 {
    f32::from(v) / 255.0
}

fn byte(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Hsl {
    h: f32,
    s: f32,
    l: f32,
}

fn rgb_to_hsl(r: f32, g: f32, b: f32) -> Hsl {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;
    let l = (max + min) / 2.0;

    if delta < 1e-6 {
        return Hsl { h: 0.0, s: 0.0, l };
    }

    let s = if l < 0.5 {
        delta / (max + min)
    } else {
        delta / (2.0 - max - min)
    };

    let h = if max == r {
        let h = (g - b) / delta;
        if g < b {
            h + 6.0
        } else {
            h
        }
    } else if max == g {
        (b - r) / delta + 2.0
    } else {
        (r - g) / delta + 4.0
    };

    Hsl { h: h / 6.0, s, l }
}

fn hsl_to_rgb(hsl: Hsl) -> (f32, f32, f32) {
    let Hsl { h, s, l } = hsl;
    if s < 1e-6 {
        return (l, l, l);
    }

    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;

    (
        hue_to_rgb(p, q, h + 1.0 / 3.0),
        hue_to_rgb(p, q, h),
        hue_to_rgb(p, q, h - 1.0 / 3.0),
    )
}

fn hue_to_rgb(p: f32, q: f32, mut t: f32) -> f32 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }

    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RgbaImage {
        RgbaImage::from_fn(16, 16, |x, y| Rgba([(x * 16) as u8, (y * 16) as u8, 100, 255]))
    }

    #[test]
    fn test_identity_percentages() {
        let image = sample();
        assert_eq!(adjust_contrast(&image, 100), image);
        assert_eq!(adjust_brightness(&image, 100), image);
        assert_eq!(adjust_saturation(&image, 100), image);
    }

    #[test]
    fn test_zero_contrast_flattens_to_mid_gray() {
        let output = adjust_contrast(&sample(), 0);
        assert!(output.pixels().all(|p| p.0[..3] == [128, 128, 128]));
    }

    #[test]
    fn test_brightness_scales_and_clamps() {
        let image = RgbaImage::from_pixel(1, 1, Rgba([100, 200, 0, 50]));
        assert_eq!(adjust_brightness(&image, 50).get_pixel(0, 0), &Rgba([50, 100, 0, 50]));
        assert_eq!(adjust_brightness(&image, 200).get_pixel(0, 0), &Rgba([200, 255, 0, 50]));
    }

    #[test]
    fn test_zero_saturation_is_grayscale() {
        let output = adjust_saturation(&sample(), 0);
        for pixel in output.pixels() {
            assert_eq!(pixel.0[0], pixel.0[1]);
            assert_eq!(pixel.0[1], pixel.0[2]);
        }
    }

    #[test]
    fn test_hsl_round_trip_is_stable() {
        for rgb in [[255u8, 0, 0], [12, 200, 99], [0, 0, 255], [128, 128, 128]] {
            let hsl = rgb_to_hsl(unit(rgb[0]), unit(rgb[1]), unit(rgb[2]));
            let (r, g, b) = hsl_to_rgb(hsl);
            assert_eq!([byte(r * 255.0), byte(g * 255.0), byte(b * 255.0)], rgb);
        }
    }

    #[test]
    fn test_background_fills_only_transparent_pixels() {
        let image = RgbaImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                Rgba([10, 20, 30, 0])
            } else {
                Rgba([10, 20, 30, 1])
            }
        });
        let output = composite_background(&image, Rgba([255, 255, 255, 255]));
        assert_eq!(output.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
        assert_eq!(output.get_pixel(1, 0), &Rgba([10, 20, 30, 1]));
    }
}
