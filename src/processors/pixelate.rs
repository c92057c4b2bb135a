// pixform/src/processors/pixelate.rs
use image::{Rgba, RgbaImage};

/// Mosaic filter: every `block` x `block` cell becomes its mean colour.
///
/// Cells are anchored at the top-left corner, so the right and bottom
/// cells may be smaller than `block`.
pub fn pixelate(image: &RgbaImage, block: u32) -> RgbaImage {
    if block <= 1 {
        return image.clone();
    }

    log::debug!("Pixelating with block size {}", block);

    let (width, height) = image.dimensions();
    let mut output = RgbaImage::new(width, height);

    for by in (0..height).step_by(block as usize) {
        for bx in (0..width).step_by(block as usize) {
            let x_end = (bx + block).min(width);
            let y_end = (by + block).min(height);

            let mut sums = [0u64; 4];
            for y in by..y_end {
                for x in bx..x_end {
                    let pixel = image.get_pixel(x, y);
                    for (sum, value) in sums.iter_mut().zip(pixel.0) {
                        *sum += u64::from(value);
                    }
                }
            }

            let count = u64::from((x_end - bx) * (y_end - by));
            let mean = Rgba(sums.map(|s| ((s + count / 2) / count) as u8));

            for y in by..y_end {
                for x in bx..x_end {
                    output.put_pixel(x, y, mean);
                }
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noise(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            let v = (x * 31 + y * 17) % 256;
            Rgba([v as u8, (v * 3 % 256) as u8, (255 - v) as u8, 255])
        })
    }

    #[test]
    fn test_blocks_are_uniform() {
        let k = 4;
        let output = pixelate(&noise(18, 11), k);

        for by in (0..11).step_by(k as usize) {
            for bx in (0..18).step_by(k as usize) {
                let first = output.get_pixel(bx, by);
                for y in by..(by + k).min(11) {
                    for x in bx..(bx + k).min(18) {
                        assert_eq!(output.get_pixel(x, y), first, "block at ({}, {})", bx, by);
                    }
                }
            }
        }
    }

    #[test]
    fn test_block_color_is_mean() {
        let image = RgbaImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                Rgba([0, 100, 10, 255])
            } else {
                Rgba([100, 200, 20, 255])
            }
        });
        let output = pixelate(&image, 2);
        assert_eq!(output.get_pixel(0, 0), &Rgba([50, 150, 15, 255]));
        assert_eq!(output.get_pixel(1, 0), &Rgba([50, 150, 15, 255]));
    }

    #[test]
    fn test_block_of_one_is_identity() {
        let image = noise(5, 5);
        assert_eq!(pixelate(&image, 1), image);
        assert_eq!(pixelate(&image, 0), image);
    }

    #[test]
    fn test_block_larger_than_image() {
        let output = pixelate(&noise(3, 3), 50);
        let first = *output.get_pixel(0, 0);
        assert!(output.pixels().all(|p| *p == first));
        assert_eq!(output.dimensions(), (3, 3));
    }
}
