//! Image preparation ahead of OCR: greyscale conversion and Otsu binarization.

use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use std::io::Cursor;

use crate::error::Result;

/// Decode an uploaded image and return its binarized greyscale version.
pub fn prepare_for_ocr(bytes: &[u8]) -> Result<GrayImage> {
    let decoded = image::load_from_memory(bytes)?;
    let gray = to_grayscale(&decoded);
    let threshold = otsu_threshold(&gray);
    Ok(binarize(&gray, threshold))
}

/// BT.601 luma, the weighting document scanners and OpenCV use. Alpha is dropped.
pub fn to_grayscale(image: &DynamicImage) -> GrayImage {
    let rgb = image.to_rgb8();
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        Luma([bt601_luma(r, g, b)])
    })
}

fn bt601_luma(r: u8, g: u8, b: u8) -> u8 {
    let luma = 0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b);
    luma.round().clamp(0.0, 255.0) as u8
}

/// Global threshold maximising the between-class variance of the intensity histogram.
pub fn otsu_threshold(image: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for pixel in image.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }

    let total = (image.width() as u64 * image.height() as u64) as f64;
    if total == 0.0 {
        return 0;
    }
    let weighted_total: f64 = histogram
        .iter()
        .enumerate()
        .map(|(level, &count)| level as f64 * count as f64)
        .sum();

    let mut threshold = 0u8;
    let mut best_variance = 0.0f64;
    let mut weight_below = 0.0f64;
    let mut weighted_below = 0.0f64;

    for (level, &count) in histogram.iter().enumerate() {
        weight_below += count as f64;
        if weight_below == 0.0 {
            continue;
        }
        let weight_above = total - weight_below;
        if weight_above == 0.0 {
            break;
        }

        weighted_below += level as f64 * count as f64;
        let mean_below = weighted_below / weight_below;
        let mean_above = (weighted_total - weighted_below) / weight_above;
        let variance = weight_below * weight_above * (mean_below - mean_above).powi(2);

        if variance > best_variance {
            best_variance = variance;
            threshold = level as u8;
        }
    }

    threshold
}

/// Pixels strictly above the threshold become white, the rest black.
pub fn binarize(image: &GrayImage, threshold: u8) -> GrayImage {
    let mut output = image.clone();
    for pixel in output.pixels_mut() {
        *pixel = if pixel.0[0] > threshold {
            Luma([255])
        } else {
            Luma([0])
        };
    }
    output
}

pub fn encode_png(image: &GrayImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    image.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn two_tone(width: u32, height: u32, dark: u8, light: u8) -> GrayImage {
        ImageBuffer::from_fn(width, height, |x, _| {
            if x < width / 2 { Luma([dark]) } else { Luma([light]) }
        })
    }

    #[test]
    fn test_otsu_separates_two_tones() {
        let image = two_tone(20, 10, 30, 200);
        let threshold = otsu_threshold(&image);
        assert!((30..200).contains(&threshold));

        let binary = binarize(&image, threshold);
        assert_eq!(binary.get_pixel(0, 0).0[0], 0);
        assert_eq!(binary.get_pixel(19, 9).0[0], 255);
    }

    #[test]
    fn test_grayscale_uses_bt601_weights() {
        let colours: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_fn(4, 1, |x, _| match x {
            0 => Rgb([255, 0, 0]),
            1 => Rgb([0, 255, 0]),
            2 => Rgb([0, 0, 255]),
            _ => Rgb([255, 255, 255]),
        });
        let gray = to_grayscale(&DynamicImage::ImageRgb8(colours));

        let levels: Vec<u8> = gray.pixels().map(|p| p.0[0]).collect();
        assert_eq!(levels, vec![76, 150, 29, 255]);
    }

    #[test]
    fn test_otsu_on_uniform_image() {
        let image: GrayImage = ImageBuffer::from_pixel(8, 8, Luma([120]));
        assert_eq!(otsu_threshold(&image), 0);
        assert!(binarize(&image, 0).pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn test_prepare_for_ocr_decodes_colour_png() {
        let colour: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_fn(16, 4, |x, _| {
            if x < 8 { Rgb([10, 10, 10]) } else { Rgb([250, 240, 230]) }
        });
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(colour)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();

        let prepared = prepare_for_ocr(&bytes).unwrap();
        assert_eq!(prepared.dimensions(), (16, 4));
        assert!(prepared.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
        assert_eq!(prepared.get_pixel(0, 0).0[0], 0);
        assert_eq!(prepared.get_pixel(15, 0).0[0], 255);

        let png = encode_png(&prepared).unwrap();
        assert!(!png.is_empty());
    }

    #[test]
    fn test_prepare_for_ocr_rejects_garbage() {
        assert!(prepare_for_ocr(b"not an image").is_err());
    }
}
