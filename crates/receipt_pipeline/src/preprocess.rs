//! Image preprocessing module
//!
//! Classical computer vision operations that clean a receipt photo before it
//! is handed to a text recognition engine:
//! - Median and bilateral denoising
//! - Global (Otsu) thresholding
//! - Adaptive mean / Gaussian thresholding
//! - Perspective correction of the receipt outline (see [`crate::document`])
//! - Resolution normalisation for OCR

use crate::config::PreprocessConfig;
use crate::document;
use crate::error::{PipelineError, Result};
use crate::types::PreprocessMethod;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, GrayImage, Luma};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use imageproc::filter::{gaussian_blur_f32, median_filter};
use imageproc::integral_image::{integral_image, sum_image_pixels};
use tracing::debug;

/// Block size used by both adaptive thresholds
pub const ADAPTIVE_BLOCK_SIZE: u32 = 11;
/// Constant subtracted from the local mean by the adaptive thresholds
pub const ADAPTIVE_C: i32 = 2;
/// Sigma OpenCV derives for an 11 pixel Gaussian kernel
const ADAPTIVE_GAUSS_SIGMA: f32 = 2.0;

const BILATERAL_DIAMETER: u32 = 9;
const BILATERAL_SIGMA_COLOR: f32 = 10.0;
const BILATERAL_SIGMA_SPACE: f32 = 200.0;

/// Preprocess a receipt image with the default configuration
pub fn preprocess_image(input: &DynamicImage, method: PreprocessMethod) -> Result<GrayImage> {
    preprocess_image_with(input, method, &PreprocessConfig::default())
}

/// Preprocess a receipt image for OCR
pub fn preprocess_image_with(
    input: &DynamicImage,
    method: PreprocessMethod,
    config: &PreprocessConfig,
) -> Result<GrayImage> {
    ensure_not_empty(input)?;
    debug!(%method, width = input.width(), height = input.height(), "preprocessing");

    let output = match method {
        PreprocessMethod::EdgeDetection => {
            let flattened = document::flatten_document(input, config.detection_height)?;
            mean_threshold(&flattened, ADAPTIVE_BLOCK_SIZE, ADAPTIVE_C)
        }
        PreprocessMethod::MedianBlur => median_filter(&input.to_luma8(), 1, 1),
        PreprocessMethod::BilateralFilter => bilateral_filter(
            &input.to_luma8(),
            BILATERAL_DIAMETER,
            BILATERAL_SIGMA_COLOR,
            BILATERAL_SIGMA_SPACE,
        ),
        PreprocessMethod::Threshold => otsu_threshold(&input.to_luma8()),
        PreprocessMethod::MeanThreshold => {
            mean_threshold(&input.to_luma8(), ADAPTIVE_BLOCK_SIZE, ADAPTIVE_C)
        }
        PreprocessMethod::GaussThreshold => {
            gaussian_threshold(&input.to_luma8(), ADAPTIVE_GAUSS_SIGMA, ADAPTIVE_C)
        }
    };

    Ok(output)
}

/// Preprocess with `method` (or only convert to grayscale for `None`), then
/// bring the width down to `config.max_width`
pub fn prepare_for_ocr(
    input: &DynamicImage,
    method: Option<PreprocessMethod>,
    config: &PreprocessConfig,
) -> Result<GrayImage> {
    ensure_not_empty(input)?;
    let preprocessed = match method {
        Some(method) => preprocess_image_with(input, method, config)?,
        None => input.to_luma8(),
    };
    Ok(normalize_resolution(&DynamicImage::ImageLuma8(preprocessed), config.max_width).to_luma8())
}

/// Downscale so the width is at most `max_width`, keeping the aspect ratio
///
/// Images already narrow enough are returned unchanged; this never upscales.
pub fn normalize_resolution(input: &DynamicImage, max_width: u32) -> DynamicImage {
    let (width, height) = input.dimensions();
    if width == 0 || width <= max_width {
        return input.clone();
    }

    let factor = max_width as f64 / width as f64;
    let new_width = ((width as f64 * factor) as u32).max(1);
    let new_height = ((height as f64 * factor) as u32).max(1);
    debug!(width, height, new_width, new_height, "normalizing resolution");

    input.resize_exact(new_width, new_height, FilterType::Lanczos3)
}

/// Binary threshold at Otsu's level
///
/// A flat image has no foreground and comes out all white.
pub fn otsu_threshold(gray: &GrayImage) -> GrayImage {
    let mut values = gray.pixels().map(|p| p[0]);
    if let Some(first) = values.next() {
        if values.all(|v| v == first) {
            return GrayImage::from_pixel(gray.width(), gray.height(), Luma([255u8]));
        }
    }
    threshold(gray, otsu_level(gray), ThresholdType::Binary)
}

/// Adaptive threshold against the mean of a `block_size` square window
///
/// A pixel is white when it is brighter than `mean - c`. Pixels outside the
/// image repeat the nearest edge pixel, so every window is full size.
pub fn mean_threshold(gray: &GrayImage, block_size: u32, c: i32) -> GrayImage {
    let (width, height) = gray.dimensions();
    let half = block_size / 2;
    let side = 2 * half + 1;
    let count = (side * side) as u64;

    let padded = GrayImage::from_fn(width + 2 * half, height + 2 * half, |x, y| {
        let sx = x.saturating_sub(half).min(width - 1);
        let sy = y.saturating_sub(half).min(height - 1);
        *gray.get_pixel(sx, sy)
    });
    let integral = integral_image::<_, u64>(&padded);

    binarize(gray, |x, y| {
        let sum = sum_image_pixels(&integral, x, y, x + side - 1, y + side - 1)[0];
        ((sum + count / 2) / count) as i32 - c
    })
}

/// Adaptive threshold against a Gaussian-weighted local mean
pub fn gaussian_threshold(gray: &GrayImage, sigma: f32, c: i32) -> GrayImage {
    let local_mean = gaussian_blur_f32(gray, sigma);
    binarize(gray, |x, y| local_mean.get_pixel(x, y)[0] as i32 - c)
}

/// Local threshold with a Gaussian window sized from `block_size`
///
/// Used on flattened receipts, where lighting varies across the paper.
pub fn threshold_local(gray: &GrayImage, block_size: u32, offset: i32) -> Result<GrayImage> {
    if block_size < 3 {
        return Err(PipelineError::Config(format!(
            "local threshold block size must be at least 3, got {}",
            block_size
        )));
    }
    let sigma = (block_size - 1) as f32 / 6.0;
    Ok(gaussian_threshold(gray, sigma, offset))
}

/// Edge-preserving smoothing
///
/// Weights combine spatial distance inside a circular window of the given
/// diameter with intensity difference from the centre pixel.
pub fn bilateral_filter(
    gray: &GrayImage,
    diameter: u32,
    sigma_color: f32,
    sigma_space: f32,
) -> GrayImage {
    let (width, height) = gray.dimensions();
    let radius = (diameter / 2) as i64;

    let mut offsets = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let dist2 = (dx * dx + dy * dy) as f32;
            if dist2 <= (radius * radius) as f32 {
                let weight = (-dist2 / (2.0 * sigma_space * sigma_space)).exp();
                offsets.push((dx, dy, weight));
            }
        }
    }
    let color_weights: Vec<f32> = (0..256)
        .map(|d| {
            let d = d as f32;
            (-(d * d) / (2.0 * sigma_color * sigma_color)).exp()
        })
        .collect();

    GrayImage::from_fn(width, height, |x, y| {
        let center = gray.get_pixel(x, y)[0] as i32;
        let mut acc = 0.0f32;
        let mut norm = 0.0f32;
        for &(dx, dy, spatial) in &offsets {
            let sx = (x as i64 + dx).clamp(0, width as i64 - 1) as u32;
            let sy = (y as i64 + dy).clamp(0, height as i64 - 1) as u32;
            let value = gray.get_pixel(sx, sy)[0] as i32;
            let weight = spatial * color_weights[(value - center).unsigned_abs() as usize];
            acc += weight * value as f32;
            norm += weight;
        }
        Luma([(acc / norm).round().clamp(0.0, 255.0) as u8])
    })
}

pub(crate) fn ensure_not_empty(input: &DynamicImage) -> Result<()> {
    let (width, height) = input.dimensions();
    if width == 0 || height == 0 {
        return Err(PipelineError::InvalidImage(format!(
            "image has no pixels ({}x{})",
            width, height
        )));
    }
    Ok(())
}

fn binarize<F>(gray: &GrayImage, threshold_at: F) -> GrayImage
where
    F: Fn(u32, u32) -> i32,
{
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let value = gray.get_pixel(x, y)[0] as i32;
        if value > threshold_at(x, y) {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    fn is_binary(image: &GrayImage) -> bool {
        image.pixels().all(|p| p[0] == 0 || p[0] == 255)
    }

    /// Light paper with a dark "ink" bar across the middle
    fn receipt_like(width: u32, height: u32) -> GrayImage {
        let mut img = GrayImage::from_pixel(width, height, Luma([210u8]));
        draw_filled_rect_mut(
            &mut img,
            Rect::at(4, (height / 2) as i32 - 2).of_size(width - 8, 4),
            Luma([30u8]),
        );
        img
    }

    #[test]
    fn test_preprocess_keeps_dimensions() {
        let img = ImageBuffer::from_pixel(64, 48, Rgb([200u8, 190u8, 180u8]));
        let dynamic = DynamicImage::ImageRgb8(img);

        for method in PreprocessMethod::ALL {
            if method == PreprocessMethod::EdgeDetection {
                continue;
            }
            let result = preprocess_image(&dynamic, method).unwrap();
            assert_eq!(result.dimensions(), (64, 48), "{}", method);
        }
    }

    #[test]
    fn test_threshold_methods_are_binary() {
        let dynamic = DynamicImage::ImageLuma8(receipt_like(60, 40));
        for method in [
            PreprocessMethod::Threshold,
            PreprocessMethod::MeanThreshold,
            PreprocessMethod::GaussThreshold,
        ] {
            let result = preprocess_image(&dynamic, method).unwrap();
            assert!(is_binary(&result), "{} produced grey levels", method);
        }
    }

    #[test]
    fn test_otsu_separates_ink_from_paper() {
        let img = receipt_like(60, 40);
        let result = otsu_threshold(&img);
        assert_eq!(result.get_pixel(30, 20)[0], 0);
        assert_eq!(result.get_pixel(30, 5)[0], 255);
    }

    #[test]
    fn test_uniform_image_thresholds_to_white() {
        let img = GrayImage::from_pixel(30, 30, Luma([128u8]));
        let mean = mean_threshold(&img, ADAPTIVE_BLOCK_SIZE, ADAPTIVE_C);
        assert!(mean.pixels().all(|p| p[0] == 255));

        let gauss = gaussian_threshold(&img, ADAPTIVE_GAUSS_SIGMA, ADAPTIVE_C);
        assert!(gauss.pixels().all(|p| p[0] == 255));

        let otsu = otsu_threshold(&img);
        assert!(otsu.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn test_mean_threshold_marks_ink() {
        let img = receipt_like(60, 40);
        let result = mean_threshold(&img, ADAPTIVE_BLOCK_SIZE, ADAPTIVE_C);
        assert_eq!(result.get_pixel(30, 20)[0], 0);
        assert_eq!(result.get_pixel(30, 3)[0], 255);
    }

    #[test]
    fn test_mean_threshold_repeats_border_pixels() {
        let ramp = GrayImage::from_fn(30, 30, |x, _| Luma([(x * 8) as u8]));
        let result = mean_threshold(&ramp, ADAPTIVE_BLOCK_SIZE, ADAPTIVE_C);
        // x = 4: window mean rounds to 33, and 32 > 33 - 2
        assert_eq!(result.get_pixel(4, 15)[0], 255);
        assert_eq!(result.get_pixel(0, 15)[0], 0);
    }

    #[test]
    fn test_threshold_local_rejects_tiny_blocks() {
        let img = receipt_like(20, 20);
        assert!(matches!(
            threshold_local(&img, 1, 10),
            Err(PipelineError::Config(_))
        ));
        assert!(is_binary(&threshold_local(&img, 11, 10).unwrap()));
    }

    #[test]
    fn test_median_blur_removes_salt_noise() {
        let mut img = GrayImage::from_pixel(9, 9, Luma([100u8]));
        img.put_pixel(4, 4, Luma([255u8]));
        let result = preprocess_image(&DynamicImage::ImageLuma8(img), PreprocessMethod::MedianBlur)
            .unwrap();
        assert_eq!(result.get_pixel(4, 4)[0], 100);
    }

    #[test]
    fn test_bilateral_filter_preserves_edges() {
        let img = GrayImage::from_fn(20, 10, |x, _| if x < 10 { Luma([20u8]) } else { Luma([230u8]) });
        let result = bilateral_filter(&img, 9, 10.0, 200.0);
        // Intensity gap far beyond sigma_color, so the sides do not bleed
        assert!(result.get_pixel(9, 5)[0] < 30);
        assert!(result.get_pixel(10, 5)[0] > 220);
    }

    #[test]
    fn test_normalize_resolution_downscales_wide_images() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(2048, 1000));
        let resized = normalize_resolution(&img, 1024);
        assert_eq!(resized.dimensions(), (1024, 500));
    }

    #[test]
    fn test_normalize_resolution_never_upscales() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(640, 480));
        let resized = normalize_resolution(&img, 1024);
        assert_eq!(resized.dimensions(), (640, 480));
    }

    #[test]
    fn test_prepare_for_ocr_thresholds_then_downscales() {
        let dynamic = DynamicImage::ImageLuma8(receipt_like(2048, 64));
        let config = PreprocessConfig::default();

        let prepared = prepare_for_ocr(&dynamic, Some(PreprocessMethod::Threshold), &config).unwrap();
        assert_eq!(prepared.dimensions(), (1024, 32));

        let raw = prepare_for_ocr(&dynamic, None, &config).unwrap();
        assert_eq!(raw.dimensions(), (1024, 32));
        assert!(!is_binary(&raw));
    }

    #[test]
    fn test_empty_image_rejected() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(0, 0));
        let err = preprocess_image(&img, PreprocessMethod::Threshold).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidImage(_)));
    }

    #[test]
    fn test_edge_detection_without_outline_fails() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(200, 300, Luma([180u8])));
        let err = preprocess_image(&img, PreprocessMethod::EdgeDetection).unwrap_err();
        assert!(matches!(err, PipelineError::NoDocumentContour));
    }
}
