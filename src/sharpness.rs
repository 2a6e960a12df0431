//! Laplacian-variance sharpness heuristic.
//!
//! The realness score is computed in four steps:
//! 1. **Luma**: RGB to 8-bit grayscale with fixed-point BT.601 weights
//! 2. **Laplacian**: 3x3 kernel `[[0,1,0],[1,-4,1],[0,1,0]]` with reflect-101 borders
//! 3. **Variance**: population variance of every Laplacian response
//! 4. **Mapping**: `log1p(v) / log1p(2000)`, clamped to `[0, 1]`
//!
//! The weights, kernel, border policy and reference variance are fixed. Changing
//! any of them shifts every score away from the calibration of the reference
//! constant.

use image::{GrayImage, Luma, RgbImage};

use crate::error::{Error, Result};

/// Fixed-point precision of the luma weights.
const LUMA_SHIFT: u32 = 14;
/// Red weight, `0.299 * 2^14`.
const LUMA_R: u32 = 4899;
/// Green weight, `0.587 * 2^14`.
const LUMA_G: u32 = 9617;
/// Blue weight, `0.114 * 2^14`.
const LUMA_B: u32 = 1868;

/// Laplacian variance that maps to a score of exactly 1.0.
pub const REFERENCE_VARIANCE: f64 = 2000.0;

/// Per-image statistics behind a realness score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SharpnessReport {
    /// Population variance of the Laplacian response.
    pub laplacian_variance: f64,
    /// Realness score in `[0, 1]`.
    pub score: f64,
}

/// Convert an RGB image to 8-bit luma.
///
/// Uses `Y = (4899*R + 9617*G + 1868*B + 2^13) >> 14`, the rounded fixed-point
/// form of `0.299*R + 0.587*G + 0.114*B`.
#[must_use]
pub fn to_luma(img: &RgbImage) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let px = img.get_pixel(x, y);
        let sum = LUMA_R * u32::from(px[0])
            + LUMA_G * u32::from(px[1])
            + LUMA_B * u32::from(px[2])
            + (1 << (LUMA_SHIFT - 1));
        // Weights sum to 2^14, so the shifted value never exceeds 255.
        #[allow(clippy::cast_possible_truncation)]
        let luma = (sum >> LUMA_SHIFT) as u8;
        Luma([luma])
    })
}

/// Reflect-101 border index: `-1 -> 1`, `len -> len - 2`.
///
/// Only called with `i` in `-1..=len`. A length-1 axis reflects onto itself.
#[allow(clippy::cast_sign_loss, clippy::cast_possible_wrap)]
fn reflect_101(i: i64, len: u32) -> u32 {
    let len = i64::from(len);
    if len == 1 {
        return 0;
    }
    let j = if i < 0 {
        -i
    } else if i >= len {
        2 * len - i - 2
    } else {
        i
    };
    j as u32
}

/// Apply the 4-neighbour Laplacian kernel to a grayscale image.
///
/// Returns a row-major response grid with the same dimensions as `gray`.
/// Out-of-range neighbours are resolved with reflect-101.
#[must_use]
pub fn laplacian(gray: &GrayImage) -> Vec<f64> {
    let (width, height) = gray.dimensions();
    let at = |x: i64, y: i64| -> f64 {
        f64::from(gray.get_pixel(reflect_101(x, width), reflect_101(y, height))[0])
    };

    let mut response = Vec::with_capacity(width as usize * height as usize);
    for y in 0..i64::from(height) {
        for x in 0..i64::from(width) {
            let lap = at(x, y - 1) + at(x - 1, y) + at(x + 1, y) + at(x, y + 1) - 4.0 * at(x, y);
            response.push(lap);
        }
    }
    response
}

/// Population variance (mean of squared deviations). `None` for an empty slice.
#[must_use]
pub fn population_variance(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some(variance)
}

/// Map a Laplacian variance onto the realness scale.
///
/// `log1p(variance) / log1p(2000)`, clamped to `[0, 1]`. NaN maps to 0.
#[must_use]
pub fn realness_from_variance(variance: f64) -> f64 {
    let scaled = variance.ln_1p() / REFERENCE_VARIANCE.ln_1p();
    if scaled.is_nan() {
        return 0.0;
    }
    scaled.clamp(0.0, 1.0)
}

/// Compute the sharpness statistics and realness score of an RGB image.
///
/// # Errors
///
/// Returns [`Error::EmptyImage`] if the image has zero pixels.
pub fn analyze(img: &RgbImage) -> Result<SharpnessReport> {
    let (width, height) = img.dimensions();
    let response = laplacian(&to_luma(img));
    let laplacian_variance =
        population_variance(&response).ok_or(Error::EmptyImage { width, height })?;
    let score = realness_from_variance(laplacian_variance);

    tracing::debug!(width, height, laplacian_variance, score, "scored image");

    Ok(SharpnessReport {
        laplacian_variance,
        score,
    })
}

/// Compute the realness score of an RGB image, in `[0, 1]`.
///
/// # Errors
///
/// Returns [`Error::EmptyImage`] if the image has zero pixels.
pub fn realness_score(img: &RgbImage) -> Result<f64> {
    analyze(img).map(|report| report.score)
}
