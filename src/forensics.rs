//! Per-image forensic features reported alongside the realness score.
//!
//! These are descriptive only and never change the label of a prediction:
//! - **Metadata**: dimensions, sniffed format, encoded size
//! - **EXIF**: number of EXIF fields in the container (camera output usually has some)
//! - **Histogram**: 16-bin normalized histogram per RGB channel
//! - **Noise**: standard deviation of absolute differences between neighbouring luma samples
//! - **Sharpness**: the Laplacian variance behind the realness score

use std::io::Cursor;

use image::{GrayImage, RgbImage};
use serde::Serialize;

use crate::decode::decode_image;
use crate::error::Result;
use crate::sharpness;

/// Number of histogram bins per channel.
pub const HISTOGRAM_BINS: usize = 16;

/// Normalized per-channel histogram; each channel sums to 1 for a non-empty image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorHistogram {
    /// Red channel bins.
    pub r: Vec<f64>,
    /// Green channel bins.
    pub g: Vec<f64>,
    /// Blue channel bins.
    pub b: Vec<f64>,
}

/// Descriptive statistics for one uploaded image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForensicReport {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Container format sniffed from the bytes (`"png"`, `"jpg"`, `"webp"`, ...).
    pub format: Option<String>,
    /// Encoded size in bytes.
    pub size_bytes: usize,
    /// Number of EXIF fields found; 0 when there is no EXIF block.
    pub exif_fields: usize,
    /// Per-channel colour histogram.
    pub histogram: ColorHistogram,
    /// Neighbouring-pixel difference standard deviation.
    pub noise_std: f64,
    /// Population variance of the Laplacian response.
    pub laplacian_variance: f64,
}

impl ForensicReport {
    /// Whether the image carried any EXIF metadata.
    #[must_use]
    pub fn has_exif(&self) -> bool {
        self.exif_fields > 0
    }
}

/// Decode an image and collect its forensic features.
///
/// # Errors
///
/// Returns [`crate::Error::Decode`] for undecodable bytes and
/// [`crate::Error::EmptyImage`] for an image without pixels.
pub fn analyze_bytes(bytes: &[u8]) -> Result<ForensicReport> {
    let img = decode_image(bytes)?;
    let sharpness = sharpness::analyze(&img)?;
    let gray = sharpness::to_luma(&img);

    Ok(ForensicReport {
        width: img.width(),
        height: img.height(),
        format: image::guess_format(bytes)
            .ok()
            .and_then(|f| f.extensions_str().first().map(|ext| (*ext).to_string())),
        size_bytes: bytes.len(),
        exif_fields: count_exif_fields(bytes),
        histogram: color_histogram(&img),
        noise_std: noise_estimate(&gray),
        laplacian_variance: sharpness.laplacian_variance,
    })
}

/// Count EXIF fields in the image container. Missing or malformed EXIF gives 0.
#[must_use]
pub fn count_exif_fields(bytes: &[u8]) -> usize {
    let mut cursor = Cursor::new(bytes);
    match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(exif) => exif.fields().count(),
        Err(e) => {
            tracing::trace!("no EXIF data: {e}");
            0
        }
    }
}

/// Build a normalized [`HISTOGRAM_BINS`]-bin histogram per channel.
///
/// A value `v` falls into bin `v * 16 / 256`.
#[must_use]
pub fn color_histogram(img: &RgbImage) -> ColorHistogram {
    let mut counts = [[0u64; HISTOGRAM_BINS]; 3];
    for px in img.pixels() {
        for (ch, bins) in counts.iter_mut().enumerate() {
            bins[usize::from(px[ch]) * HISTOGRAM_BINS / 256] += 1;
        }
    }

    let total = u64::from(img.width()) * u64::from(img.height());
    #[allow(clippy::cast_precision_loss)]
    let normalize = |bins: &[u64; HISTOGRAM_BINS]| -> Vec<f64> {
        if total == 0 {
            return vec![0.0; HISTOGRAM_BINS];
        }
        bins.iter().map(|&c| c as f64 / total as f64).collect()
    };

    ColorHistogram {
        r: normalize(&counts[0]),
        g: normalize(&counts[1]),
        b: normalize(&counts[2]),
    }
}

/// Standard deviation of `|p[i] - p[i-1]|` over the row-major luma buffer.
///
/// Differences wrap across row ends, treating the image as one long scanline.
/// Fewer than two samples gives 0.
#[must_use]
pub fn noise_estimate(gray: &GrayImage) -> f64 {
    let samples = gray.as_raw();
    if samples.len() < 2 {
        return 0.0;
    }

    let (sum, sum_sq) = samples
        .windows(2)
        .map(|w| f64::from(w[1].abs_diff(w[0])))
        .fold((0.0, 0.0), |(s, sq), d| (s + d, sq + d * d));

    #[allow(clippy::cast_precision_loss)]
    let n = (samples.len() - 1) as f64;
    let mean = sum / n;
    let variance = sum_sq / n - mean * mean;
    variance.max(0.0).sqrt()
}
