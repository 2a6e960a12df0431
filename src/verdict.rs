//! Turn a realness score into a labelled prediction, for uploads and files.

use std::path::{Path, PathBuf};

use serde::{Serialize, Serializer};

use crate::decode::decode_image;
use crate::error::Result;
use crate::sharpness;

/// Scores at or above this are labelled [`Label::Real`].
pub const REAL_THRESHOLD: f64 = 0.5;

/// File extensions accepted for scoring (compared case-insensitively).
pub const ALLOWED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

/// Classification label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Label {
    /// Judged to be a genuine photograph.
    Real,
    /// Judged to be synthetic.
    #[serde(rename = "AI-Generated")]
    AiGenerated,
}

impl Label {
    /// Label for a realness score.
    #[must_use]
    pub fn for_score(score: f64) -> Self {
        if score >= REAL_THRESHOLD {
            Label::Real
        } else {
            Label::AiGenerated
        }
    }

    /// Display name, as used in JSON responses.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Label::Real => "Real",
            Label::AiGenerated => "AI-Generated",
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A labelled prediction.
///
/// Serializes as `{"result", "confidence", "raw_score"}` with both numbers
/// rounded to four decimals. The in-memory values are unrounded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    /// Predicted label.
    #[serde(rename = "result")]
    pub label: Label,
    /// Confidence in the label: the score for `Real`, `1 - score` otherwise.
    #[serde(serialize_with = "serialize_rounded")]
    pub confidence: f64,
    /// Realness score in `[0, 1]`.
    #[serde(serialize_with = "serialize_rounded")]
    pub raw_score: f64,
}

impl Prediction {
    /// Derive label and confidence from a realness score.
    #[must_use]
    pub fn from_score(raw_score: f64) -> Self {
        let label = Label::for_score(raw_score);
        let confidence = match label {
            Label::Real => raw_score,
            Label::AiGenerated => 1.0 - raw_score,
        };
        Self {
            label,
            confidence,
            raw_score,
        }
    }
}

/// Round to four decimal places.
///
/// Halves round away from zero (`f64::round`), so a value lying exactly on a
/// half step can differ by `1e-4` from a round-half-to-even implementation.
#[must_use]
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[allow(clippy::trivially_copy_pass_by_ref)] // signature required by serde
fn serialize_rounded<S: Serializer>(
    value: &f64,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(round4(*value))
}

/// Decode and score an uploaded image.
///
/// # Errors
///
/// Returns [`crate::Error::Decode`] for bytes that are not a supported image
/// and [`crate::Error::EmptyImage`] for an image without pixels.
pub fn predict(bytes: &[u8]) -> Result<Prediction> {
    let img = decode_image(bytes)?;
    let score = sharpness::realness_score(&img)?;
    Ok(Prediction::from_score(score))
}

/// Check if a filename has an allowed extension.
///
/// The extension is the text after the last `.`, so `".png"` is accepted and
/// `"png"` is not.
#[must_use]
pub fn is_allowed_filename(filename: &str) -> bool {
    filename.rsplit_once('.').is_some_and(|(_, ext)| {
        ALLOWED_EXTENSIONS
            .iter()
            .any(|allowed| ext.eq_ignore_ascii_case(allowed))
    })
}

/// Check if a path names a file with an allowed extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(is_allowed_filename)
}

/// Result of scoring a single image file.
#[derive(Debug)]
pub struct FileScore {
    /// Path of the scored file.
    pub path: PathBuf,
    /// The prediction, if the file could be read, decoded and scored.
    pub prediction: Option<Prediction>,
    /// Human-readable failure message, empty on success.
    pub message: String,
}

impl FileScore {
    /// Whether scoring succeeded.
    #[must_use]
    pub fn success(&self) -> bool {
        self.prediction.is_some()
    }
}

/// Read and score a single image file.
///
/// Returns a [`FileScore`] describing the prediction or the failure.
#[must_use]
pub fn score_file(path: &Path) -> FileScore {
    let outcome = std::fs::read(path)
        .map_err(crate::Error::from)
        .and_then(|bytes| predict(&bytes));

    match outcome {
        Ok(prediction) => FileScore {
            path: path.to_path_buf(),
            prediction: Some(prediction),
            message: String::new(),
        },
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to score file");
            FileScore {
                path: path.to_path_buf(),
                prediction: None,
                message: e.to_string(),
            }
        }
    }
}

/// Score all supported images in a directory, sorted by path.
///
/// Uses parallel iteration when the `cli` feature is enabled (via rayon).
/// Subdirectories are not descended into.
///
/// # Errors
///
/// Returns [`crate::Error::Io`] if the directory cannot be read.
pub fn score_directory(dir: &Path) -> Result<Vec<FileScore>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_ok_and(|ft| ft.is_file()))
        .map(|e| e.path())
        .filter(|p| is_supported_image(p))
        .collect();
    paths.sort();

    tracing::debug!(dir = %dir.display(), files = paths.len(), "scoring directory");

    #[cfg(feature = "cli")]
    {
        use rayon::prelude::*;
        Ok(paths.par_iter().map(|p| score_file(p)).collect())
    }

    #[cfg(not(feature = "cli"))]
    {
        Ok(paths.iter().map(|p| score_file(p)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_threshold_is_inclusive() {
        assert_eq!(Label::for_score(0.5), Label::Real);
        assert_eq!(Label::for_score(0.4999), Label::AiGenerated);
        assert_eq!(Label::for_score(1.0), Label::Real);
        assert_eq!(Label::for_score(0.0), Label::AiGenerated);
    }

    #[test]
    fn confidence_follows_label_branch() {
        let real = Prediction::from_score(0.8);
        assert_eq!(real.label, Label::Real);
        assert!((real.confidence - 0.8).abs() < 1e-12);

        let fake = Prediction::from_score(0.3);
        assert_eq!(fake.label, Label::AiGenerated);
        assert!((fake.confidence - 0.7).abs() < 1e-12);
        assert!((fake.raw_score - 0.3).abs() < 1e-12);
    }

    #[test]
    fn zero_score_is_fully_confident_ai_generated() {
        let p = Prediction::from_score(0.0);
        assert_eq!(p.label, Label::AiGenerated);
        assert!((p.confidence - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn prediction_serializes_with_rounded_numbers() {
        let json = serde_json::to_value(Prediction::from_score(0.123_456_7)).unwrap();
        assert_eq!(json["result"], "AI-Generated");
        assert_eq!(json["raw_score"], 0.1235);
        assert_eq!(json["confidence"], 0.8765);

        let json = serde_json::to_value(Prediction::from_score(1.0)).unwrap();
        assert_eq!(json["result"], "Real");
        assert_eq!(json["confidence"], 1.0);
    }

    #[test]
    fn round4_keeps_four_decimals() {
        assert!((round4(0.987_66) - 0.9877).abs() < 1e-12);
        assert!((round4(0.123_44) - 0.1234).abs() < 1e-12);
        assert!((round4(0.000_04) - 0.0).abs() < f64::EPSILON);
        assert!((round4(1.0) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn round4_is_symmetric_about_zero() {
        for v in [0.987_66, 0.123_44, 0.000_06, 0.5] {
            assert!((round4(-v) + round4(v)).abs() < f64::EPSILON, "{v}");
        }
    }

    #[test]
    fn allowed_filename_accepts_image_extensions() {
        assert!(is_allowed_filename("photo.jpg"));
        assert!(is_allowed_filename("photo.JPEG"));
        assert!(is_allowed_filename("photo.png"));
        assert!(is_allowed_filename("photo.WebP"));
        assert!(is_allowed_filename("archive.tar.png"));
        assert!(is_allowed_filename(".png"));
    }

    #[test]
    fn allowed_filename_rejects_other_names() {
        assert!(!is_allowed_filename("photo.txt"));
        assert!(!is_allowed_filename("photo.gif"));
        assert!(!is_allowed_filename("photo.png.exe"));
        assert!(!is_allowed_filename("png"));
        assert!(!is_allowed_filename("photo."));
        assert!(!is_allowed_filename(""));
    }

    #[test]
    fn supported_image_uses_file_name() {
        assert!(is_supported_image(Path::new("/tmp/dir.d/photo.jpg")));
        assert!(!is_supported_image(Path::new("/tmp/dir.png/photo")));
    }

    #[test]
    fn predict_rejects_non_image_bytes() {
        assert!(matches!(
            predict(b"plain text"),
            Err(crate::Error::Decode(_))
        ));
    }

    #[test]
    fn score_file_reports_missing_file() {
        let result = score_file(Path::new("/definitely/not/here.png"));
        assert!(!result.success());
        assert!(result.message.contains("I/O error"));
    }
}
