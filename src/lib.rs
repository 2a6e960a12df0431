//! Classify images as real photographs or AI-generated with a sharpness heuristic.
//!
//! Generated images tend to be smoother than camera output. This crate measures
//! that with the variance of the image's Laplacian: the grayscale image is
//! convolved with a 3x3 second-derivative kernel, the population variance of the
//! response is taken, and `log1p(variance) / log1p(2000)` clamped to `[0, 1]`
//! becomes the realness score. Scores at or above 0.5 are labelled `Real`.
//!
//! There is no model and no state; identical bytes always give identical scores.
//!
//! # Quick Start
//!
//! ```no_run
//! use ai_vs_real::{predict, Label};
//!
//! let bytes = std::fs::read("photo.jpg").unwrap();
//! let prediction = predict(&bytes).expect("not a decodable image");
//! if prediction.label == Label::Real {
//!     println!("real ({:.1}% confident)", prediction.confidence * 100.0);
//! }
//! ```
//!
//! # HTTP service
//!
//! With the `server` feature, [`server::router`] exposes `GET /`, `GET /health`,
//! `POST /predict` and `POST /forensics` (multipart field `file`), configured
//! by [`ServerConfig`].
//!
//! # Forensics
//!
//! [`forensics::analyze_bytes`] reports descriptive statistics (EXIF presence,
//! colour histogram, noise estimate, dimensions) that never affect the label.

#![deny(missing_docs)]

pub mod config;
pub mod decode;
pub mod error;
pub mod forensics;
#[cfg(feature = "server")]
pub mod rate;
#[cfg(feature = "server")]
pub mod server;
pub mod sharpness;
mod verdict;

pub use config::ServerConfig;
pub use decode::decode_image;
pub use error::{Error, Result};
pub use forensics::{ColorHistogram, ForensicReport};
pub use sharpness::{realness_score, SharpnessReport};
pub use verdict::{
    is_allowed_filename, is_supported_image, predict, round4, score_directory, score_file,
    FileScore, Label, Prediction, ALLOWED_EXTENSIONS, REAL_THRESHOLD,
};
