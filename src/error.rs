//! Error types for the ai-vs-real crate.

/// Errors that can occur while decoding, scoring or configuring the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The uploaded bytes are not a valid or supported raster image.
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    /// The image has no pixels, so the Laplacian variance is undefined.
    #[error("cannot score empty image ({width}x{height})")]
    EmptyImage {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
    },

    /// An I/O error occurred while reading image files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration value could not be parsed.
    #[error("invalid value for {key}: {value:?}")]
    InvalidConfig {
        /// Name of the environment variable or option.
        key: &'static str,
        /// The raw value that was rejected.
        value: String,
    },
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let io_err = Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(io_err.to_string().contains("gone"));

        let empty = Error::EmptyImage {
            width: 0,
            height: 12,
        };
        assert!(empty.to_string().contains("0x12"));

        let bad_port = Error::InvalidConfig {
            key: "PORT",
            value: "eighty".to_string(),
        };
        let msg = bad_port.to_string();
        assert!(msg.contains("PORT"));
        assert!(msg.contains("\"eighty\""));
    }

    #[test]
    fn decode_error_keeps_source() {
        use std::error::Error as _;

        let err = crate::decode::decode_image(b"not an image").unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
        assert!(err.source().is_some());
    }
}
