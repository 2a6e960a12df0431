//! Turn uploaded bytes into an RGB pixel grid.

use image::RgbImage;

use crate::error::{Error, Result};

/// Decode an encoded raster image (PNG, JPEG, WebP, ...) into 8-bit RGB.
///
/// The format is sniffed from the bytes, never from a filename. Alpha and
/// 16-bit channels are dropped to match a plain RGB conversion; nothing is
/// composited against a background.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the bytes are empty, truncated, corrupt or in
/// a format the decoder does not support.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage> {
    let img = image::load_from_memory(bytes).map_err(Error::Decode)?;
    tracing::debug!(
        width = img.width(),
        height = img.height(),
        color = ?img.color(),
        "decoded upload"
    );
    Ok(img.to_rgb8())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{DynamicImage, ImageFormat, Rgb, Rgba, RgbaImage};

    use super::*;

    fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    #[test]
    fn decodes_png_with_original_dimensions() {
        let mut src = RgbImage::new(7, 5);
        src.put_pixel(3, 2, Rgb([10, 20, 30]));
        let bytes = encode(DynamicImage::ImageRgb8(src), ImageFormat::Png);

        let img = decode_image(&bytes).unwrap();
        assert_eq!(img.dimensions(), (7, 5));
        assert_eq!(img.get_pixel(3, 2), &Rgb([10, 20, 30]));
    }

    #[test]
    fn drops_alpha_channel() {
        let mut src = RgbaImage::new(2, 2);
        src.put_pixel(0, 0, Rgba([200, 100, 50, 0]));
        let bytes = encode(DynamicImage::ImageRgba8(src), ImageFormat::Png);

        let img = decode_image(&bytes).unwrap();
        assert_eq!(img.get_pixel(0, 0), &Rgb([200, 100, 50]));
    }

    #[test]
    fn rejects_text_bytes() {
        let err = decode_image(b"hello, this is not a picture").unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn rejects_empty_buffer() {
        assert!(matches!(decode_image(&[]), Err(Error::Decode(_))));
    }

    #[test]
    fn rejects_truncated_png() {
        let bytes = encode(
            DynamicImage::ImageRgb8(RgbImage::new(64, 64)),
            ImageFormat::Png,
        );
        let truncated = &bytes[..bytes.len() / 2];
        assert!(matches!(decode_image(truncated), Err(Error::Decode(_))));
    }
}
