use super::TextExtractor;
use image::{DynamicImage, ImageReader};
use ocr_stream_core::{Error, Result};
use std::io::Cursor;

/// Decodes an encoded image, guessing the format from its magic bytes.
///
/// # Errors
///
/// Returns [`Error::Decode`] for empty, truncated or unsupported payloads.
pub fn decode_image(payload: &[u8]) -> Result<DynamicImage> {
    if payload.is_empty() {
        return Err(Error::Decode {
            reason: "empty payload".to_owned(),
        });
    }

    let reader = ImageReader::new(Cursor::new(payload))
        .with_guessed_format()
        .map_err(|e| Error::Decode {
            reason: format!("unreadable payload: {e}"),
        })?;

    if reader.format().is_none() {
        return Err(Error::Decode {
            reason: "unrecognized image format".to_owned(),
        });
    }

    reader.decode().map_err(|e| Error::Decode {
        reason: e.to_string(),
    })
}

/// Decodes images but recognizes no text.
///
/// Every decodable image yields an empty string, and malformed payloads still
/// yield decode errors, so the full streaming pipeline can be exercised
/// without a recognition engine installed.
#[derive(Clone, Copy, Debug, Default)]
pub struct DecodeOnlyExtractor;

impl TextExtractor for DecodeOnlyExtractor {
    type Image = DynamicImage;

    fn decode(&self, payload: &[u8]) -> Result<Self::Image> {
        decode_image(payload)
    }

    fn extract_text(&self, _image: &Self::Image, _language: &str) -> Result<String> {
        Ok(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, ImageFormat, Rgb};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(width, height, Rgb([255, 255, 255]));
        let mut cursor = Cursor::new(Vec::new());
        img.write_to(&mut cursor, ImageFormat::Png).unwrap();
        cursor.into_inner()
    }

    #[test]
    fn decodes_png() {
        let image = decode_image(&png(12, 7)).unwrap();
        assert_eq!(image.width(), 12);
        assert_eq!(image.height(), 7);
    }

    #[test]
    fn empty_payload_is_a_decode_error() {
        assert!(matches!(decode_image(&[]), Err(Error::Decode { .. })));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = decode_image(b"definitely not an image").unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn truncated_png_is_a_decode_error() {
        let mut bytes = png(32, 32);
        bytes.truncate(bytes.len() / 2);
        assert!(matches!(decode_image(&bytes), Err(Error::Decode { .. })));
    }

    #[test]
    fn decode_only_returns_empty_text() {
        let extractor = DecodeOnlyExtractor;
        let image = extractor.decode(&png(4, 4)).unwrap();
        assert_eq!(extractor.extract_text(&image, "eng").unwrap(), "");
    }
}
