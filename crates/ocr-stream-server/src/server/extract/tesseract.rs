use super::{TextExtractor, decode_image};
use image::DynamicImage;
use ocr_stream_core::{Error, Result};
use std::path::PathBuf;
use tesseract::Tesseract;

/// Text recognition through libtesseract.
///
/// A fresh engine is created for every image and dropped when the call
/// returns, so concurrent calls from different workers never share engine
/// state. Images are converted to 8-bit grayscale before recognition.
#[derive(Clone, Debug, Default)]
pub struct TesseractExtractor {
    tessdata_path: Option<String>,
}

impl TesseractExtractor {
    pub fn new(tessdata_path: Option<PathBuf>) -> Self {
        Self {
            tessdata_path: tessdata_path.map(|p| p.to_string_lossy().into_owned()),
        }
    }
}

impl TextExtractor for TesseractExtractor {
    type Image = DynamicImage;

    fn decode(&self, payload: &[u8]) -> Result<Self::Image> {
        decode_image(payload)
    }

    fn extract_text(&self, image: &Self::Image, language: &str) -> Result<String> {
        let gray = image.to_luma8();
        let (width, height) = gray.dimensions();
        let width = i32::try_from(width).map_err(|_| Error::Extraction {
            reason: format!("image width {width} out of range"),
        })?;
        let height = i32::try_from(height).map_err(|_| Error::Extraction {
            reason: format!("image height {height} out of range"),
        })?;

        let engine = Tesseract::new(self.tessdata_path.as_deref(), Some(language)).map_err(|e| {
            Error::ExtractorInit {
                reason: e.to_string(),
            }
        })?;

        let mut engine = engine
            .set_frame(gray.as_raw(), width, height, 1, width)
            .map_err(|e| Error::Extraction {
                reason: e.to_string(),
            })?;

        engine.get_text().map_err(|e| Error::Extraction {
            reason: e.to_string(),
        })
    }
}
