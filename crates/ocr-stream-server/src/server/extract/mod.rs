//! Text recognition backends.
//!
//! The streaming core treats recognition as an opaque capability behind the
//! [`TextExtractor`] trait: decode the payload, then extract text from the
//! decoded image. Each call owns the values it creates (the decoded image, the
//! engine instance), so every exit path releases them, including unwinding
//! out of a panicking engine.
//!
//! ## Backends
//!
//! - [`DecodeOnlyExtractor`] - decodes with the `image` crate and returns
//!   empty text. Always available; useful for load testing the pipeline.
//! - `TesseractExtractor` - libtesseract via the `tesseract` crate, compiled
//!   in with the `tesseract` feature.
//!
//! [`DefaultExtractor`] is the backend the server binary runs with.

mod decode;
#[cfg(feature = "tesseract")]
mod tesseract;

pub use decode::{DecodeOnlyExtractor, decode_image};
#[cfg(feature = "tesseract")]
pub use tesseract::TesseractExtractor;

use crate::server::config::ServerConfig;
use ocr_stream_core::Result;

/// Decodes image bytes and extracts text from the decoded image.
///
/// Implementations must be safe to call from many worker threads at once.
/// Engine state must not be shared across calls: each `extract_text` call
/// creates (and drops) its own engine instance.
pub trait TextExtractor: Send + Sync + 'static {
    /// Decoded image handed from [`decode`](Self::decode) to
    /// [`extract_text`](Self::extract_text).
    type Image: Send;

    /// Decodes an encoded image.
    ///
    /// # Errors
    ///
    /// [`Error::Decode`](ocr_stream_core::Error::Decode) when the payload is
    /// malformed or in an unsupported format.
    fn decode(&self, payload: &[u8]) -> Result<Self::Image>;

    /// Runs text recognition on a decoded image.
    ///
    /// # Errors
    ///
    /// [`Error::ExtractorInit`](ocr_stream_core::Error::ExtractorInit) when the
    /// engine cannot start for `language`, and
    /// [`Error::Extraction`](ocr_stream_core::Error::Extraction) when it runs
    /// but produces nothing.
    fn extract_text(&self, image: &Self::Image, language: &str) -> Result<String>;
}

#[cfg(feature = "tesseract")]
pub type DefaultExtractor = TesseractExtractor;

#[cfg(not(feature = "tesseract"))]
pub type DefaultExtractor = DecodeOnlyExtractor;

/// Builds the backend selected at compile time.
#[cfg(feature = "tesseract")]
pub fn default_extractor(config: &ServerConfig) -> DefaultExtractor {
    TesseractExtractor::new(config.tessdata_path.clone())
}

/// Builds the backend selected at compile time.
#[cfg(not(feature = "tesseract"))]
pub fn default_extractor(_config: &ServerConfig) -> DefaultExtractor {
    tracing::warn!("Built without the `tesseract` feature: images are decoded but no text is recognized");
    DecodeOnlyExtractor
}
