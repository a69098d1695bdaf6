//! # Request and Outcome Types
//!
//! Domain view of the messages exchanged over `OcrService::SendImage`.
//!
//! - [`ImageChunk`] - one inbound image, moved by value into its worker task.
//! - [`OcrOutcome`] - one outbound result, carrying either recognized text or
//!   an error marker.
//! - [`OutcomeStatus`] - machine-readable outcome kind.
//!
//! ## Error Markers
//!
//! The wire protocol historically reported failures through the `text` field
//! only. The marker constants below keep that contract byte-for-byte, so a
//! client that predates the `status` field still sees the same strings. New
//! clients should branch on [`OutcomeStatus`] instead of parsing text.

use crate::{Error, proto};
use bytes::Bytes;

/// Default recognition language.
pub const DEFAULT_LANGUAGE: &str = "eng";

/// Text sent when an image is empty, malformed or in an unsupported format.
pub const DECODE_ERROR_MARKER: &str = "[ERROR] Invalid or corrupted image.";

/// Text sent when the recognition engine could not be initialized.
pub const EXTRACTOR_INIT_ERROR_MARKER: &str = "[ERROR] Failed to initialize Tesseract.";

/// Text sent when the recognition engine ran but produced nothing.
pub const EXTRACTION_ERROR_MARKER: &str = "[ERROR] Tesseract OCR failed.";

/// Prefix of the text sent when the recognition engine panicked with a
/// message.
pub const FATAL_ERROR_PREFIX: &str = "[FATAL ERROR] Exception: ";

/// Text sent when the recognition engine panicked without a readable message.
pub const FATAL_UNKNOWN_MARKER: &str = "[FATAL ERROR] Unknown exception.";

/// A single image received from the client.
///
/// Immutable once received. The payload is reference-counted, so moving a
/// chunk into a worker task never copies the image bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageChunk {
    /// Client-assigned grouping, opaque to the server.
    pub batch_id: String,
    /// Correlation key echoed back in the outcome. Uniqueness is not enforced.
    pub image_id: String,
    /// Encoded image bytes.
    pub payload: Bytes,
}

impl From<proto::ImageRequest> for ImageChunk {
    fn from(req: proto::ImageRequest) -> Self {
        Self {
            batch_id: req.batch_id,
            image_id: req.image_id,
            payload: req.data,
        }
    }
}

/// Machine-readable kind of an [`OcrOutcome`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutcomeStatus {
    Ok,
    DecodeError,
    ExtractorInitError,
    ExtractionError,
    InternalError,
}

impl OutcomeStatus {
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Short, stable label used for logs and metric attributes.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::DecodeError => "decode_error",
            Self::ExtractorInitError => "extractor_init_error",
            Self::ExtractionError => "extraction_error",
            Self::InternalError => "internal_error",
        }
    }
}

impl From<OutcomeStatus> for proto::OutcomeStatus {
    fn from(status: OutcomeStatus) -> Self {
        match status {
            OutcomeStatus::Ok => Self::Ok,
            OutcomeStatus::DecodeError => Self::DecodeError,
            OutcomeStatus::ExtractorInitError => Self::ExtractorInitError,
            OutcomeStatus::ExtractionError => Self::ExtractionError,
            OutcomeStatus::InternalError => Self::InternalError,
        }
    }
}

impl From<proto::OutcomeStatus> for OutcomeStatus {
    fn from(status: proto::OutcomeStatus) -> Self {
        match status {
            proto::OutcomeStatus::Ok => Self::Ok,
            proto::OutcomeStatus::DecodeError => Self::DecodeError,
            proto::OutcomeStatus::ExtractorInitError => Self::ExtractorInitError,
            proto::OutcomeStatus::ExtractionError => Self::ExtractionError,
            proto::OutcomeStatus::InternalError => Self::InternalError,
        }
    }
}

/// The result for one [`ImageChunk`].
///
/// `batch_id` and `image_id` always match the originating chunk. Failures are
/// never surfaced as a session error; they travel as a normally-shaped outcome
/// whose `text` holds an error marker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OcrOutcome {
    pub batch_id: String,
    pub image_id: String,
    pub text: String,
    pub status: OutcomeStatus,
}

impl OcrOutcome {
    /// Builds a successful outcome for `chunk`.
    pub fn recognized(chunk: &ImageChunk, text: String) -> Self {
        Self {
            batch_id: chunk.batch_id.clone(),
            image_id: chunk.image_id.clone(),
            text,
            status: OutcomeStatus::Ok,
        }
    }

    /// Downgrades a per-image failure into an outcome for `chunk`.
    ///
    /// The detailed reason is deliberately not sent to the client; only the
    /// fixed marker for the failure kind is. Errors that are not per-image
    /// should never reach a task, and are reported as internal failures.
    pub fn failed(chunk: &ImageChunk, err: &Error) -> Self {
        let (text, status) = match err {
            Error::Decode { .. } => (DECODE_ERROR_MARKER.to_owned(), OutcomeStatus::DecodeError),
            Error::ExtractorInit { .. } => (
                EXTRACTOR_INIT_ERROR_MARKER.to_owned(),
                OutcomeStatus::ExtractorInitError,
            ),
            Error::Extraction { .. } => (
                EXTRACTION_ERROR_MARKER.to_owned(),
                OutcomeStatus::ExtractionError,
            ),
            Error::TaskPanicked { message: Some(msg) } => (
                format!("{FATAL_ERROR_PREFIX}{msg}"),
                OutcomeStatus::InternalError,
            ),
            Error::TaskPanicked { message: None } => {
                (FATAL_UNKNOWN_MARKER.to_owned(), OutcomeStatus::InternalError)
            }
            other => (
                format!("{FATAL_ERROR_PREFIX}{other}"),
                OutcomeStatus::InternalError,
            ),
        };

        Self {
            batch_id: chunk.batch_id.clone(),
            image_id: chunk.image_id.clone(),
            text,
            status,
        }
    }
}

impl From<OcrOutcome> for proto::OcrResult {
    fn from(outcome: OcrOutcome) -> Self {
        Self {
            batch_id: outcome.batch_id,
            image_id: outcome.image_id,
            text: outcome.text,
            status: proto::OutcomeStatus::from(outcome.status) as i32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk() -> ImageChunk {
        ImageChunk {
            batch_id: "b1".into(),
            image_id: "i1".into(),
            payload: Bytes::from_static(b"\x89PNG"),
        }
    }

    #[test]
    fn request_converts_without_touching_payload() {
        let data = Bytes::from_static(b"abc");
        let req = proto::ImageRequest {
            batch_id: "b".into(),
            image_id: "i".into(),
            data: data.clone(),
        };
        let chunk = ImageChunk::from(req);
        assert_eq!(chunk.batch_id, "b");
        assert_eq!(chunk.image_id, "i");
        assert_eq!(chunk.payload.as_ptr(), data.as_ptr());
    }

    #[test]
    fn failures_keep_ids_and_use_markers() {
        let chunk = chunk();
        let cases = [
            (
                Error::Decode { reason: "bad header".into() },
                DECODE_ERROR_MARKER,
                OutcomeStatus::DecodeError,
            ),
            (
                Error::ExtractorInit { reason: "no tessdata".into() },
                EXTRACTOR_INIT_ERROR_MARKER,
                OutcomeStatus::ExtractorInitError,
            ),
            (
                Error::Extraction { reason: "empty".into() },
                EXTRACTION_ERROR_MARKER,
                OutcomeStatus::ExtractionError,
            ),
            (
                Error::TaskPanicked { message: None },
                FATAL_UNKNOWN_MARKER,
                OutcomeStatus::InternalError,
            ),
        ];

        for (err, marker, status) in cases {
            let outcome = OcrOutcome::failed(&chunk, &err);
            assert_eq!(outcome.batch_id, "b1");
            assert_eq!(outcome.image_id, "i1");
            assert_eq!(outcome.text, marker);
            assert_eq!(outcome.status, status);
        }
    }

    #[test]
    fn panic_message_is_embedded() {
        let outcome = OcrOutcome::failed(
            &chunk(),
            &Error::TaskPanicked {
                message: Some("index out of bounds".into()),
            },
        );
        assert_eq!(outcome.text, "[FATAL ERROR] Exception: index out of bounds");
        assert!(outcome.text.starts_with("[FATAL ERROR]"));
    }

    #[test]
    fn error_markers_share_the_legacy_prefix() {
        for marker in [
            DECODE_ERROR_MARKER,
            EXTRACTOR_INIT_ERROR_MARKER,
            EXTRACTION_ERROR_MARKER,
        ] {
            assert!(marker.starts_with("[ERROR] "));
        }
    }

    #[test]
    fn outcome_to_wire_sets_status() {
        let ok: proto::OcrResult = OcrOutcome::recognized(&chunk(), "hello".into()).into();
        assert_eq!(ok.text, "hello");
        assert_eq!(ok.status(), proto::OutcomeStatus::Ok);

        let failed: proto::OcrResult =
            OcrOutcome::failed(&chunk(), &Error::Decode { reason: "x".into() }).into();
        assert_eq!(failed.status(), proto::OutcomeStatus::DecodeError);
        assert_eq!(OutcomeStatus::from(failed.status()), OutcomeStatus::DecodeError);
    }
}
