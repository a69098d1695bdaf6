//! Error types for the streaming OCR service.
//!
//! This module defines the central `Error` enum, covering every failure the
//! service can observe, from a single unreadable image up to a broken client
//! connection. It implements `From<Error>` for `tonic::Status` so session-level
//! failures propagate to clients with appropriate status codes.
//!
//! ## Error Cases
//!
//! Per-image (recovered inside the task and reported as an outcome marker):
//! - `Decode`: The payload is empty, malformed or in an unsupported format.
//! - `ExtractorInit`: The recognition engine could not be initialized.
//! - `Extraction`: The engine ran but produced no text.
//! - `TaskPanicked`: The recognition engine panicked while handling an image.
//!
//! Session-fatal (stop all writes, the stream ends with a non-OK status):
//! - `TransportWrite`: A write to the response stream failed.
//! - `RequestCancelled`: The client cancelled or disconnected mid-stream.
//!
//! Service:
//! - `ChannelError`: An internal channel between threads closed unexpectedly.
//! - `InvalidRequest`: The client request was malformed.
//! - `ServiceShutdown`: A request arrived while the service was shutting down.
//! - `Internal`: Any other internal failure (e.g. a thread failed to spawn).

use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the streaming OCR service.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The image payload could not be decoded.
    #[error("Decode error: {reason}")]
    Decode { reason: String },

    /// The text recognition engine failed to initialize.
    #[error("Extractor initialization failed: {reason}")]
    ExtractorInit { reason: String },

    /// The text recognition engine ran but produced nothing.
    #[error("Extraction failed: {reason}")]
    Extraction { reason: String },

    /// The recognition engine panicked. `message` holds the panic payload when
    /// it was a string.
    #[error("Task panicked: {}", .message.as_deref().unwrap_or("unknown panic payload"))]
    TaskPanicked { message: Option<String> },

    /// Writing to the response stream failed (peer gone or stream broken).
    #[error("Transport write failed: {context}")]
    TransportWrite { context: String },

    /// The client aborted the request.
    #[error("Request cancelled by client")]
    RequestCancelled,

    /// Internal channel send/receive failure.
    #[error("Channel error: {context}")]
    ChannelError { context: String },

    /// The client request was invalid.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,

    /// Any other internal failure.
    #[error("Internal error: {context}")]
    Internal { context: String },
}

impl Error {
    /// Returns `true` for failures that are confined to a single image and
    /// must never abort the session.
    pub const fn is_per_image(&self) -> bool {
        matches!(
            self,
            Self::Decode { .. }
                | Self::ExtractorInit { .. }
                | Self::Extraction { .. }
                | Self::TaskPanicked { .. }
        )
    }

    /// Returns `true` for failures that end the whole session with a non-OK
    /// status.
    pub const fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            Self::TransportWrite { .. } | Self::RequestCancelled | Self::ServiceShutdown
        )
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::Decode { reason } => Status::invalid_argument(format!("Decode error: {reason}")),
            Error::ExtractorInit { reason } => {
                Status::internal(format!("Extractor initialization failed: {reason}"))
            }
            Error::Extraction { reason } => Status::internal(format!("Extraction failed: {reason}")),
            e @ Error::TaskPanicked { .. } => Status::internal(e.to_string()),
            Error::TransportWrite { context } => {
                Status::aborted(format!("Transport write failed: {context}"))
            }
            Error::RequestCancelled => Status::cancelled("Request was cancelled"),
            Error::ChannelError { context } => {
                Status::internal(format!("Channel error: {context}"))
            }
            Error::InvalidRequest { reason } => Status::invalid_argument(reason),
            Error::ServiceShutdown => Status::unavailable("Service is shutting down"),
            Error::Internal { context } => Status::internal(format!("Internal error: {context}")),
        }
    }
}
