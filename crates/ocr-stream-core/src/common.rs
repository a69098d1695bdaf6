//! Shared outcome types and the service-wide error type.
//!
//! - [`error`] - [`Error`](error::Error) and its mapping onto `tonic::Status`.
//! - [`types`] - Inbound [`ImageChunk`](types::ImageChunk), outbound
//!   [`OcrOutcome`](types::OcrOutcome) and the wire-compatible error markers.

pub mod error;
pub mod types;
