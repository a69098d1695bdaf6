//! gRPC surface of the service.
//!
//! - [`handler`] - `OcrService` implementation (`OcrStreamService`).
//! - [`stream`] - adapters from tonic streams to the session transport traits.

pub mod handler;
pub mod stream;
