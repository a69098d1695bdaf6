//! Server-side components of the streaming OCR service.
//!
//! ## Submodules
//!
//! - [`config`] - CLI/env configuration.
//! - [`extract`] - image decoding and text recognition backends.
//! - [`pool`] - fixed worker thread pool shared by all streams.
//! - [`streaming`] - per-stream session coordination.
//! - [`service`] - the `OcrService` gRPC implementation.
//! - [`telemetry`] - logging, tracing and metrics setup.
//!
//! These components are wired together in the server's `main.rs`.

pub mod config;
pub mod extract;
pub mod pool;
pub mod service;
pub mod streaming;
pub mod telemetry;
