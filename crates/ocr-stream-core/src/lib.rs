#![doc = include_str!("../README.md")]

pub mod common;
pub use common::error::{Error, Result};
pub use common::types;

/// gRPC service and message definitions generated from `proto/ocr.proto`.
///
/// ## Service
///
/// - `OcrService::SendImage` - bidirectional stream. Clients send
///   [`ImageRequest`]s for as long as they like and receive one [`OcrResult`]
///   per request, in completion order.
///
/// ## Correlation
///
/// The server never reorders ids: `OcrResult.batch_id` and
/// `OcrResult.image_id` are copied from the originating request.
///
/// [`ImageRequest`]: crate::proto::ImageRequest
/// [`OcrResult`]: crate::proto::OcrResult
pub mod proto {
    tonic::include_proto!("ocr");

    /// Encoded file descriptor set for gRPC server reflection.
    pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("ocr_descriptor");
}
