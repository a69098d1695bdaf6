/// Builds the gRPC client and server code for the `ocr.proto` definition using
/// `tonic-prost-build`.
///
/// # Byte Field Optimization
///
/// The `data` field of `ImageRequest` is marked with `.bytes(...)` so it is
/// deserialized as `bytes::Bytes` instead of `Vec<u8>`. Image payloads are
/// handed from the gRPC reader to a worker thread by value, and `Bytes` lets
/// that hand-off happen without copying the image.
///
/// # Files and Paths
///
/// - Proto file: `proto/ocr.proto`
/// - Includes: `proto/`
/// - Descriptor set: `$OUT_DIR/ocr_descriptor.bin` (served by gRPC reflection)
///
/// # Panics
///
/// Panics if code generation fails (for example when `protoc` is missing).
use std::env;
use std::path::PathBuf;

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let descriptor_path = out_dir.join("ocr_descriptor.bin");

    let mut config = tonic_prost_build::Config::new();

    config
        .bytes([".ocr.ImageRequest.data"])
        .file_descriptor_set_path(&descriptor_path);

    tonic_prost_build::configure()
        .compile_with_config(config, &["proto/ocr.proto"], &["proto"])
        .unwrap();
}
