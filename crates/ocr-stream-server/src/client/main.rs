//! # `ocr-stream-client`
//!
//! Sends image files over a single `SendImage` stream and prints each result
//! as it arrives.
//!
//! ```bash
//! ocr-stream-client --server http://127.0.0.1:50051 --batch-id scans page1.png page2.png
//! ```

use anyhow::Context;
use clap::Parser;
use ocr_stream_core::proto::{ImageRequest, OutcomeStatus, ocr_service_client::OcrServiceClient};
use std::{path::PathBuf, time::Instant};
use tonic::codec::CompressionEncoding;

#[derive(Parser, Debug)]
#[command(name = "ocr-stream-client", version, about = "Stream images to an OCR server")]
struct ClientArgs {
    /// Server URI.
    #[arg(long, env = "OCR_SERVER", default_value = "http://127.0.0.1:50051")]
    server: String,

    /// Batch id attached to every image of this run.
    #[arg(long, default_value = "batch")]
    batch_id: String,

    /// Compress requests with zstd.
    #[arg(long, default_value_t = false)]
    zstd: bool,

    /// Image files to recognize. Each file name becomes its image id.
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = ClientArgs::parse();

    let mut requests = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let image_id = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        requests.push(ImageRequest {
            batch_id: args.batch_id.clone(),
            image_id,
            data: data.into(),
        });
    }
    let sent = requests.len();

    let mut client = OcrServiceClient::connect(args.server.clone())
        .await
        .with_context(|| format!("failed to connect to {}", args.server))?
        .accept_compressed(CompressionEncoding::Zstd)
        .accept_compressed(CompressionEncoding::Gzip);
    if args.zstd {
        client = client.send_compressed(CompressionEncoding::Zstd);
    }

    let start = Instant::now();
    let mut results = client
        .send_image(tokio_stream::iter(requests))
        .await
        .context("failed to open stream")?
        .into_inner();

    let mut received = 0_usize;
    let mut failed = 0_usize;
    while let Some(result) = results.message().await.context("stream failed")? {
        received += 1;
        let status = result.status();
        if status != OutcomeStatus::Ok {
            failed += 1;
        }
        println!(
            "[{}/{}] {:?}\n{}\n",
            result.batch_id,
            result.image_id,
            status,
            result.text.trim_end()
        );
    }

    println!(
        "{received}/{sent} results ({failed} failed) in {:.2} ms",
        start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(())
}
