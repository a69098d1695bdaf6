use anyhow::bail;
use clap::Parser;
use core::time::Duration;
use ocr_stream_core::types::DEFAULT_LANGUAGE;
use std::path::PathBuf;

/// Runtime configuration for the `ocr-stream-server` binary.
///
/// These settings control the worker pool, buffering, message limits and
/// recognition language of the streaming OCR service. All values are parsed
/// from CLI arguments or environment variables (a `.env` file is loaded
/// first), with defaults suitable for a single-host deployment.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "ocr-stream-server",
    version,
    about = "A gRPC service that streams images in and recognized text out"
)]
pub struct CliArgs {
    /// Number of worker threads running text recognition.
    ///
    /// The pool is shared by every open stream. Recognition is CPU bound, so
    /// values above the number of cores rarely help.
    ///
    /// Environment variable: `NUM_WORKERS`
    #[arg(long, env = "NUM_WORKERS", default_value_t = 4)]
    pub num_workers: usize,

    /// Maximum number of images waiting for a worker, across all streams.
    ///
    /// `0` keeps the queue unbounded: readers never wait, and a fast client
    /// can grow the queue without limit. Any other value bounds the queue, and
    /// a stream's reader stops pulling new images while the queue is full.
    ///
    /// Environment variable: `MAX_QUEUED_TASKS`
    #[arg(long, env = "MAX_QUEUED_TASKS", default_value_t = 0)]
    pub max_queued_tasks: usize,

    /// Capacity of the response buffer between a stream's writer thread and
    /// the gRPC transport.
    ///
    /// Lower values push back on the writer sooner when the client reads
    /// slowly; higher values allow deeper pipelining.
    ///
    /// Environment variable: `STREAM_BUFFER_SIZE`
    #[arg(long, env = "STREAM_BUFFER_SIZE", default_value_t = 16)]
    pub stream_buffer_size: usize,

    /// Largest accepted request message, in bytes (one image plus its ids).
    ///
    /// Environment variable: `MAX_MESSAGE_BYTES`
    #[arg(long, env = "MAX_MESSAGE_BYTES", default_value_t = 4 * 1024 * 1024)]
    pub max_message_bytes: usize,

    /// Recognition language passed to the text extractor.
    ///
    /// Environment variable: `OCR_LANGUAGE`
    #[arg(long, env = "OCR_LANGUAGE", default_value_t = String::from(DEFAULT_LANGUAGE))]
    pub language: String,

    /// Directory containing Tesseract `*.traineddata` files. Defaults to the
    /// engine's built-in search path.
    ///
    /// Environment variable: `TESSDATA_PATH`
    #[arg(long, env = "TESSDATA_PATH")]
    pub tessdata_path: Option<PathBuf>,

    /// How often, in milliseconds, an idle writer re-checks whether its
    /// client has gone away.
    ///
    /// Environment variable: `CANCEL_POLL_MS`
    #[arg(long, env = "CANCEL_POLL_MS", default_value_t = 100)]
    pub cancel_poll_ms: u64,

    /// Seconds to wait for open streams to finish on shutdown before they are
    /// cancelled, and again for each worker to acknowledge.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 5)]
    pub shutdown_timeout: u64,

    /// Address to listen on (TCP or Unix socket path; use --uds for Unix
    /// socket).
    ///
    /// Example: "0.0.0.0:50051" or "/tmp/ocr-stream.sock"
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:50051"))]
    pub server_addr: String,

    /// Listen on a Unix socket instead of TCP. If set, `SERVER_ADDR` must be a
    /// file path.
    #[arg(short, long, default_value_t = false)]
    pub uds: bool,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub num_workers: usize,
    /// `None` means unbounded.
    pub max_queued_tasks: Option<usize>,
    pub stream_buffer_size: usize,
    pub max_message_bytes: usize,
    pub language: String,
    pub tessdata_path: Option<PathBuf>,
    pub cancel_poll_interval: Duration,
    pub shutdown_timeout: Duration,
    pub server_addr: String,
    pub uds: bool,
}

impl ServerConfig {
    /// Per-stream settings handed to the session coordinator.
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            language: self.language.clone(),
            cancel_poll_interval: self.cancel_poll_interval,
        }
    }
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.num_workers == 0 {
            bail!("NUM_WORKERS must be greater than 0");
        }

        if args.stream_buffer_size == 0 {
            bail!("STREAM_BUFFER_SIZE must be greater than 0");
        }

        if args.max_message_bytes == 0 {
            bail!("MAX_MESSAGE_BYTES must be greater than 0");
        }

        if args.cancel_poll_ms == 0 {
            bail!("CANCEL_POLL_MS must be greater than 0");
        }

        let language = args.language.trim().to_owned();
        if language.is_empty() {
            bail!("OCR_LANGUAGE must not be empty");
        }

        if let Some(path) = &args.tessdata_path {
            if !path.is_dir() {
                bail!("TESSDATA_PATH ({}) is not a directory", path.display());
            }
        }

        Ok(Self {
            num_workers: args.num_workers,
            max_queued_tasks: (args.max_queued_tasks > 0).then_some(args.max_queued_tasks),
            stream_buffer_size: args.stream_buffer_size,
            max_message_bytes: args.max_message_bytes,
            language,
            tessdata_path: args.tessdata_path,
            cancel_poll_interval: Duration::from_millis(args.cancel_poll_ms),
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
            server_addr: args.server_addr,
            uds: args.uds,
        })
    }
}

/// Settings that apply to a single `SendImage` stream.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Recognition language for every image of the stream.
    pub language: String,
    /// Upper bound on how long an idle writer goes without checking for
    /// cancellation.
    pub cancel_poll_interval: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_owned(),
            cancel_poll_interval: Duration::from_millis(100),
        }
    }
}
