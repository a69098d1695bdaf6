use bytes::Bytes;
use core::{fmt, hint::black_box};
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use image::{ImageBuffer, ImageFormat, Luma};
use ocr_stream_core::{
    Error, Result,
    types::{ImageChunk, OcrOutcome},
};
use ocr_stream_server::{
    SessionOptions, TextExtractor,
    server::{
        extract::DecodeOnlyExtractor,
        pool::WorkerPool,
        streaming::{ChunkSource, OutcomeSink, run_session},
    },
};
use std::{io::Cursor, sync::Arc, time::Instant};

/// Skips decoding entirely, isolating the coordination overhead.
struct NoopExtractor;

impl TextExtractor for NoopExtractor {
    type Image = usize;

    fn decode(&self, payload: &[u8]) -> Result<usize> {
        Ok(payload.len())
    }

    fn extract_text(&self, image: &usize, _language: &str) -> Result<String> {
        Ok(black_box(*image).to_string())
    }
}

#[derive(Clone, Copy, Debug)]
enum Backend {
    Noop,
    DecodePng,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Noop => write!(f, "noop"),
            Backend::DecodePng => write!(f, "decode_png"),
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct SessionBenchParams {
    images: usize,
    workers: usize,
    backend: Backend,
}

struct PreloadedSource {
    chunks: std::vec::IntoIter<ImageChunk>,
}

impl ChunkSource for PreloadedSource {
    fn next_chunk(&mut self) -> Result<Option<ImageChunk>> {
        Ok(self.chunks.next())
    }
}

struct CountingSink;

impl OutcomeSink for CountingSink {
    fn deliver(&mut self, outcome: OcrOutcome) -> Result<()> {
        black_box(outcome);
        Ok(())
    }

    fn cancellation(&self) -> Option<Error> {
        None
    }
}

fn sample_png() -> Bytes {
    let img = ImageBuffer::<Luma<u8>, _>::from_fn(64, 64, |x, y| Luma([((x ^ y) & 0xff) as u8]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    Bytes::from(out.into_inner())
}

fn chunks(count: usize, payload: &Bytes) -> Vec<ImageChunk> {
    (0..count)
        .map(|i| ImageChunk {
            batch_id: "bench".into(),
            image_id: i.to_string(),
            payload: payload.clone(),
        })
        .collect()
}

fn run_once<E: TextExtractor>(
    pool: &WorkerPool,
    extractor: &Arc<E>,
    chunks: Vec<ImageChunk>,
    options: &SessionOptions,
) {
    let source = PreloadedSource {
        chunks: chunks.into_iter(),
    };
    let report = run_session(source, CountingSink, pool, extractor, options).expect("session failed");
    black_box(report);
}

fn session_bench(c: &mut Criterion) {
    let images_cases = [10, 100, 1_000];
    let workers_cases = [1, 4, 8];
    let backend_cases = [Backend::Noop, Backend::DecodePng];

    let mut cases = Vec::new();
    for &images in &images_cases {
        for &workers in &workers_cases {
            for &backend in &backend_cases {
                cases.push(SessionBenchParams {
                    images,
                    workers,
                    backend,
                });
            }
        }
    }

    let payload = sample_png();
    let options = SessionOptions::default();
    let noop = Arc::new(NoopExtractor);
    let decode = Arc::new(DecodeOnlyExtractor);

    for params in &cases {
        let pool = WorkerPool::new(params.workers, None).expect("pool");
        let mut group = c.benchmark_group("session/run");
        group.throughput(Throughput::Elements(params.images as u64));

        group.bench_function(
            format!(
                "images/{}/workers/{}/backend/{}",
                params.images, params.workers, params.backend
            ),
            |b| {
                b.iter_custom(|iters| {
                    let mut total = core::time::Duration::ZERO;
                    for _ in 0..iters {
                        let input = chunks(params.images, &payload);
                        let start = Instant::now();
                        match params.backend {
                            Backend::Noop => run_once(&pool, &noop, input, &options),
                            Backend::DecodePng => run_once(&pool, &decode, input, &options),
                        }
                        total += start.elapsed();
                    }
                    total
                });
            },
        );

        group.finish();
        pool.shutdown(core::time::Duration::from_secs(5)).expect("pool shutdown");
    }
}

criterion_group!(session_benches, session_bench);
criterion_main!(session_benches);
