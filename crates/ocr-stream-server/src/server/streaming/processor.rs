//! Per-image work executed on pool workers.
//!
//! [`process_image`] turns one [`ImageChunk`] into exactly one [`OcrOutcome`].
//! Every failure, including a panicking recognition engine, is folded into the
//! outcome's text marker and never escapes the task.

use crate::server::{
    extract::TextExtractor,
    pool::worker::panic_message,
    streaming::queue::ResultQueue,
    telemetry::{increment_outcomes, record_extraction_duration},
};
use ocr_stream_core::{
    Error, Result,
    types::{ImageChunk, OcrOutcome},
};
use std::{
    panic::{self, AssertUnwindSafe},
    time::Instant,
};

/// Decodes and recognizes one image.
///
/// Never fails: decode errors, engine errors and engine panics all become an
/// outcome carrying the matching error marker. The decoded image and any
/// engine state are dropped before this returns, on every path.
pub fn process_image<E: TextExtractor>(
    extractor: &E,
    chunk: &ImageChunk,
    language: &str,
) -> OcrOutcome {
    let start = Instant::now();

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        recognize(extractor, &chunk.payload, language)
    }))
    .unwrap_or_else(|payload| {
        Err(Error::TaskPanicked {
            message: panic_message(payload.as_ref()),
        })
    });

    let outcome = match result {
        Ok(text) => OcrOutcome::recognized(chunk, text),
        Err(e) if e.is_per_image() => {
            tracing::debug!(image_id = %chunk.image_id, "Image failed: {e}");
            OcrOutcome::failed(chunk, &e)
        }
        Err(e) => {
            tracing::warn!(image_id = %chunk.image_id, "Unexpected error from extractor: {e}");
            OcrOutcome::failed(chunk, &e)
        }
    };

    record_extraction_duration(start.elapsed().as_secs_f64() * 1000.0);
    increment_outcomes(outcome.status);
    outcome
}

fn recognize<E: TextExtractor>(extractor: &E, payload: &[u8], language: &str) -> Result<String> {
    if payload.is_empty() {
        return Err(Error::Decode {
            reason: "empty payload".to_owned(),
        });
    }

    let image = extractor.decode(payload)?;
    extractor.extract_text(&image, language)
}

/// Body of the pool task submitted for each accepted image.
///
/// Skips recognition when the session has already failed; otherwise processes
/// the image and hands the outcome to the writer. Either way the task's queue
/// handle is dropped on return, which is how the writer learns the task is
/// done.
pub fn run_image_task<E: TextExtractor>(
    extractor: &E,
    chunk: &ImageChunk,
    language: &str,
    results: &ResultQueue,
) {
    if results.is_write_failed() {
        tracing::trace!(image_id = %chunk.image_id, "Session failed; skipping image");
        results.discard();
        return;
    }

    let outcome = process_image(extractor, chunk, language);
    if !results.push(outcome) {
        tracing::trace!(image_id = %chunk.image_id, "Session failed; outcome discarded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::streaming::{
        queue::{Drained, result_queue},
        state::SessionState,
    };
    use bytes::Bytes;
    use core::time::Duration;
    use ocr_stream_core::types::{
        DECODE_ERROR_MARKER, EXTRACTION_ERROR_MARKER, EXTRACTOR_INIT_ERROR_MARKER,
        FATAL_UNKNOWN_MARKER, OutcomeStatus,
    };
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    /// Counts live decoded images so tests can check they are always released.
    struct Tracked {
        live: Arc<AtomicUsize>,
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[derive(Clone, Copy)]
    enum Behavior {
        Echo,
        FailInit,
        FailExtract,
        Unexpected,
        Panic,
        PanicWithoutMessage,
    }

    struct MockExtractor {
        behavior: Behavior,
        live: Arc<AtomicUsize>,
        decodes: AtomicUsize,
    }

    impl MockExtractor {
        fn new(behavior: Behavior) -> Self {
            Self {
                behavior,
                live: Arc::new(AtomicUsize::new(0)),
                decodes: AtomicUsize::new(0),
            }
        }
    }

    impl TextExtractor for MockExtractor {
        type Image = (Tracked, String);

        fn decode(&self, payload: &[u8]) -> Result<Self::Image> {
            self.decodes.fetch_add(1, Ordering::SeqCst);
            let text = core::str::from_utf8(payload).map_err(|e| Error::Decode {
                reason: e.to_string(),
            })?;
            self.live.fetch_add(1, Ordering::SeqCst);
            Ok((
                Tracked {
                    live: Arc::clone(&self.live),
                },
                text.to_owned(),
            ))
        }

        fn extract_text(&self, image: &Self::Image, language: &str) -> Result<String> {
            match self.behavior {
                Behavior::Echo => Ok(format!("{language}:{}", image.1)),
                Behavior::FailInit => Err(Error::ExtractorInit {
                    reason: "missing traineddata".into(),
                }),
                Behavior::FailExtract => Err(Error::Extraction {
                    reason: "no text".into(),
                }),
                Behavior::Unexpected => Err(Error::Internal {
                    context: "engine handle poisoned".into(),
                }),
                Behavior::Panic => panic!("engine exploded"),
                Behavior::PanicWithoutMessage => std::panic::panic_any(7_u8),
            }
        }
    }

    fn chunk(payload: &'static [u8]) -> ImageChunk {
        ImageChunk {
            batch_id: "batch".into(),
            image_id: "img-1".into(),
            payload: Bytes::from_static(payload),
        }
    }

    #[test]
    fn recognized_text_keeps_ids() {
        let extractor = MockExtractor::new(Behavior::Echo);
        let outcome = process_image(&extractor, &chunk(b"hello"), "eng");
        assert_eq!(outcome.batch_id, "batch");
        assert_eq!(outcome.image_id, "img-1");
        assert_eq!(outcome.text, "eng:hello");
        assert_eq!(outcome.status, OutcomeStatus::Ok);
        assert_eq!(extractor.live.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn empty_payload_never_reaches_extractor() {
        let extractor = MockExtractor::new(Behavior::Echo);
        let outcome = process_image(&extractor, &chunk(b""), "eng");
        assert_eq!(outcome.text, DECODE_ERROR_MARKER);
        assert_eq!(outcome.status, OutcomeStatus::DecodeError);
        assert_eq!(extractor.decodes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn undecodable_payload_yields_decode_marker() {
        let extractor = MockExtractor::new(Behavior::Echo);
        let outcome = process_image(&extractor, &chunk(b"\xff\xfe"), "eng");
        assert_eq!(outcome.text, DECODE_ERROR_MARKER);
    }

    #[test]
    fn engine_failures_map_to_markers_and_release_images() {
        let cases = [
            (Behavior::FailInit, EXTRACTOR_INIT_ERROR_MARKER.to_owned()),
            (Behavior::FailExtract, EXTRACTION_ERROR_MARKER.to_owned()),
            (
                Behavior::Panic,
                "[FATAL ERROR] Exception: engine exploded".to_owned(),
            ),
            (Behavior::PanicWithoutMessage, FATAL_UNKNOWN_MARKER.to_owned()),
            (
                Behavior::Unexpected,
                "[FATAL ERROR] Exception: Internal error: engine handle poisoned".to_owned(),
            ),
        ];

        for (behavior, marker) in cases {
            let extractor = MockExtractor::new(behavior);
            let outcome = process_image(&extractor, &chunk(b"page"), "eng");
            assert_eq!(outcome.text, marker);
            assert_eq!(outcome.image_id, "img-1");
            assert!(!outcome.status.is_ok());
            assert_eq!(
                extractor.live.load(Ordering::SeqCst),
                0,
                "decoded image leaked"
            );
        }
    }

    #[test]
    fn task_pushes_exactly_one_outcome() {
        let state = Arc::new(SessionState::new());
        let (queue, receiver) = result_queue(Arc::clone(&state));
        let extractor = MockExtractor::new(Behavior::Echo);

        run_image_task(&extractor, &chunk(b"x"), "eng", &queue);
        drop(queue);

        let poll = Duration::from_millis(20);
        assert!(matches!(receiver.recv(poll), Drained::Outcome(o) if o.text == "eng:x"));
        assert!(matches!(receiver.recv(poll), Drained::Closed));
    }

    #[test]
    fn task_skips_work_after_session_failure() {
        let state = Arc::new(SessionState::new());
        let (queue, _receiver) = result_queue(Arc::clone(&state));
        let extractor = MockExtractor::new(Behavior::Echo);

        state.fail();
        run_image_task(&extractor, &chunk(b"x"), "eng", &queue);

        assert_eq!(extractor.decodes.load(Ordering::SeqCst), 0);
        assert_eq!(state.discarded(), 1);
    }
}
