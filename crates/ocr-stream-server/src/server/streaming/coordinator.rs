//! Session coordination for one `SendImage` stream.
//!
//! [`run_session`] drives a session from first image to final status:
//!
//! - The calling thread is the reader. It pulls images from the
//!   [`ChunkSource`] and submits one task per image to the shared
//!   [`WorkerPool`], without waiting for recognition.
//! - A dedicated writer thread is the only code that touches the
//!   [`OutcomeSink`]. It drains the session's [`ResultQueue`] in arrival
//!   order, so outcomes reach the client in completion order, not input order.
//! - Tasks hand outcomes to the writer through the queue and never write to
//!   the transport themselves.
//!
//! The writer finishes once input has ended and every accepted image has
//! produced its outcome. A failed write or an observed cancellation marks the
//! session failed: the writer stops, the reader stops accepting images, and
//! tasks still running finish but their outcomes are discarded.

use crate::server::{
    config::SessionOptions,
    extract::TextExtractor,
    pool::WorkerPool,
    streaming::{
        processor::run_image_task,
        queue::{Drained, ResultQueue, ResultReceiver, result_queue},
        state::{SessionPhase, SessionState},
        transport::{ChunkSource, OutcomeSink},
    },
    telemetry::{increment_images_received, increment_outcomes_delivered},
};
use core::time::Duration;
use ocr_stream_core::{Error, Result, types::ImageChunk};
use portable_atomic::{AtomicU64, Ordering};
use std::{sync::Arc, thread};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Summary of a session that completed with an OK status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub session_id: u64,
    /// Images submitted to the pool.
    pub accepted: usize,
    /// Outcomes written to the client.
    pub delivered: usize,
    /// Error that ended the input early. The session still drained normally.
    pub read_error: Option<Error>,
    pub phase: SessionPhase,
}

/// How the writer thread stopped.
#[derive(Debug)]
enum WriterExit {
    /// Input ended and every outcome was written.
    Drained { delivered: usize },
    /// The session was failed by someone else (reader-side cancellation).
    Aborted { delivered: usize },
    /// The sink reported cancellation, for the given reason.
    Cancelled { delivered: usize, reason: Error },
    /// A write failed.
    WriteFailed { delivered: usize, error: Error },
}

impl WriterExit {
    const fn delivered(&self) -> usize {
        match self {
            Self::Drained { delivered }
            | Self::Aborted { delivered }
            | Self::Cancelled { delivered, .. }
            | Self::WriteFailed { delivered, .. } => *delivered,
        }
    }

    fn into_error(self) -> Option<Error> {
        match self {
            Self::Drained { .. } | Self::Aborted { .. } => None,
            Self::Cancelled { reason, .. } => Some(reason),
            Self::WriteFailed { error, .. } => Some(error),
        }
    }
}

/// Runs one streaming session to completion.
///
/// Blocks the calling thread for the life of the session; run it on a
/// blocking thread, never on an async executor.
///
/// Every accepted image yields exactly one outcome, written at most once and
/// only from the writer thread. Per-image failures are reported as outcomes
/// and never end the session.
///
/// # Errors
///
/// - [`Error::TransportWrite`] if a write to the sink failed.
/// - [`Error::RequestCancelled`] if the client went away mid-session.
/// - [`Error::ServiceShutdown`] if the server is shutting down or stopped
///   accepting work. Takes precedence over the other errors.
/// - [`Error::Internal`] if the writer thread could not be started.
pub fn run_session<S, K, E>(
    mut source: S,
    sink: K,
    pool: &WorkerPool,
    extractor: &Arc<E>,
    options: &SessionOptions,
) -> Result<SessionReport>
where
    S: ChunkSource,
    K: OutcomeSink,
    E: TextExtractor,
{
    let session_id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
    let span = tracing::info_span!("session", id = session_id);
    let _entered = span.enter();

    let state = Arc::new(SessionState::new());
    let (results, receiver) = result_queue(Arc::clone(&state));
    let language: Arc<str> = Arc::from(options.language.as_str());

    let writer = {
        let span = span.clone();
        let poll = options.cancel_poll_interval;
        thread::Builder::new()
            .name(format!("ocr-writer-{session_id}"))
            .spawn(move || span.in_scope(|| writer_loop(sink, &receiver, poll)))
            .map_err(|e| Error::Internal {
                context: format!("failed to spawn writer thread: {e}"),
            })?
    };

    state.start_reading();
    tracing::debug!("Session started");

    let mut accepted = 0_usize;
    let mut read_error = None;
    let mut abort = None;

    while !state.is_write_failed() {
        let chunk = match source.next_chunk() {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) if e.is_session_fatal() => {
                tracing::debug!("Read loop aborted: {e}");
                abort = Some(e);
                break;
            }
            Err(e) => {
                tracing::warn!("Read loop stopped, draining accepted images: {e}");
                read_error = Some(e);
                break;
            }
        };
        increment_images_received();

        if state.is_write_failed() {
            tracing::trace!(image_id = %chunk.image_id, "Session failed; dropping image");
            break;
        }

        if let Err(e) = submit_image(pool, extractor, chunk, &language, &results) {
            tracing::warn!("Failed to submit image: {e}");
            abort = Some(e);
            break;
        }
        accepted += 1;
    }

    if abort.is_some() {
        state.fail();
    }

    // Releasing the reader's handle lets the writer see end of input once the
    // last in-flight task has pushed its outcome.
    drop(results);
    drop(source);
    state.finish_reading();

    let exit = writer.join().map_err(|_| Error::Internal {
        context: "writer thread panicked".to_owned(),
    })?;

    let delivered = exit.delivered();

    let failure = match (exit.into_error(), abort) {
        (_, Some(Error::ServiceShutdown)) => Some(Error::ServiceShutdown),
        (written, read) => written.or(read),
    };

    if let Some(error) = failure {
        // Tasks still in flight discard their outcomes after this returns.
        let discarded = state.discarded();
        tracing::info!(accepted, delivered, discarded, "Session failed: {error}");
        return Err(error);
    }

    state.close();
    tracing::debug!(accepted, delivered, "Session complete");

    Ok(SessionReport {
        session_id,
        accepted,
        delivered,
        read_error,
        phase: state.phase(),
    })
}

fn submit_image<E: TextExtractor>(
    pool: &WorkerPool,
    extractor: &Arc<E>,
    chunk: ImageChunk,
    language: &Arc<str>,
    results: &ResultQueue,
) -> Result<()> {
    let extractor = Arc::clone(extractor);
    let language = Arc::clone(language);
    let results = results.clone();
    let span = tracing::Span::current();

    pool.submit(move || {
        span.in_scope(|| run_image_task(&*extractor, &chunk, &language, &results));
    })
}

/// Single consumer of a session's results. The only code that writes to the
/// sink.
fn writer_loop<K: OutcomeSink>(mut sink: K, receiver: &ResultReceiver, poll: Duration) -> WriterExit {
    let mut delivered = 0;

    loop {
        let next = receiver.recv(poll);

        if receiver.is_write_failed() {
            if matches!(next, Drained::Outcome(_)) {
                receiver.discard();
            }
            return WriterExit::Aborted { delivered };
        }

        match next {
            Drained::Outcome(outcome) => {
                if let Some(reason) = sink.cancellation() {
                    receiver.fail();
                    receiver.discard();
                    return WriterExit::Cancelled { delivered, reason };
                }

                let image_id = outcome.image_id.clone();
                if let Err(error) = sink.deliver(outcome) {
                    tracing::debug!(%image_id, "Write failed: {error}");
                    receiver.fail();
                    receiver.discard();
                    return WriterExit::WriteFailed { delivered, error };
                }

                delivered += 1;
                increment_outcomes_delivered();
            }
            Drained::Idle => {
                if let Some(reason) = sink.cancellation() {
                    receiver.fail();
                    return WriterExit::Cancelled { delivered, reason };
                }
            }
            Drained::Closed => return WriterExit::Drained { delivered },
        }
    }
}
