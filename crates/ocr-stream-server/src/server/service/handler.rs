//! gRPC service implementation for streaming OCR.
//!
//! This module defines [`OcrStreamService`], the implementation of the
//! [`OcrService`] gRPC service. Each `SendImage` call becomes one session: the
//! call's request stream is read on a blocking thread, every image is
//! recognized on the shared worker pool, and outcomes flow back on the response
//! stream as they complete.
//!
//! ## Responsibilities
//!
//! - Own the process-wide [`WorkerPool`] and text extractor.
//! - Bridge each call's streams into a session via [`run_session`].
//! - Surface session failures to the client as a final non-OK status.
//! - Refuse new streams and drain open ones on shutdown.

use crate::server::{
    config::ServerConfig,
    extract::TextExtractor,
    pool::WorkerPool,
    service::stream::{GrpcChunkSource, GrpcOutcomeSink},
    streaming::run_session,
    telemetry::{
        decrement_sessions_inflight, increment_session_errors, increment_sessions,
        increment_sessions_inflight, outcomes_discarded_total, record_session_duration,
    },
};
use core::pin::Pin;
use futures::Stream;
use ocr_stream_core::{
    Error,
    proto::{
        ImageRequest, OcrResult,
        ocr_service_server::{OcrService, OcrServiceServer},
    },
};
use portable_atomic::{AtomicBool, AtomicUsize, Ordering};
use std::{sync::Arc, time::Instant};
use tokio::{
    runtime::Handle,
    sync::{Notify, mpsc},
};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status, Streaming, codec::CompressionEncoding};

/// Streaming OCR service.
///
/// Cheap to clone: every clone shares the same pool, extractor and session
/// bookkeeping.
pub struct OcrStreamService<E: TextExtractor> {
    config: ServerConfig,
    pool: Arc<WorkerPool>,
    extractor: Arc<E>,
    sessions: Arc<SessionTracker>,
    shutdown_token: CancellationToken,
}

impl<E: TextExtractor> Clone for OcrStreamService<E> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            pool: Arc::clone(&self.pool),
            extractor: Arc::clone(&self.extractor),
            sessions: Arc::clone(&self.sessions),
            shutdown_token: self.shutdown_token.clone(),
        }
    }
}

impl<E: TextExtractor> OcrStreamService<E> {
    /// Creates the service and starts `config.num_workers` worker threads.
    ///
    /// # Errors
    ///
    /// Fails if the worker pool cannot be started.
    pub fn new(config: ServerConfig, extractor: E) -> Result<Self, Error> {
        let pool = WorkerPool::new(config.num_workers, config.max_queued_tasks)?;

        Ok(Self {
            config,
            pool: Arc::new(pool),
            extractor: Arc::new(extractor),
            sessions: Arc::new(SessionTracker::default()),
            shutdown_token: CancellationToken::new(),
        })
    }

    /// Wraps the service in its tonic server, with the configured message
    /// limit and zstd/gzip/deflate compression in both directions.
    pub fn into_server(self) -> OcrServiceServer<Self> {
        let max_message_bytes = self.config.max_message_bytes;
        OcrServiceServer::new(self)
            .max_decoding_message_size(max_message_bytes)
            .send_compressed(CompressionEncoding::Zstd)
            .send_compressed(CompressionEncoding::Gzip)
            .send_compressed(CompressionEncoding::Deflate)
            .accept_compressed(CompressionEncoding::Zstd)
            .accept_compressed(CompressionEncoding::Gzip)
            .accept_compressed(CompressionEncoding::Deflate)
    }

    /// Number of `SendImage` streams currently open.
    pub fn inflight_sessions(&self) -> usize {
        self.sessions.inflight.load(Ordering::Acquire)
    }

    /// Gracefully shuts the service down.
    ///
    /// - New streams are refused with `UNAVAILABLE`.
    /// - Open streams get up to `shutdown_timeout` to finish on their own;
    ///   any still open after that are cancelled.
    /// - The worker pool is then stopped.
    pub async fn shutdown(&self) -> Result<(), Error> {
        self.sessions.draining.store(true, Ordering::SeqCst);

        let timeout = self.config.shutdown_timeout;
        let open = self.inflight_sessions();
        if open > 0 {
            tracing::info!("Waiting up to {timeout:?} for {open} open streams");
        }

        if tokio::time::timeout(timeout, self.sessions.wait_idle())
            .await
            .is_err()
        {
            tracing::warn!(
                "{} streams still open after {timeout:?}; cancelling them",
                self.inflight_sessions()
            );
        }
        self.shutdown_token.cancel();

        let pool = Arc::clone(&self.pool);
        tokio::task::spawn_blocking(move || pool.shutdown(timeout))
            .await
            .map_err(|e| Error::Internal {
                context: format!("pool shutdown task failed: {e}"),
            })??;

        tracing::info!(
            "Worker pool stopped; {} outcomes discarded since start",
            outcomes_discarded_total()
        );
        Ok(())
    }
}

#[tonic::async_trait]
impl<E: TextExtractor> OcrService for OcrStreamService<E> {
    type SendImageStream = Pin<Box<dyn Stream<Item = Result<OcrResult, Status>> + Send>>;

    /// Opens a session for one image stream.
    ///
    /// Returns the response stream immediately; outcomes are sent as images
    /// finish, in completion order. The stream ends with `OK` once the client
    /// half-closes and every image has its outcome, or with a non-OK status if
    /// the session fails.
    #[tracing::instrument(skip_all, fields(remote = ?req.remote_addr()))]
    async fn send_image(
        &self,
        req: Request<Streaming<ImageRequest>>,
    ) -> Result<Response<Self::SendImageStream>, Status> {
        let start = Instant::now();

        let Some(guard) = self.sessions.enter() else {
            increment_session_errors();
            return Err(Error::ServiceShutdown.into());
        };
        increment_sessions();

        let (resp_tx, resp_rx) =
            mpsc::channel::<Result<OcrResult, Status>>(self.config.stream_buffer_size);
        let source = GrpcChunkSource::new(
            req.into_inner(),
            resp_tx.clone(),
            self.shutdown_token.clone(),
            Handle::current(),
        );
        let sink = GrpcOutcomeSink::new(resp_tx.clone(), self.shutdown_token.clone());

        let pool = Arc::clone(&self.pool);
        let extractor = Arc::clone(&self.extractor);
        let options = self.config.session_options();
        let span = tracing::Span::current();

        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            let _entered = span.enter();

            match run_session(source, sink, &pool, &extractor, &options) {
                Ok(report) => {
                    record_session_duration(start.elapsed().as_secs_f64() * 1000.0);
                    tracing::info!(
                        session = report.session_id,
                        images = report.accepted,
                        "Stream completed"
                    );
                }
                Err(e) => {
                    increment_session_errors();
                    tracing::warn!("Stream failed: {e}");
                    // Best effort: the client may already be gone.
                    if resp_tx.blocking_send(Err(e.into())).is_err() {
                        tracing::debug!("Client gone before the final status was sent");
                    }
                }
            }
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(resp_rx))))
    }
}

/// Open-stream bookkeeping used to drain on shutdown.
#[derive(Default)]
struct SessionTracker {
    inflight: AtomicUsize,
    draining: AtomicBool,
    idle: Notify,
}

impl SessionTracker {
    /// Registers a new stream, or returns `None` once shutdown has begun.
    ///
    /// The stream is counted before `draining` is checked, so a concurrent
    /// [`OcrStreamService::shutdown`] either sees it in `inflight` or it sees
    /// `draining` and backs out.
    fn enter(self: &Arc<Self>) -> Option<SessionGuard> {
        self.inflight.fetch_add(1, Ordering::SeqCst);
        increment_sessions_inflight();
        let guard = SessionGuard(Arc::clone(self));

        if self.draining.load(Ordering::SeqCst) {
            drop(guard);
            return None;
        }
        Some(guard)
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.inflight.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Keeps a stream counted as open until the session thread finishes.
struct SessionGuard(Arc<SessionTracker>);

impl Drop for SessionGuard {
    fn drop(&mut self) {
        decrement_sessions_inflight();
        if self.0.inflight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;

    #[test]
    fn tracker_counts_open_streams() {
        let tracker = Arc::new(SessionTracker::default());

        let a = tracker.enter().unwrap();
        let b = tracker.enter().unwrap();
        assert_eq!(tracker.inflight.load(Ordering::SeqCst), 2);

        drop(a);
        drop(b);
        assert_eq!(tracker.inflight.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn tracker_refusal_leaves_no_stream_counted() {
        let tracker = Arc::new(SessionTracker::default());
        tracker.draining.store(true, Ordering::SeqCst);

        assert!(tracker.enter().is_none());
        assert_eq!(tracker.inflight.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn concurrent_enter_is_either_refused_or_awaited() {
        // Streams racing the start of a drain must never slip past it: each
        // one is either refused or still counted when the drain looks.
        for _ in 0..200 {
            let tracker = Arc::new(SessionTracker::default());
            let entering = {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || tracker.enter())
            };

            tracker.draining.store(true, Ordering::SeqCst);
            let seen = tracker.inflight.load(Ordering::SeqCst);

            if let Some(guard) = entering.join().unwrap() {
                assert_eq!(seen, 1, "admitted stream was invisible to the drain");
                drop(guard);
            }
            assert_eq!(tracker.inflight.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn wait_idle_returns_once_last_stream_closes() {
        let tracker = Arc::new(SessionTracker::default());
        let guard = tracker.enter().unwrap();

        let waiting = {
            let tracker = Arc::clone(&tracker);
            tokio::spawn(async move { tracker.wait_idle().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(5), waiting)
            .await
            .unwrap()
            .unwrap();
    }
}
