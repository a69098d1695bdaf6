//! gRPC adapters for the session transport traits.
//!
//! A session runs on a blocking thread, while tonic's streams live on the
//! async runtime. [`GrpcChunkSource`] bridges the inbound stream by blocking on
//! the runtime handle for each message; [`GrpcOutcomeSink`] bridges the
//! outbound stream with `blocking_send` into the response channel that tonic
//! drains.

use crate::server::streaming::transport::{ChunkSource, OutcomeSink};
use ocr_stream_core::{
    Error, Result,
    proto::{ImageRequest, OcrResult},
    types::{ImageChunk, OcrOutcome},
};
use tokio::{runtime::Handle, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tonic::{Code, Status, Streaming};

/// Sender half of a `SendImage` response stream.
pub type ResponseSender = mpsc::Sender<core::result::Result<OcrResult, Status>>;

/// Reads images from a client's request stream.
pub struct GrpcChunkSource {
    inbound: Streaming<ImageRequest>,
    responses: ResponseSender,
    shutdown: CancellationToken,
    runtime: Handle,
}

impl GrpcChunkSource {
    /// `responses` is only watched, never written: a closed response stream
    /// means the client is gone and wakes a blocked read.
    pub const fn new(
        inbound: Streaming<ImageRequest>,
        responses: ResponseSender,
        shutdown: CancellationToken,
        runtime: Handle,
    ) -> Self {
        Self {
            inbound,
            responses,
            shutdown,
            runtime,
        }
    }
}

impl ChunkSource for GrpcChunkSource {
    fn next_chunk(&mut self) -> Result<Option<ImageChunk>> {
        let Self {
            inbound,
            responses,
            shutdown,
            runtime,
        } = self;

        runtime.block_on(async {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => Err(Error::ServiceShutdown),
                () = responses.closed() => Err(Error::RequestCancelled),
                message = inbound.message() => match message {
                    Ok(Some(request)) => Ok(Some(ImageChunk::from(request))),
                    Ok(None) => Ok(None),
                    Err(status) if status.code() == Code::Cancelled => Err(Error::RequestCancelled),
                    Err(status) => Err(Error::ChannelError {
                        context: format!("inbound stream failed: {status}"),
                    }),
                },
            }
        })
    }
}

/// Writes outcomes to a client's response stream.
pub struct GrpcOutcomeSink {
    responses: ResponseSender,
    shutdown: CancellationToken,
}

impl GrpcOutcomeSink {
    pub const fn new(responses: ResponseSender, shutdown: CancellationToken) -> Self {
        Self {
            responses,
            shutdown,
        }
    }
}

impl OutcomeSink for GrpcOutcomeSink {
    fn deliver(&mut self, outcome: OcrOutcome) -> Result<()> {
        self.responses
            .blocking_send(Ok(outcome.into()))
            .map_err(|_| Error::TransportWrite {
                context: "response stream closed".to_owned(),
            })
    }

    fn cancellation(&self) -> Option<Error> {
        if self.shutdown.is_cancelled() {
            Some(Error::ServiceShutdown)
        } else if self.responses.is_closed() {
            Some(Error::RequestCancelled)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocr_stream_core::types::OutcomeStatus;

    fn outcome() -> OcrOutcome {
        OcrOutcome {
            batch_id: "b".into(),
            image_id: "i".into(),
            text: "hello".into(),
            status: OutcomeStatus::Ok,
        }
    }

    #[test]
    fn sink_forwards_outcomes() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut sink = GrpcOutcomeSink::new(tx, CancellationToken::new());

        sink.deliver(outcome()).unwrap();
        let sent = rx.try_recv().unwrap().unwrap();
        assert_eq!(sent.image_id, "i");
        assert_eq!(sent.text, "hello");
        assert_eq!(sink.cancellation(), None);
    }

    #[test]
    fn sink_fails_once_client_is_gone() {
        let (tx, rx) = mpsc::channel(4);
        let mut sink = GrpcOutcomeSink::new(tx, CancellationToken::new());
        drop(rx);

        assert_eq!(sink.cancellation(), Some(Error::RequestCancelled));
        assert!(matches!(
            sink.deliver(outcome()),
            Err(Error::TransportWrite { .. })
        ));
    }

    #[test]
    fn sink_reports_server_shutdown() {
        let (tx, _rx) = mpsc::channel(4);
        let token = CancellationToken::new();
        let sink = GrpcOutcomeSink::new(tx, token.clone());

        token.cancel();
        assert_eq!(sink.cancellation(), Some(Error::ServiceShutdown));
    }

    #[test]
    fn sink_prefers_shutdown_over_client_disconnect() {
        let (tx, rx) = mpsc::channel(4);
        let token = CancellationToken::new();
        let sink = GrpcOutcomeSink::new(tx, token.clone());

        drop(rx);
        token.cancel();
        assert_eq!(sink.cancellation(), Some(Error::ServiceShutdown));
    }
}
