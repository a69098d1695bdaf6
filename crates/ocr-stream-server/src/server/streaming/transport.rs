//! Transport seams of a session.
//!
//! The coordinator never touches gRPC types directly. It pulls images from a
//! [`ChunkSource`] on the session thread and pushes outcomes into an
//! [`OutcomeSink`] from the writer thread, which keeps the session logic
//! testable with in-memory transports.

use ocr_stream_core::{
    Error, Result,
    types::{ImageChunk, OcrOutcome},
};

/// Inbound half of a session: the client's image stream.
pub trait ChunkSource {
    /// Blocks until the next image arrives.
    ///
    /// Returns `Ok(None)` once the client half-closes the stream.
    ///
    /// # Errors
    ///
    /// Any transport failure. [`Error::RequestCancelled`] and
    /// [`Error::ServiceShutdown`] abort the session; every other error is
    /// treated as end of input.
    ///
    fn next_chunk(&mut self) -> Result<Option<ImageChunk>>;
}

/// Outbound half of a session: the client's result stream.
///
/// Owned by exactly one writer thread, so implementations need no internal
/// locking.
pub trait OutcomeSink: Send + 'static {
    /// Writes one outcome, blocking while the transport pushes back.
    ///
    /// # Errors
    ///
    /// [`Error::TransportWrite`] if the outcome could not be written.
    fn deliver(&mut self, outcome: OcrOutcome) -> Result<()>;

    /// Why the session should stop writing, if it should.
    ///
    /// [`Error::ServiceShutdown`] when the server is abandoning the session,
    /// [`Error::RequestCancelled`] when the client has gone away. Shutdown
    /// wins when both hold.
    fn cancellation(&self) -> Option<Error>;
}
