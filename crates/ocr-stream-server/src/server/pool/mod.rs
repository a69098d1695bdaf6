//! Worker pool for text recognition.
//!
//! This module manages a fixed set of OS worker threads that run per-image
//! recognition tasks for every open stream. It provides:
//!
//! - A single shared task queue (multi-producer, multi-consumer) so an idle
//!   worker always picks up the next image, whichever stream it came from
//! - Optional bounded capacity for backpressure on fast clients
//! - Panic isolation so a failing task never takes its worker down
//! - Graceful shutdown coordination via a cancellation token and per-worker
//!   acknowledgements
//!
//! ## Submodules
//!
//! - [`request`] - Messages sent from the pool to its workers.
//! - [`worker`] - Defines the worker thread loop.
//! - [`manager`] - Owns the threads, the queue, submission and shutdown.
//!
//! The pool is created once at startup, shared by every stream, and shut down
//! when the process exits. Ending a stream does not cancel its queued tasks;
//! they run to completion and their outcome is discarded.
pub mod manager;
pub mod request;
pub mod worker;

pub use manager::WorkerPool;
