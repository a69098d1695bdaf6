//! Per-stream session machinery.
//!
//! One session per `SendImage` call. The reader, the pool tasks and the
//! writer share only a [`SessionState`](state::SessionState) and a result
//! channel:
//!
//! - [`coordinator`] - the read loop, the writer thread and the final status.
//! - [`processor`] - per-image work run on pool workers.
//! - [`queue`] - result channel between tasks and the writer.
//! - [`state`] - session lifecycle and the write-failed flag.
//! - [`transport`] - inbound and outbound transport traits.

pub mod coordinator;
pub mod processor;
pub mod queue;
pub mod state;
pub mod transport;

pub use coordinator::{SessionReport, run_session};
pub use transport::{ChunkSource, OutcomeSink};
