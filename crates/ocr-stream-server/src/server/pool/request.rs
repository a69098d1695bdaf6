//! Internal message types sent from the [`WorkerPool`] to its worker threads.
//!
//! ## Variants
//!
//! - [`Run`]: Execute a boxed task to completion.
//! - [`Shutdown`]: Stop the worker after acknowledging on a one-shot channel.
//!
//! [`WorkerPool`]: crate::server::pool::WorkerPool
//! [`Run`]: WorkRequest::Run
//! [`Shutdown`]: WorkRequest::Shutdown

use core::fmt;
use crossbeam_channel::Sender;

/// A unit of work. Fire-and-forget: the pool reports nothing back, so a task
/// delivers its own result (for example through a session's result queue).
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A message consumed by a worker's main loop.
pub enum WorkRequest {
    /// Run the task on the worker that receives it.
    Run(Task),

    /// Request the receiving worker to stop.
    ///
    /// - `response`: acknowledged once the worker has left its loop.
    Shutdown { response: Sender<()> },
}

impl fmt::Debug for WorkRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Run(_) => f.write_str("WorkRequest::Run(..)"),
            Self::Shutdown { .. } => f.write_str("WorkRequest::Shutdown"),
        }
    }
}
