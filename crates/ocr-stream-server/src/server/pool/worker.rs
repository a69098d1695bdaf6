use crate::server::pool::request::WorkRequest;
use crossbeam_channel::Receiver;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Worker thread body.
///
/// Pulls [`WorkRequest`]s from the pool's shared queue until it receives a
/// shutdown request or the queue is disconnected. Tasks run to completion one
/// at a time. A panicking task is caught and logged so the worker keeps
/// serving; tasks are expected to turn their own failures into outcomes, so
/// reaching this point indicates a bug in the task.
///
/// # Arguments
///
/// - `worker_id`: Index of this worker (used for logs and thread names).
/// - `rx`: Shared receiving end of the pool's task queue.
///
/// # Request Types
///
/// - [`WorkRequest::Run`] - Executes the boxed task.
/// - [`WorkRequest::Shutdown`] - Acknowledges and leaves the loop.
pub fn worker_loop(worker_id: usize, rx: Receiver<WorkRequest>) {
    tracing::trace!("Worker {worker_id} started");

    while let Ok(work) = rx.recv() {
        match work {
            WorkRequest::Run(task) => {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
                    tracing::error!(
                        "Worker {worker_id} recovered from a panicking task: {}",
                        panic_message(payload.as_ref()).unwrap_or_else(|| "<non-string payload>".to_owned())
                    );
                }
            }
            WorkRequest::Shutdown { response } => {
                tracing::debug!("Worker {worker_id} received shutdown signal");

                if response.send(()).is_err() {
                    tracing::error!("Worker {worker_id} failed to acknowledge shutdown");
                }
                break;
            }
        }
    }

    tracing::trace!("Worker {worker_id} stopped");
}

/// Extracts the message from a panic payload, if it is a string.
pub fn panic_message(payload: &(dyn Any + Send)) -> Option<String> {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
}
