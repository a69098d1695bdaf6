//! Thread pool for per-image recognition tasks.
//!
//! This module defines the [`WorkerPool`] struct, which owns a fixed set of OS
//! worker threads draining one shared task queue. Any stream may submit to it;
//! whichever worker is idle picks up the next task. It supports coordinated
//! shutdown via a shared [`CancellationToken`].
//!
//! Tasks are fire-and-forget: [`WorkerPool::submit`] never reports completion.
//! There is no ordering guarantee across tasks.

use crate::server::pool::{
    request::{Task, WorkRequest},
    worker::worker_loop,
};
use core::time::Duration;
use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use ocr_stream_core::{Error, Result};
use parking_lot::Mutex;
use std::thread::{self, JoinHandle};
use tokio_util::sync::CancellationToken;

/// A fixed-size pool of worker threads that run [`Task`]s.
///
/// Work is distributed through one multi-consumer queue. With no capacity the
/// queue is unbounded and `submit` never blocks; with a capacity, `submit`
/// blocks while the queue is full, pushing back on the submitting stream.
pub struct WorkerPool {
    sender: Sender<WorkRequest>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    num_workers: usize,
    shutdown_token: CancellationToken,
}

impl WorkerPool {
    /// Spawns `num_workers` worker threads sharing one task queue.
    ///
    /// `max_queued_tasks` bounds the queue; `None` leaves it unbounded.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidRequest`] if `num_workers` is zero.
    /// - [`Error::Internal`] if a worker thread fails to spawn.
    pub fn new(num_workers: usize, max_queued_tasks: Option<usize>) -> Result<Self> {
        if num_workers == 0 {
            return Err(Error::InvalidRequest {
                reason: "worker pool needs at least one worker".to_owned(),
            });
        }

        let (sender, receiver) = match max_queued_tasks {
            Some(capacity) => crossbeam_channel::bounded(capacity),
            None => crossbeam_channel::unbounded(),
        };

        let mut workers = Vec::with_capacity(num_workers);
        for worker_id in 0..num_workers {
            workers.push(spawn_worker(worker_id, receiver.clone())?);
        }

        tracing::debug!(
            "Started {num_workers} workers ({})",
            max_queued_tasks.map_or_else(|| "unbounded queue".to_owned(), |c| format!("queue capacity {c}"))
        );

        Ok(Self {
            sender,
            workers: Mutex::new(workers),
            num_workers,
            shutdown_token: CancellationToken::new(),
        })
    }

    /// Number of tasks waiting for a worker.
    pub fn queued(&self) -> usize {
        self.sender.len()
    }

    /// Enqueues a task for execution on the next idle worker.
    ///
    /// Never waits for the task to run. Blocks only when the queue is bounded
    /// and full.
    ///
    /// # Errors
    ///
    /// - [`Error::ServiceShutdown`] once [`shutdown`](Self::shutdown) has begun.
    /// - [`Error::ChannelError`] if every worker is gone.
    pub fn submit<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.shutdown_token.is_cancelled() {
            return Err(Error::ServiceShutdown);
        }

        let task: Task = Box::new(task);
        self.sender
            .send(WorkRequest::Run(task))
            .map_err(|_| Error::ChannelError {
                context: "worker pool queue closed".to_owned(),
            })
    }

    /// Gracefully shuts down all workers in the pool.
    ///
    /// - Cancels the shutdown token so [`submit`](Self::submit) refuses work.
    /// - Queues one [`WorkRequest::Shutdown`] per worker behind any pending
    ///   tasks, so already-queued work still runs.
    /// - Waits up to `timeout` per worker for acknowledgements, then joins the
    ///   threads if every worker acknowledged. Workers stuck in a long task are
    ///   left detached.
    ///
    /// Calling this more than once is a no-op.
    pub fn shutdown(&self, timeout: Duration) -> Result<()> {
        if self.shutdown_token.is_cancelled() {
            return Ok(());
        }

        tracing::info!("Shutting down worker pool ({} queued tasks)", self.queued());
        self.shutdown_token.cancel();

        let mut acks = Vec::with_capacity(self.num_workers);
        for i in 0..self.num_workers {
            let (tx, rx) = crossbeam_channel::bounded(1);
            match self.sender.send_timeout(WorkRequest::Shutdown { response: tx }, timeout) {
                Ok(()) => acks.push(rx),
                Err(SendTimeoutError::Timeout(_)) => {
                    tracing::warn!("Timed out queueing shutdown for worker slot {i}");
                }
                Err(SendTimeoutError::Disconnected(_)) => {
                    tracing::error!("Failed to send shutdown to worker slot {i}: queue closed");
                }
            }
        }

        tracing::debug!("Waiting for up to {timeout:?} per worker for shutdown acknowledgements");

        let acknowledged = acks
            .iter()
            .enumerate()
            .filter(|(i, rx)| match rx.recv_timeout(timeout) {
                Ok(()) => true,
                Err(RecvTimeoutError::Timeout) => {
                    tracing::warn!("Worker shutdown {i} timed out");
                    false
                }
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::error!("Worker shutdown {i} dropped its acknowledgement");
                    false
                }
            })
            .count();

        let handles = core::mem::take(&mut *self.workers.lock());
        if acknowledged == self.num_workers {
            for handle in handles {
                let name = handle.thread().name().unwrap_or("worker").to_owned();
                if handle.join().is_err() {
                    tracing::error!("{name} panicked during shutdown");
                }
            }
        } else {
            tracing::warn!(
                "{} of {} workers did not stop in time; leaving them detached",
                self.num_workers - acknowledged,
                self.num_workers
            );
        }

        tracing::info!("Worker pool shutdown complete");
        Ok(())
    }
}

fn spawn_worker(worker_id: usize, receiver: Receiver<WorkRequest>) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("ocr-worker-{worker_id}"))
        .spawn(move || worker_loop(worker_id, receiver))
        .map_err(|e| Error::Internal {
            context: format!("failed to spawn worker {worker_id}: {e}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc, Barrier,
        atomic::{AtomicUsize, Ordering},
    };

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn rejects_zero_workers() {
        assert!(matches!(
            WorkerPool::new(0, None),
            Err(Error::InvalidRequest { .. })
        ));
    }

    #[test]
    fn runs_every_submitted_task() {
        let pool = WorkerPool::new(4, None).unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();

        for i in 0..100 {
            let tx = tx.clone();
            pool.submit(move || tx.send(i).unwrap()).unwrap();
        }

        let mut seen: Vec<i32> = (0..100).map(|_| rx.recv_timeout(WAIT).unwrap()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn workers_run_in_parallel() {
        let workers = 4;
        let pool = WorkerPool::new(workers, None).unwrap();
        let barrier = Arc::new(Barrier::new(workers));
        let (tx, rx) = crossbeam_channel::unbounded();

        // Each task blocks until all of them are running at the same time.
        for _ in 0..workers {
            let barrier = Arc::clone(&barrier);
            let tx = tx.clone();
            pool.submit(move || {
                barrier.wait();
                tx.send(()).unwrap();
            })
            .unwrap();
        }

        for _ in 0..workers {
            rx.recv_timeout(WAIT).expect("tasks did not run concurrently");
        }
    }

    #[test]
    fn survives_panicking_task() {
        let pool = WorkerPool::new(1, None).unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();

        pool.submit(|| panic!("task failure")).unwrap();
        pool.submit(move || tx.send("still alive").unwrap()).unwrap();

        assert_eq!(rx.recv_timeout(WAIT).unwrap(), "still alive");
    }

    #[test]
    fn shutdown_drains_queued_work_then_refuses() {
        let pool = WorkerPool::new(2, None).unwrap();
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..50 {
            let done = Arc::clone(&done);
            pool.submit(move || {
                done.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        pool.shutdown(WAIT).unwrap();
        assert_eq!(done.load(Ordering::SeqCst), 50);
        assert_eq!(pool.submit(|| {}), Err(Error::ServiceShutdown));

        // Idempotent.
        pool.shutdown(WAIT).unwrap();
    }

    #[test]
    fn bounded_queue_blocks_submitter_until_space_frees() {
        let pool = Arc::new(WorkerPool::new(1, Some(1)).unwrap());
        let (gate_tx, gate_rx) = crossbeam_channel::bounded::<()>(0);
        let (started_tx, started_rx) = crossbeam_channel::bounded::<()>(1);

        // Occupy the only worker until the gate opens.
        pool.submit(move || {
            started_tx.send(()).unwrap();
            gate_rx.recv().unwrap();
        })
        .unwrap();
        started_rx.recv_timeout(WAIT).unwrap();

        // Fill the single queue slot.
        pool.submit(|| {}).unwrap();

        let (submitted_tx, submitted_rx) = crossbeam_channel::bounded(1);
        let submitter = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                pool.submit(|| {}).unwrap();
                submitted_tx.send(()).unwrap();
            })
        };

        assert!(
            submitted_rx.recv_timeout(Duration::from_millis(150)).is_err(),
            "submit should block while the queue is full"
        );

        gate_tx.send(()).unwrap();
        submitted_rx.recv_timeout(WAIT).unwrap();
        submitter.join().unwrap();
    }
}
