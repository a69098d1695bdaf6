//! Result queue between a session's tasks and its writer thread.
//!
//! Many worker threads push outcomes ([`ResultQueue`], cloned into every task)
//! and exactly one writer thread drains them ([`ResultReceiver`]). The queue
//! is a channel, so the writer never holds a lock while it writes to the
//! client and producers are never stalled by slow I/O.
//!
//! The receiver reports [`Drained::Closed`] only once every producer handle is
//! gone and the queue is empty. The reader holds one handle until input ends
//! and each in-flight task holds another, so `Closed` means "input ended and
//! every accepted image has produced its outcome".

use crate::server::streaming::state::SessionState;
use core::time::Duration;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use ocr_stream_core::types::OcrOutcome;
use std::sync::Arc;

/// Producer half, cloned into the reader and every task of a session.
#[derive(Clone, Debug)]
pub struct ResultQueue {
    tx: Sender<OcrOutcome>,
    state: Arc<SessionState>,
}

/// Consumer half, owned by the session's writer thread.
#[derive(Debug)]
pub struct ResultReceiver {
    rx: Receiver<OcrOutcome>,
    state: Arc<SessionState>,
}

/// What the writer got from one receive.
#[derive(Debug)]
pub enum Drained {
    /// The next outcome to write.
    Outcome(OcrOutcome),
    /// Nothing arrived within the poll interval.
    Idle,
    /// All producers are gone and nothing is left to write.
    Closed,
}

/// Creates the queue for one session.
pub fn result_queue(state: Arc<SessionState>) -> (ResultQueue, ResultReceiver) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (
        ResultQueue {
            tx,
            state: Arc::clone(&state),
        },
        ResultReceiver { rx, state },
    )
}

impl ResultQueue {
    /// Queues an outcome for the writer.
    ///
    /// Returns `false` if the outcome was discarded because the session has
    /// already failed (or its writer is gone).
    pub fn push(&self, outcome: OcrOutcome) -> bool {
        if self.state.is_write_failed() {
            self.state.record_discard();
            return false;
        }

        if self.tx.send(outcome).is_err() {
            self.state.record_discard();
            return false;
        }

        true
    }

    pub fn is_write_failed(&self) -> bool {
        self.state.is_write_failed()
    }

    /// Records an outcome dropped without being pushed.
    pub fn discard(&self) {
        self.state.record_discard();
    }
}

impl ResultReceiver {
    /// Waits up to `poll` for the next outcome.
    pub fn recv(&self, poll: Duration) -> Drained {
        match self.rx.recv_timeout(poll) {
            Ok(outcome) => Drained::Outcome(outcome),
            Err(RecvTimeoutError::Timeout) => Drained::Idle,
            Err(RecvTimeoutError::Disconnected) => Drained::Closed,
        }
    }

    pub fn is_write_failed(&self) -> bool {
        self.state.is_write_failed()
    }

    /// Marks the session failed. Returns `true` for the call that flipped it.
    pub fn fail(&self) -> bool {
        self.state.fail()
    }

    /// Counts an outcome taken off the queue but never written.
    pub fn discard(&self) {
        self.state.record_discard();
    }
}
