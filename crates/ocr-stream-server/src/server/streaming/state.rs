//! Per-session lifecycle.
//!
//! A session moves through
//!
//! ```text
//! NotStarted -> Reading -> Draining -> Closed        (OK)
//!      \            \          \
//!       `------------`----------`---> Failed         (ABORTED / CANCELLED)
//! ```
//!
//! `Failed` is terminal and doubles as the session's write-failed flag: once
//! set, the writer stops, tasks discard their outcomes and the reader stops
//! accepting images.

use crate::server::telemetry::increment_outcomes_discarded;
use portable_atomic::{AtomicU8, AtomicUsize, Ordering};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionPhase {
    NotStarted = 0,
    /// The read loop is accepting images.
    Reading = 1,
    /// Input ended; remaining outcomes are being written.
    Draining = 2,
    /// A write failed or cancellation was observed.
    Failed = 3,
    /// Every outcome was written.
    Closed = 4,
}

impl SessionPhase {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::NotStarted,
            1 => Self::Reading,
            2 => Self::Draining,
            3 => Self::Failed,
            _ => Self::Closed,
        }
    }
}

/// Shared, lock-free state of one session.
#[derive(Debug)]
pub struct SessionState {
    phase: AtomicU8,
    discarded: AtomicUsize,
}

impl SessionState {
    pub const fn new() -> Self {
        Self {
            phase: AtomicU8::new(SessionPhase::NotStarted as u8),
            discarded: AtomicUsize::new(0),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        SessionPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub fn is_write_failed(&self) -> bool {
        self.phase() == SessionPhase::Failed
    }

    /// `NotStarted -> Reading`.
    pub fn start_reading(&self) -> bool {
        self.transition(SessionPhase::NotStarted, SessionPhase::Reading)
    }

    /// `Reading -> Draining`. No effect once the session has failed.
    pub fn finish_reading(&self) -> bool {
        self.transition(SessionPhase::Reading, SessionPhase::Draining)
    }

    /// `Draining -> Closed`.
    pub fn close(&self) -> bool {
        self.transition(SessionPhase::Draining, SessionPhase::Closed)
    }

    /// Moves any live phase to `Failed`. Returns `true` only for the call that
    /// performed the transition.
    pub fn fail(&self) -> bool {
        self.phase
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                match SessionPhase::from_u8(raw) {
                    SessionPhase::Failed | SessionPhase::Closed => None,
                    _ => Some(SessionPhase::Failed as u8),
                }
            })
            .is_ok()
    }

    /// Counts an outcome that was produced but never written, and exports it
    /// right away.
    pub fn record_discard(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
        increment_outcomes_discarded();
    }

    pub fn discarded(&self) -> usize {
        self.discarded.load(Ordering::Relaxed)
    }

    fn transition(&self, from: SessionPhase, to: SessionPhase) -> bool {
        self.phase
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graceful_path() {
        let state = SessionState::new();
        assert_eq!(state.phase(), SessionPhase::NotStarted);
        assert!(state.start_reading());
        assert!(state.finish_reading());
        assert!(!state.is_write_failed());
        assert!(state.close());
        assert_eq!(state.phase(), SessionPhase::Closed);
    }

    #[test]
    fn failure_is_terminal_and_flips_once() {
        let state = SessionState::new();
        state.start_reading();
        assert!(state.fail());
        assert!(!state.fail());
        assert!(state.is_write_failed());

        // Neither the reader nor the writer can leave `Failed`.
        assert!(!state.finish_reading());
        assert!(!state.close());
        assert_eq!(state.phase(), SessionPhase::Failed);
    }

    #[test]
    fn failure_while_draining() {
        let state = SessionState::new();
        state.start_reading();
        state.finish_reading();
        assert!(state.fail());
        assert_eq!(state.phase(), SessionPhase::Failed);
    }

    #[test]
    fn closed_sessions_cannot_fail() {
        let state = SessionState::new();
        state.start_reading();
        state.finish_reading();
        state.close();
        assert!(!state.fail());
        assert_eq!(state.phase(), SessionPhase::Closed);
    }
}
