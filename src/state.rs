//! The lifecycle state machine and the two hand-rolled synchronization
//! primitives `VideoSource` shares between the decoder worker and the
//! calling thread: an atomic state cell and a manual-reset "playback gate".

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Condvar, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    NotStarted,
    Initialising,
    Restarting,
    Running,
    Paused,
    Muted,
    Terminating,
    Ended,
    Error,
}

impl StreamState {
    /// `ENDED` and `ERROR` are absorbing until an external `restart`/`start`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ended | Self::Error)
    }

    fn to_u8(self) -> u8 {
        match self {
            Self::NotStarted => 0,
            Self::Initialising => 1,
            Self::Restarting => 2,
            Self::Running => 3,
            Self::Paused => 4,
            Self::Muted => 5,
            Self::Terminating => 6,
            Self::Ended => 7,
            Self::Error => 8,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::NotStarted,
            1 => Self::Initialising,
            2 => Self::Restarting,
            3 => Self::Running,
            4 => Self::Paused,
            5 => Self::Muted,
            6 => Self::Terminating,
            7 => Self::Ended,
            _ => Self::Error,
        }
    }
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::NotStarted => "NOT_STARTED",
            Self::Initialising => "INITIALISING",
            Self::Restarting => "RESTARTING",
            Self::Running => "RUNNING",
            Self::Paused => "PAUSED",
            Self::Muted => "MUTED",
            Self::Terminating => "TERMINATING",
            Self::Ended => "ENDED",
            Self::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// `state` is written only under the source's `state_change_lock` but read
/// without locking by the decoder worker, so it lives behind an atomic
/// rather than the lock itself (per the no-locking-on-the-hot-path rule).
pub struct AtomicStreamState(AtomicU8);

impl AtomicStreamState {
    pub fn new(initial: StreamState) -> Self {
        Self(AtomicU8::new(initial.to_u8()))
    }

    pub fn load(&self) -> StreamState {
        StreamState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, state: StreamState) {
        self.0.store(state.to_u8(), Ordering::Release);
    }
}

/// A manual-reset event: `set()` leaves it open until `clear()`d. The
/// decoder worker calls `wait()` once per loop iteration; during `PAUSED`
/// the gate is clear and the worker blocks there.
pub struct PlaybackGate {
    open: Mutex<bool>,
    condvar: Condvar,
}

impl PlaybackGate {
    pub fn new(initially_open: bool) -> Self {
        Self {
            open: Mutex::new(initially_open),
            condvar: Condvar::new(),
        }
    }

    pub fn set(&self) {
        let mut open = self.open.lock().unwrap();
        *open = true;
        self.condvar.notify_all();
    }

    pub fn clear(&self) {
        let mut open = self.open.lock().unwrap();
        *open = false;
    }

    /// Blocks until the gate is open.
    pub fn wait(&self) {
        let guard = self.open.lock().unwrap();
        let _guard = self
            .condvar
            .wait_while(guard, |open| !*open)
            .unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn atomic_state_round_trips_every_variant() {
        let cell = AtomicStreamState::new(StreamState::NotStarted);
        for state in [
            StreamState::NotStarted,
            StreamState::Initialising,
            StreamState::Restarting,
            StreamState::Running,
            StreamState::Paused,
            StreamState::Muted,
            StreamState::Terminating,
            StreamState::Ended,
            StreamState::Error,
        ] {
            cell.store(state);
            assert_eq!(cell.load(), state);
        }
    }

    #[test]
    fn ended_and_error_are_terminal() {
        assert!(StreamState::Ended.is_terminal());
        assert!(StreamState::Error.is_terminal());
        assert!(!StreamState::Running.is_terminal());
    }

    #[test]
    fn gate_blocks_until_set() {
        let gate = Arc::new(PlaybackGate::new(false));
        let waiter = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || gate.wait())
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!waiter.is_finished());
        gate.set();
        waiter.join().unwrap();
    }
}
