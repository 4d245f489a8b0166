//! Bridge lifecycle state.
//!
//! The lifecycle moves strictly forward:
//! 1. `NotStarted` until `start()` spawns the scheduler thread
//! 2. `Running` while the scheduler serves calls and dispatches events
//! 3. `Stopping` once `stop()` is requested or the connection dies
//! 4. `Stopped` after the scheduler thread has exited or been abandoned
//!
//! The state is read on every call from arbitrary threads, so it lives in
//! an atomic rather than behind the scheduler.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;
use std::thread::{self, ThreadId};

/// Where a bridge is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LifecycleState {
    NotStarted = 0,
    Running = 1,
    Stopping = 2,
    Stopped = 3,
}

impl LifecycleState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::NotStarted,
            1 => Self::Running,
            2 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotStarted => "not started",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// State shared between the bridge handle and its scheduler thread.
#[derive(Debug)]
pub(crate) struct SharedState {
    state: AtomicU8,
    scheduler_thread: OnceLock<ThreadId>,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(LifecycleState::NotStarted as u8),
            scheduler_thread: OnceLock::new(),
        }
    }

    pub fn get(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move from `from` to `to`; returns the actual state on mismatch.
    pub fn transition(&self, from: LifecycleState, to: LifecycleState) -> Result<(), LifecycleState> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(LifecycleState::from_u8)
    }

    pub fn set(&self, to: LifecycleState) {
        self.state.store(to as u8, Ordering::Release);
    }

    /// Called from the scheduler thread before it runs anything.
    pub fn register_scheduler_thread(&self) {
        let _ = self.scheduler_thread.set(thread::current().id());
    }

    pub fn on_scheduler_thread(&self) -> bool {
        self.scheduler_thread.get() == Some(&thread::current().id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_are_checked() {
        let shared = SharedState::new();
        assert_eq!(shared.get(), LifecycleState::NotStarted);

        assert!(shared
            .transition(LifecycleState::NotStarted, LifecycleState::Running)
            .is_ok());
        assert_eq!(
            shared.transition(LifecycleState::NotStarted, LifecycleState::Running),
            Err(LifecycleState::Running)
        );

        shared.set(LifecycleState::Stopped);
        assert_eq!(shared.get(), LifecycleState::Stopped);
    }

    #[test]
    fn test_scheduler_thread_detection() {
        let shared = std::sync::Arc::new(SharedState::new());
        assert!(!shared.on_scheduler_thread());

        let remote = shared.clone();
        std::thread::spawn(move || {
            remote.register_scheduler_thread();
            assert!(remote.on_scheduler_thread());
        })
        .join()
        .unwrap();

        assert!(!shared.on_scheduler_thread());
    }

    #[test]
    fn test_display() {
        assert_eq!(LifecycleState::Stopping.to_string(), "stopping");
    }
}
