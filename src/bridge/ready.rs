//! One-shot signal for the first successful connection.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use crate::common::messages::BotIdentity;

/// Set once by the scheduler, read from any thread.
#[derive(Clone, Default)]
pub struct ReadyEvent {
    inner: Arc<(Mutex<Option<BotIdentity>>, Condvar)>,
}

impl ReadyEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the identity. Only the first call has an effect.
    pub fn set(&self, identity: BotIdentity) -> bool {
        let (slot, signal) = &*self.inner;
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_some() {
            return false;
        }
        *guard = Some(identity);
        signal.notify_all();
        true
    }

    pub fn get(&self) -> Option<BotIdentity> {
        let (slot, _) = &*self.inner;
        slot.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn is_set(&self) -> bool {
        self.get().is_some()
    }

    /// Block until set or until `timeout` elapses.
    pub fn wait(&self, timeout: Duration) -> Option<BotIdentity> {
        let (slot, signal) = &*self.inner;
        let guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = signal
            .wait_timeout_while(guard, timeout, |identity| identity.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        guard.clone()
    }
}
