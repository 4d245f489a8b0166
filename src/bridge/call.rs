//! Cross-thread request/response hand-off.
//!
//! A caller thread creates a [`PendingCall`] and the matching [`CallSlot`],
//! ships the slot to the scheduler inside a [`Job`] and blocks on the
//! pending half. The slot is fulfilled at most once; if it is dropped
//! unfulfilled (the job was cancelled or never ran) the caller sees
//! `Cancelled` instead of hanging.

use std::future::Future;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::debug;

use crate::bridge::client::NetworkClient;
use crate::common::error::{BridgeError, BridgeResult};

/// A unit of work executed on the scheduler.
pub(crate) type Job = Box<dyn FnOnce(Arc<dyn NetworkClient>) -> BoxFuture<'static, ()> + Send>;

/// Caller half: waits for the result.
pub struct PendingCall<T> {
    rx: Receiver<BridgeResult<T>>,
}

/// Scheduler half: receives the result.
pub struct CallSlot<T> {
    tx: SyncSender<BridgeResult<T>>,
}

/// Create a connected slot/pending pair.
pub fn pending_call<T>() -> (CallSlot<T>, PendingCall<T>) {
    let (tx, rx) = mpsc::sync_channel(1);
    (CallSlot { tx }, PendingCall { rx })
}

impl<T> CallSlot<T> {
    /// Deliver the result. A caller that stopped waiting is ignored.
    pub fn fulfil(self, result: BridgeResult<T>) {
        if self.tx.try_send(result).is_err() {
            debug!("Caller stopped waiting before the result arrived");
        }
    }
}

impl<T> PendingCall<T> {
    /// Block until the result arrives, the call is cancelled, or `timeout`
    /// elapses. A timeout abandons the wait only; the work keeps running.
    pub fn wait(self, timeout: Option<Duration>) -> BridgeResult<T> {
        match timeout {
            None => self.rx.recv().unwrap_or(Err(BridgeError::Cancelled)),
            Some(timeout) => match self.rx.recv_timeout(timeout) {
                Ok(result) => result,
                Err(RecvTimeoutError::Timeout) => Err(BridgeError::TimedOut {
                    millis: timeout.as_millis(),
                }),
                Err(RecvTimeoutError::Disconnected) => Err(BridgeError::Cancelled),
            },
        }
    }
}

/// Package an operation and its result slot as a scheduler job.
pub(crate) fn job<T, F, Fut>(operation: F, slot: CallSlot<T>) -> Job
where
    T: Send + 'static,
    F: FnOnce(Arc<dyn NetworkClient>) -> Fut + Send + 'static,
    Fut: Future<Output = BridgeResult<T>> + Send + 'static,
{
    Box::new(move |client: Arc<dyn NetworkClient>| {
        async move {
            let result = operation(client).await;
            slot.fulfil(result);
        }
        .boxed()
    })
}
