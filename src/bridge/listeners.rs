//! Per-channel listener registry and inbound dispatch.
//!
//! The registry lives on the scheduler task and is never shared, so it
//! needs no locking. Subscribers own their listeners; the registry only
//! keeps weak references and forgets listeners once they are dropped.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};

use futures::FutureExt;
use serenity::async_trait;
use tracing::warn;

use crate::common::messages::{BotIdentity, ChannelId, InboundMessage};

/// Callback invoked for every inbound message on a subscribed channel.
#[async_trait]
pub trait Listener: Send + Sync {
    async fn handle(&self, message: &InboundMessage) -> anyhow::Result<()>;
}

#[async_trait]
impl<F> Listener for F
where
    F: Fn(&InboundMessage) -> anyhow::Result<()> + Send + Sync,
{
    async fn handle(&self, message: &InboundMessage) -> anyhow::Result<()> {
        self(message)
    }
}

/// Wrap a plain closure as a shareable listener.
pub fn listener_fn<F>(f: F) -> Arc<dyn Listener>
where
    F: Fn(&InboundMessage) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A listener that failed during dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerFailure {
    /// Position of the listener in the channel's dispatch order.
    pub index: usize,
    pub reason: String,
}

/// Outcome of dispatching one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failures: Vec<ListenerFailure>,
}

impl DispatchReport {
    pub fn invoked(&self) -> usize {
        self.delivered + self.failures.len()
    }

    /// Log every failure. Failures never propagate past this point.
    pub fn log(&self, message: &InboundMessage) {
        for failure in &self.failures {
            warn!(
                channel_id = message.channel_id,
                message_id = message.message_id,
                listener = failure.index,
                "Listener failed: {}",
                failure.reason
            );
        }
    }
}

/// Ordered listeners keyed by channel.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: HashMap<ChannelId, Vec<Weak<dyn Listener>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `listener` to each channel's list. Duplicates are kept.
    pub fn subscribe(&mut self, channels: &[ChannelId], listener: &Arc<dyn Listener>) {
        for channel in channels {
            self.listeners
                .entry(*channel)
                .or_default()
                .push(Arc::downgrade(listener));
        }
    }

    /// Number of live listeners on a channel.
    pub fn listener_count(&self, channel: ChannelId) -> usize {
        self.listeners
            .get(&channel)
            .map(|list| list.iter().filter(|l| l.strong_count() > 0).count())
            .unwrap_or(0)
    }

    /// Invoke every live listener of the message's channel in registration
    /// order. Each invocation is isolated: errors and panics are recorded in
    /// the report and the remaining listeners still run.
    pub async fn dispatch(&mut self, message: &InboundMessage) -> DispatchReport {
        let mut report = DispatchReport::default();

        let Some(entries) = self.listeners.get_mut(&message.channel_id) else {
            return report;
        };

        entries.retain(|listener| listener.strong_count() > 0);
        let live: Vec<Arc<dyn Listener>> = entries.iter().filter_map(Weak::upgrade).collect();

        for (index, listener) in live.iter().enumerate() {
            match AssertUnwindSafe(listener.handle(message)).catch_unwind().await {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(error)) => report.failures.push(ListenerFailure {
                    index,
                    reason: format!("{:#}", error),
                }),
                Err(panic) => report.failures.push(ListenerFailure {
                    index,
                    reason: format!("panicked: {}", panic_message(panic.as_ref())),
                }),
            }
        }

        report
    }
}

/// Whether an inbound message should reach listeners at all.
///
/// Messages written by the bridge's own account are dropped so our own
/// sends never loop back into the game.
pub fn should_dispatch(message: &InboundMessage, identity: Option<&BotIdentity>) -> bool {
    if message.is_self {
        return false;
    }
    !matches!(identity, Some(me) if me.user_id == message.author_id)
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use anyhow::anyhow;

    use super::*;

    fn message(channel_id: ChannelId, content: &str) -> InboundMessage {
        InboundMessage {
            channel_id,
            author_id: 7,
            author_name: "alice".to_string(),
            content: content.to_string(),
            message_id: 1,
            is_self: false,
        }
    }

    fn recorder(log: &Arc<Mutex<Vec<String>>>, name: &'static str) -> Arc<dyn Listener> {
        let log = log.clone();
        listener_fn(move |m: &InboundMessage| {
            log.lock().unwrap().push(format!("{}:{}", name, m.content));
            Ok(())
        })
    }

    struct AsyncRecorder {
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Listener for AsyncRecorder {
        async fn handle(&self, message: &InboundMessage) -> anyhow::Result<()> {
            tokio::task::yield_now().await;
            self.log.lock().unwrap().push(format!("async:{}", message.content));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_dispatch_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = recorder(&log, "A");
        let b = recorder(&log, "B");
        let mut registry = ListenerRegistry::new();
        registry.subscribe(&[42], &a);
        registry.subscribe(&[42], &b);

        let report = registry.dispatch(&message(42, "hi")).await;

        assert_eq!(report.delivered, 2);
        assert_eq!(*log.lock().unwrap(), vec!["A:hi", "B:hi"]);
    }

    #[tokio::test]
    async fn test_unknown_channel_is_noop() {
        let mut registry = ListenerRegistry::new();
        let report = registry.dispatch(&message(99, "hi")).await;
        assert_eq!(report, DispatchReport::default());
    }

    #[tokio::test]
    async fn test_duplicate_registration_dispatches_twice() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = recorder(&log, "A");
        let mut registry = ListenerRegistry::new();
        registry.subscribe(&[1], &a);
        registry.subscribe(&[1], &a);

        registry.dispatch(&message(1, "x")).await;
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_one_listener_many_channels() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = recorder(&log, "A");
        let mut registry = ListenerRegistry::new();
        registry.subscribe(&[1, 2], &a);

        registry.dispatch(&message(1, "one")).await;
        registry.dispatch(&message(2, "two")).await;
        registry.dispatch(&message(3, "three")).await;
        assert_eq!(*log.lock().unwrap(), vec!["A:one", "A:two"]);
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let failing = listener_fn(|_: &InboundMessage| Err(anyhow!("boom")));
        let panicking = listener_fn(|_: &InboundMessage| panic!("listener exploded"));
        let last = recorder(&log, "C");
        let mut registry = ListenerRegistry::new();
        registry.subscribe(&[5], &failing);
        registry.subscribe(&[5], &panicking);
        registry.subscribe(&[5], &last);

        let report = registry.dispatch(&message(5, "hi")).await;

        assert_eq!(report.delivered, 1);
        assert_eq!(report.invoked(), 3);
        assert_eq!(report.failures[0].index, 0);
        assert_eq!(report.failures[0].reason, "boom");
        assert_eq!(report.failures[1].index, 1);
        assert!(report.failures[1].reason.contains("listener exploded"));
        assert_eq!(*log.lock().unwrap(), vec!["C:hi"]);
    }

    #[tokio::test]
    async fn test_dropped_listener_is_skipped() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = recorder(&log, "A");
        let b = recorder(&log, "B");
        let c = recorder(&log, "C");
        let mut registry = ListenerRegistry::new();
        registry.subscribe(&[1], &a);
        registry.subscribe(&[1], &b);
        registry.subscribe(&[1], &c);
        drop(b);

        assert_eq!(registry.listener_count(1), 2);
        registry.dispatch(&message(1, "x")).await;
        assert_eq!(*log.lock().unwrap(), vec!["A:x", "C:x"]);
    }

    #[test]
    fn test_async_listener_is_awaited() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let listener: Arc<dyn Listener> = Arc::new(AsyncRecorder { log: log.clone() });
        let mut registry = ListenerRegistry::new();
        registry.subscribe(&[3], &listener);

        let report = tokio_test::block_on(registry.dispatch(&message(3, "later")));

        assert_eq!(report.delivered, 1);
        assert_eq!(*log.lock().unwrap(), vec!["async:later"]);
    }

    #[test]
    fn test_should_dispatch_filters_own_messages() {
        let me = BotIdentity {
            user_id: 7,
            name: "conduit".to_string(),
        };
        let mut msg = message(1, "x");

        assert!(should_dispatch(&msg, None));
        assert!(!should_dispatch(&msg, Some(&me)));

        msg.author_id = 8;
        assert!(should_dispatch(&msg, Some(&me)));

        msg.is_self = true;
        assert!(!should_dispatch(&msg, None));
    }
}
