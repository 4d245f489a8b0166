//! In-memory network client for tests.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::anyhow;
use serenity::async_trait;
use tokio::sync::{mpsc, watch};

use crate::bridge::client::NetworkClient;
use crate::common::error::{BridgeError, BridgeResult};
use crate::common::messages::{
    BotIdentity, ChannelId, InboundMessage, MessageId, NetworkEvent, OutboundContent, SentMessage,
};

pub(crate) const BOT_USER_ID: u64 = 1000;

pub(crate) struct FakeClient {
    events: Mutex<Option<mpsc::UnboundedSender<NetworkEvent>>>,
    fail_run: Option<String>,
    close_delay: Duration,
    closed: watch::Sender<bool>,
    close_calls: AtomicUsize,
    next_id: AtomicU64,
    sent: Mutex<Vec<(SentMessage, OutboundContent)>>,
}

impl FakeClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::build(None, Duration::ZERO))
    }

    /// A client whose connection fails right after it starts.
    pub fn failing(reason: &str) -> Arc<Self> {
        Arc::new(Self::build(Some(reason.to_string()), Duration::ZERO))
    }

    /// A failing client that takes `delay` to close, keeping the teardown
    /// observable.
    pub fn failing_with_slow_close(reason: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self::build(Some(reason.to_string()), delay))
    }

    fn build(fail_run: Option<String>, close_delay: Duration) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            events: Mutex::new(None),
            fail_run,
            close_delay,
            closed,
            close_calls: AtomicUsize::new(0),
            next_id: AtomicU64::new(100),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Push an event as if it came off the wire.
    pub fn emit(&self, event: NetworkEvent) -> bool {
        match self.events.lock().unwrap().as_ref() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    pub fn emit_message(&self, message: InboundMessage) -> bool {
        self.emit(NetworkEvent::Message(message))
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<(SentMessage, OutboundContent)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NetworkClient for FakeClient {
    async fn run(&self, events: mpsc::UnboundedSender<NetworkEvent>) -> anyhow::Result<()> {
        if let Some(ref reason) = self.fail_run {
            return Err(anyhow!("{}", reason));
        }

        *self.events.lock().unwrap() = Some(events);
        self.emit(NetworkEvent::Ready(BotIdentity {
            user_id: BOT_USER_ID,
            name: "conduit".to_string(),
        }));

        let mut closed = self.closed.subscribe();
        let _ = closed.wait_for(|closed| *closed).await;
        Ok(())
    }

    async fn send(&self, channel_id: ChannelId, content: OutboundContent) -> BridgeResult<SentMessage> {
        if channel_id == 0 {
            return Err(BridgeError::ChannelUnavailable { channel_id });
        }
        let sent = SentMessage {
            channel_id,
            message_id: self.next_id.fetch_add(1, Ordering::SeqCst),
        };
        self.sent.lock().unwrap().push((sent, content));
        Ok(sent)
    }

    async fn edit(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        content: OutboundContent,
    ) -> BridgeResult<SentMessage> {
        let mut sent = self.sent.lock().unwrap();
        let known = sent
            .iter()
            .any(|(s, _)| s.channel_id == channel_id && s.message_id == message_id);
        if !known {
            return Err(BridgeError::MessageNotFound {
                channel_id,
                message_id,
            });
        }
        let edited = SentMessage {
            channel_id,
            message_id,
        };
        sent.push((edited, content));
        Ok(edited)
    }

    async fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if !self.close_delay.is_zero() {
            tokio::time::sleep(self.close_delay).await;
        }
        self.closed.send_replace(true);
    }
}

pub(crate) fn inbound(channel_id: ChannelId, author_id: u64, content: &str) -> InboundMessage {
    InboundMessage {
        channel_id,
        author_id,
        author_name: format!("user{}", author_id),
        content: content.to_string(),
        message_id: 1,
        is_self: false,
    }
}

/// Poll `condition` until it holds or two seconds pass.
pub(crate) fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
