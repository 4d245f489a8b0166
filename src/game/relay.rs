//! Chat relay between a game server and its Discord bridge channel.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use crate::bridge::listeners::{listener_fn, Listener};
use crate::bridge::orchestrator::Bridge;
use crate::common::error::BridgeResult;
use crate::common::messages::{ChannelId, InboundMessage, SentMessage};
use crate::config::types::RelayConfig;
use crate::game::filter::MessageFilter;
use crate::game::formatter::{format_discord_line, format_game_event, resolve_emojis, GameEvent};

/// Where relayed lines end up on the game side.
pub trait GameSink: Send + Sync {
    /// Show `line` to every player on the server.
    fn broadcast(&self, line: &str);
}

pub struct ChatRelay {
    server_name: String,
    bridge_channel: ChannelId,
    filter: MessageFilter,
    sink: Arc<dyn GameSink>,
    /// The bridge only holds a weak reference to it.
    listener: Mutex<Option<Arc<dyn Listener>>>,
}

impl ChatRelay {
    pub fn new(config: &RelayConfig, sink: Arc<dyn GameSink>) -> Self {
        Self {
            server_name: config.server_name.clone(),
            bridge_channel: config.bridge_channel,
            filter: MessageFilter::new(&config.message_filter),
            sink,
            listener: Mutex::new(None),
        }
    }

    /// Whether lines are mirrored to Discord at all.
    pub fn discord_enabled(&self) -> bool {
        self.bridge_channel != 0
    }

    /// Start relaying the bridge channel into the game.
    pub fn attach(&self, bridge: &Bridge) -> BridgeResult<()> {
        if !self.discord_enabled() {
            debug!("Chat relay has no bridge channel; Discord relay disabled");
            return Ok(());
        }

        let filter = self.filter.clone();
        let sink = self.sink.clone();
        let listener = listener_fn(move |message: &InboundMessage| {
            deliver(&filter, sink.as_ref(), message);
            Ok(())
        });

        bridge.subscribe(&[self.bridge_channel], listener.clone())?;
        *self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(listener);

        info!(
            "Relaying chat of '{}' with channel {}",
            self.server_name, self.bridge_channel
        );
        Ok(())
    }

    /// Broadcast a Discord message in game. Returns the line shown, if any.
    pub fn relay_inbound(&self, message: &InboundMessage) -> Option<String> {
        deliver(&self.filter, self.sink.as_ref(), message)
    }

    /// Mirror a game event to the bridge channel.
    ///
    /// Returns `Ok(None)` when the line was filtered or Discord relay is
    /// disabled. Send failures are logged and returned.
    pub fn on_game_event(&self, bridge: &Bridge, event: &GameEvent) -> BridgeResult<Option<SentMessage>> {
        let line = format_game_event(&self.server_name, event);

        if self.filter.should_filter(&line) {
            info!("FILTERED Game -> Discord: {}", line);
            return Ok(None);
        }
        if !self.discord_enabled() {
            return Ok(None);
        }

        let line = resolve_emojis(&line);
        debug!("Game -> Discord: {}", line);

        match bridge.send(self.bridge_channel, line, false) {
            Ok(sent) => Ok(Some(sent)),
            Err(e) => {
                warn!(channel_id = self.bridge_channel, "Failed to relay game event: {}", e);
                Err(e)
            }
        }
    }
}

fn deliver(filter: &MessageFilter, sink: &dyn GameSink, message: &InboundMessage) -> Option<String> {
    let line = format_discord_line(message);

    if filter.should_filter(&line) {
        info!("FILTERED Discord -> Game: {}", line);
        return None;
    }

    debug!("Discord -> Game: {}", line);
    sink.broadcast(&line);
    Some(line)
}
