//! Bridge handle used by game-side threads.
//!
//! A [`Bridge`] owns one scheduler thread and one network client. Game
//! threads talk to it only through blocking calls that are queued onto the
//! scheduler; nothing network-related ever runs on the caller's thread.

use std::future::Future;
use std::sync::mpsc::{self as std_mpsc, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::bridge::call::{job, pending_call};
use crate::bridge::channels::{scheduler_channels, SchedulerCommand, SchedulerInbox, SchedulerOutbox};
use crate::bridge::client::NetworkClient;
use crate::bridge::listeners::Listener;
use crate::bridge::ready::ReadyEvent;
use crate::bridge::scheduler::Scheduler;
use crate::bridge::state::{LifecycleState, SharedState};
use crate::common::error::{BridgeError, BridgeResult, ConfigError};
use crate::common::messages::{ChannelId, Embed, MessageId, OutboundContent, SentMessage};
use crate::config::types::Config;
use crate::discord::client::SerenityClient;
use crate::discord::commands::{BuiltinCommands, CommandProcessor, ServerRoster};
use crate::discord::style::EmbedStyle;

/// Construction-time settings of a bridge.
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    /// Used to name the scheduler thread.
    pub name: String,
    /// Command prefix handed to the command processor.
    pub prefix: String,
    pub style: EmbedStyle,
    /// Upper bound on joining the scheduler thread in `Drop`.
    pub stop_timeout: Duration,
    /// Wait applied by `send`, `send_embeds` and `edit`.
    pub call_timeout: Option<Duration>,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            name: "conduit".to_string(),
            prefix: "!".to_string(),
            style: EmbedStyle::default(),
            stop_timeout: Duration::from_secs(5),
            call_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl BridgeSettings {
    /// Derive settings from a loaded config and the host's command prefix.
    pub fn from_config(config: &Config, host_prefix: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            name: "conduit".to_string(),
            prefix: config.discord.effective_prefix(host_prefix),
            style: EmbedStyle::from_config(&config.discord.style)?,
            stop_timeout: Duration::from_secs(config.bridge.stop_timeout_secs),
            call_timeout: config.bridge.call_timeout_secs.map(Duration::from_secs),
        })
    }
}

/// How a `stop` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The scheduler unwound and its thread was joined.
    Stopped,
    /// The scheduler did not exit in time; its thread was detached.
    Abandoned,
    /// The bridge was not running. Nothing happened.
    NotRunning,
    /// Requested from the scheduler thread itself; it unwinds after the
    /// current handler returns.
    Signalled,
}

/// Things consumed by `start`.
struct Startup {
    inbox: SchedulerInbox,
    processor: Option<Arc<dyn CommandProcessor>>,
}

struct Worker {
    handle: JoinHandle<()>,
    /// Disconnects when the scheduler thread finishes.
    exited: std_mpsc::Receiver<()>,
}

/// Cross-thread handle to a Discord connection running on its own scheduler.
pub struct Bridge {
    settings: BridgeSettings,
    client: Arc<dyn NetworkClient>,
    style: Arc<EmbedStyle>,
    shared: Arc<SharedState>,
    outbox: SchedulerOutbox,
    ready: ReadyEvent,
    startup: Mutex<Option<Startup>>,
    worker: Mutex<Option<Worker>>,
}

impl Bridge {
    pub fn new(settings: BridgeSettings, client: Arc<dyn NetworkClient>) -> Self {
        let (outbox, inbox) = scheduler_channels();
        let style = Arc::new(settings.style.clone());

        Self {
            settings,
            client,
            style,
            shared: Arc::new(SharedState::new()),
            outbox,
            ready: ReadyEvent::new(),
            startup: Mutex::new(Some(Startup {
                inbox,
                processor: None,
            })),
            worker: Mutex::new(None),
        }
    }

    /// A Discord-backed bridge answering the builtin commands.
    ///
    /// `roster` feeds the `online` command; without one it reports no
    /// servers.
    pub fn from_config(
        config: &Config,
        host_prefix: &str,
        roster: Option<Arc<dyn ServerRoster>>,
    ) -> anyhow::Result<Self> {
        let settings = BridgeSettings::from_config(config, host_prefix)?;
        let client = Arc::new(SerenityClient::new(&config.discord)?);

        let mut commands = BuiltinCommands::new(settings.prefix.clone());
        if let Some(roster) = roster {
            commands = commands.with_roster(roster);
        }

        Ok(Self::new(settings, client).with_command_processor(Arc::new(commands)))
    }

    /// Run `processor` on every dispatched message. Only honoured before
    /// `start`.
    pub fn with_command_processor(mut self, processor: Arc<dyn CommandProcessor>) -> Self {
        match self
            .startup
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
        {
            Some(startup) => startup.processor = Some(processor),
            None => warn!("Command processor ignored: bridge already started"),
        }
        self
    }

    pub fn settings(&self) -> &BridgeSettings {
        &self.settings
    }

    pub fn style(&self) -> &EmbedStyle {
        &self.style
    }

    pub fn state(&self) -> LifecycleState {
        self.shared.get()
    }

    /// Signalled once the first connection is authenticated.
    pub fn ready(&self) -> &ReadyEvent {
        &self.ready
    }

    /// Spawn the scheduler thread and connect. Returns immediately.
    pub fn start(&self) -> BridgeResult<()> {
        self.shared
            .transition(LifecycleState::NotStarted, LifecycleState::Running)
            .map_err(|_| BridgeError::AlreadyStarted)?;

        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        let startup = self
            .startup
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(startup) = startup else {
            return Err(BridgeError::AlreadyStarted);
        };

        let scheduler = Scheduler {
            client: self.client.clone(),
            inbox: startup.inbox,
            ready: self.ready.clone(),
            processor: startup.processor,
            style: self.style.clone(),
            shared: self.shared.clone(),
        };
        let (exit_tx, exited) = std_mpsc::channel::<()>();

        let spawned = thread::Builder::new()
            .name(format!("{}-scheduler", self.settings.name))
            .spawn(move || {
                let _exit = exit_tx;
                scheduler.run_thread();
            });

        match spawned {
            Ok(handle) => {
                *worker = Some(Worker { handle, exited });
                info!("Bridge '{}' started", self.settings.name);
                Ok(())
            }
            Err(e) => {
                error!("Failed to spawn scheduler thread: {}", e);
                self.shared.set(LifecycleState::Stopped);
                Err(BridgeError::network(format!(
                    "failed to spawn scheduler thread: {}",
                    e
                )))
            }
        }
    }

    /// Unwind the scheduler and wait up to `timeout` for its thread.
    ///
    /// The bridge ends `Stopped` whatever the outcome; it cannot be
    /// restarted.
    pub fn stop(&self, timeout: Duration) -> StopOutcome {
        if let Err(current) = self
            .shared
            .transition(LifecycleState::Running, LifecycleState::Stopping)
        {
            debug!("Stop ignored: bridge is {}", current);
            // A self-initiated teardown may still be unwinding.
            let wait = if current == LifecycleState::Stopping {
                timeout
            } else {
                Duration::ZERO
            };
            self.reap(wait);
            return StopOutcome::NotRunning;
        }

        info!("Stopping bridge '{}'...", self.settings.name);
        self.outbox.shutdown_tx.send_replace(true);

        if self.shared.on_scheduler_thread() {
            debug!("Stop requested from the scheduler thread; not joining");
            return StopOutcome::Signalled;
        }

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let outcome = match worker {
            None => StopOutcome::Stopped,
            Some(worker) => match worker.exited.recv_timeout(timeout) {
                Err(RecvTimeoutError::Timeout) => {
                    warn!(
                        "Scheduler did not exit within {:?}; abandoning its thread",
                        timeout
                    );
                    StopOutcome::Abandoned
                }
                _ => {
                    if worker.handle.join().is_err() {
                        error!("Scheduler thread panicked");
                    }
                    StopOutcome::Stopped
                }
            },
        };

        self.shared.set(LifecycleState::Stopped);
        info!("Bridge '{}' stopped ({:?})", self.settings.name, outcome);
        outcome
    }

    /// Join the scheduler thread if it exits within `wait`.
    fn reap(&self, wait: Duration) {
        if self.shared.on_scheduler_thread() {
            return;
        }
        let mut guard = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        let finished = matches!(
            guard.as_ref().map(|w| w.exited.recv_timeout(wait)),
            Some(Err(RecvTimeoutError::Disconnected))
        );
        if finished {
            if let Some(worker) = guard.take() {
                if worker.handle.join().is_err() {
                    error!("Scheduler thread panicked");
                }
            }
        }
    }

    /// Run `operation` on the scheduler and block until its result.
    ///
    /// `timeout` bounds the wait only: an operation still in flight when it
    /// expires runs to completion and its result is discarded.
    pub fn call_blocking<T, F, Fut>(&self, operation: F, timeout: Option<Duration>) -> BridgeResult<T>
    where
        T: Send + 'static,
        F: FnOnce(Arc<dyn NetworkClient>) -> Fut + Send + 'static,
        Fut: Future<Output = BridgeResult<T>> + Send + 'static,
    {
        if self.shared.on_scheduler_thread() {
            return Err(BridgeError::ReentrantCall);
        }
        if self.shared.get() != LifecycleState::Running {
            return Err(BridgeError::BridgeNotRunning);
        }

        let (slot, pending) = pending_call();
        self.outbox
            .commands_tx
            .send(SchedulerCommand::Call(job(operation, slot)))
            .map_err(|_| BridgeError::BridgeNotRunning)?;

        pending.wait(timeout)
    }

    /// Post text, wrapped in a styled embed when `styled` is set.
    pub fn send(
        &self,
        channel_id: ChannelId,
        content: impl Into<String>,
        styled: bool,
    ) -> BridgeResult<SentMessage> {
        let content = content.into();
        let body = if styled {
            OutboundContent::Embeds(vec![self.style.styled_text(content)])
        } else {
            OutboundContent::Text(content)
        };
        self.post(channel_id, body)
    }

    /// Post embeds with the configured style applied.
    pub fn send_embeds(&self, channel_id: ChannelId, embeds: Vec<Embed>) -> BridgeResult<SentMessage> {
        let embeds = embeds.into_iter().map(|e| self.style.apply(e)).collect();
        self.post(channel_id, OutboundContent::Embeds(embeds))
    }

    /// Replace a message previously sent by the bridge. Embeds are styled.
    pub fn edit(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        content: OutboundContent,
    ) -> BridgeResult<SentMessage> {
        let content = self.styled(content);
        self.call_blocking(
            move |client| async move { client.edit(channel_id, message_id, content).await },
            self.settings.call_timeout,
        )
    }

    fn post(&self, channel_id: ChannelId, content: OutboundContent) -> BridgeResult<SentMessage> {
        self.call_blocking(
            move |client| async move { client.send(channel_id, content).await },
            self.settings.call_timeout,
        )
    }

    fn styled(&self, content: OutboundContent) -> OutboundContent {
        match content {
            OutboundContent::Embeds(embeds) => {
                OutboundContent::Embeds(embeds.into_iter().map(|e| self.style.apply(e)).collect())
            }
            text => text,
        }
    }

    /// Register `listener` on each channel.
    ///
    /// Queued behind earlier calls and applied on the scheduler; never
    /// blocks. Allowed before `start`. The bridge only holds a weak
    /// reference, so the caller keeps the listener alive.
    pub fn subscribe(&self, channels: &[ChannelId], listener: Arc<dyn Listener>) -> BridgeResult<()> {
        match self.shared.get() {
            LifecycleState::NotStarted | LifecycleState::Running => {}
            state => {
                warn!(?channels, "Subscription dropped: bridge is {}", state);
                return Err(BridgeError::BridgeNotRunning);
            }
        }

        self.outbox
            .commands_tx
            .send(SchedulerCommand::Subscribe {
                channels: channels.to_vec(),
                listener,
            })
            .map_err(|_| BridgeError::BridgeNotRunning)
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        if self.shared.get() == LifecycleState::Running {
            let outcome = self.stop(self.settings.stop_timeout);
            debug!("Bridge dropped while running: {:?}", outcome);
        }
    }
}
