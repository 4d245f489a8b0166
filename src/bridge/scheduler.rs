//! The dedicated scheduler thread.
//!
//! One OS thread per bridge runs a current-thread tokio runtime. Everything
//! that touches the network client, the listener registry or the bot
//! identity happens here, so none of it is locked.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::runtime::Builder;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, trace, warn};

use crate::bridge::channels::{SchedulerCommand, SchedulerInbox};
use crate::bridge::client::NetworkClient;
use crate::bridge::listeners::{panic_message, should_dispatch, ListenerRegistry};
use crate::bridge::ready::ReadyEvent;
use crate::bridge::state::{LifecycleState, SharedState};
use crate::common::messages::{BotIdentity, InboundMessage, NetworkEvent};
use crate::discord::commands::{CommandContext, CommandProcessor};
use crate::discord::style::EmbedStyle;

/// Bound on waiting for the client to close during unwind.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Grace period for the runtime to reap leftover tasks on exit.
const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

/// Everything the scheduler thread owns.
pub(crate) struct Scheduler {
    pub client: Arc<dyn NetworkClient>,
    pub inbox: SchedulerInbox,
    pub ready: ReadyEvent,
    pub processor: Option<Arc<dyn CommandProcessor>>,
    pub style: Arc<EmbedStyle>,
    pub shared: Arc<SharedState>,
}

impl Scheduler {
    /// Body of the scheduler thread. Returns once the loop has unwound.
    pub fn run_thread(self) {
        self.shared.register_scheduler_thread();
        let shared = self.shared.clone();

        let runtime = match Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => runtime,
            Err(e) => {
                error!("Failed to build scheduler runtime: {}", e);
                shared.set(LifecycleState::Stopped);
                return;
            }
        };

        runtime.block_on(self.run());
        runtime.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);

        shared.set(LifecycleState::Stopped);
        info!("Scheduler thread exited");
    }

    async fn run(self) {
        let Scheduler {
            client,
            inbox,
            ready,
            processor,
            style,
            shared,
        } = self;
        let SchedulerInbox {
            mut commands_rx,
            mut shutdown_rx,
        } = inbox;

        let (events_tx, mut events_rx) = mpsc::unbounded_channel::<NetworkEvent>();
        let mut connection = {
            let client = client.clone();
            tokio::spawn(async move { client.run(events_tx).await })
        };
        let mut connection_active = true;
        let mut events_open = true;

        let mut tasks: JoinSet<()> = JoinSet::new();
        let mut registry = ListenerRegistry::new();
        let mut identity: Option<BotIdentity> = None;

        info!("Scheduler running");

        loop {
            tokio::select! {
                biased;

                // Stop request
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Stop requested, unwinding scheduler");
                        break;
                    }
                }

                // Connection task ended on its own
                result = &mut connection, if connection_active => {
                    connection_active = false;
                    match result {
                        Ok(Ok(())) => warn!("Network client finished without a stop request"),
                        Ok(Err(e)) => error!("Network client failed: {:#}", e),
                        Err(e) => error!("Network client task panicked: {}", e),
                    }
                    if shared
                        .transition(LifecycleState::Running, LifecycleState::Stopping)
                        .is_ok()
                    {
                        warn!("Tearing bridge down after connection loss");
                    }
                    break;
                }

                // Calls and subscriptions from other threads
                command = commands_rx.recv() => {
                    match command {
                        Some(SchedulerCommand::Call(job)) => {
                            tasks.spawn(job(client.clone()));
                        }
                        Some(SchedulerCommand::Subscribe { channels, listener }) => {
                            registry.subscribe(&channels, &listener);
                            debug!(?channels, "Listener subscribed");
                        }
                        None => {
                            debug!("Command queue closed");
                            break;
                        }
                    }
                }

                // Network events
                event = events_rx.recv(), if events_open => {
                    match event {
                        Some(NetworkEvent::Ready(me)) => {
                            info!("Connected as {} ({})", me.name, me.user_id);
                            ready.set(me.clone());
                            identity = Some(me);
                        }
                        Some(NetworkEvent::Message(message)) => {
                            if !should_dispatch(&message, identity.as_ref()) {
                                trace!(message_id = message.message_id, "Ignoring own message");
                                continue;
                            }

                            // Listeners may park; a stop request still wins.
                            let report = tokio::select! {
                                biased;
                                _ = stop_requested(&mut shutdown_rx) => {
                                    info!(
                                        message_id = message.message_id,
                                        "Stop requested during listener dispatch, unwinding scheduler"
                                    );
                                    break;
                                }
                                report = registry.dispatch(&message) => report,
                            };
                            report.log(&message);

                            if let Some(ref processor) = processor {
                                let context = CommandContext {
                                    client: client.clone(),
                                    style: style.clone(),
                                };
                                tasks.spawn(process_command(processor.clone(), context, message));
                            }
                        }
                        Some(NetworkEvent::Disconnected) => {
                            warn!("Connection lost; waiting for the client to reconnect");
                        }
                        None => {
                            debug!("Network event stream closed");
                            events_open = false;
                        }
                    }
                }

                // Reap finished operations
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            error!("Scheduled operation panicked: {}", e);
                        }
                    }
                }
            }
        }

        unwind(client, tasks, connection, connection_active, commands_rx).await;
    }
}

/// Resolves once a stop has been requested or every bridge handle is gone.
async fn stop_requested(shutdown_rx: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown_rx.borrow_and_update() {
            return;
        }
        if shutdown_rx.changed().await.is_err() {
            return;
        }
    }
}

/// Run the command collaborator, containing any failure.
async fn process_command(
    processor: Arc<dyn CommandProcessor>,
    context: CommandContext,
    message: InboundMessage,
) {
    match AssertUnwindSafe(processor.process(&context, &message))
        .catch_unwind()
        .await
    {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(
            channel_id = message.channel_id,
            "Command processing failed: {:#}", e
        ),
        Err(panic) => error!(
            channel_id = message.channel_id,
            "Command processor panicked: {}",
            panic_message(panic.as_ref())
        ),
    }
}

/// Close the connection, cancel outstanding work and drop queued calls.
///
/// Failures here are logged and never stop the sequence.
async fn unwind(
    client: Arc<dyn NetworkClient>,
    mut tasks: JoinSet<()>,
    connection: JoinHandle<anyhow::Result<()>>,
    connection_active: bool,
    mut commands_rx: mpsc::UnboundedReceiver<SchedulerCommand>,
) {
    info!("Closing network connection...");
    if tokio::time::timeout(CLOSE_TIMEOUT, client.close()).await.is_err() {
        warn!("Network client did not close within {:?}", CLOSE_TIMEOUT);
    }

    let pending = tasks.len();
    tasks.abort_all();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => {}
            Err(e) => warn!("Pending operation failed during shutdown: {}", e),
        }
    }

    if connection_active {
        connection.abort();
        match connection.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Network client ended with error during shutdown: {:#}", e),
            Err(e) if e.is_cancelled() => {}
            Err(e) => warn!("Network client task failed during shutdown: {}", e),
        }
    }

    // Queued but unstarted calls: dropping their slots cancels the callers.
    commands_rx.close();
    let mut dropped = 0usize;
    while let Ok(command) = commands_rx.try_recv() {
        drop(command);
        dropped += 1;
    }

    info!(pending, dropped, "Scheduler drained");
}
