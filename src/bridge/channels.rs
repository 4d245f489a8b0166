//! Bridge channel management.
//!
//! The scheduler is fed by exactly two cross-thread channels: an unbounded
//! command queue (calls and subscriptions, FIFO) and a shutdown flag.
//! Unbounded senders never block, so game threads can enqueue while the
//! scheduler is parked on network I/O.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::bridge::call::Job;
use crate::bridge::listeners::Listener;
use crate::common::messages::ChannelId;

/// Work handed to the scheduler from other threads.
pub(crate) enum SchedulerCommand {
    /// Run an operation against the network client.
    Call(Job),
    /// Register a listener on each channel.
    Subscribe {
        channels: Vec<ChannelId>,
        listener: Arc<dyn Listener>,
    },
}

/// Receiving ends moved onto the scheduler thread at start.
pub(crate) struct SchedulerInbox {
    pub commands_rx: mpsc::UnboundedReceiver<SchedulerCommand>,
    pub shutdown_rx: watch::Receiver<bool>,
}

/// Sending ends kept by the bridge handle.
pub(crate) struct SchedulerOutbox {
    pub commands_tx: mpsc::UnboundedSender<SchedulerCommand>,
    pub shutdown_tx: watch::Sender<bool>,
}

/// Create the scheduler's channel pair.
pub(crate) fn scheduler_channels() -> (SchedulerOutbox, SchedulerInbox) {
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    (
        SchedulerOutbox {
            commands_tx,
            shutdown_tx,
        },
        SchedulerInbox {
            commands_rx,
            shutdown_rx,
        },
    )
}
