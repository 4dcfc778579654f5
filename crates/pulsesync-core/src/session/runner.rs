//! Single-owner task driving a [`SessionSyncController`].
//!
//! User actions, ticks and peer messages all become [`SessionCommand`]s on
//! one queue. The runner applies them one at a time, keeps the tick task in
//! step with the controller's armed generation and publishes a
//! [`SessionSnapshot`] after every change.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use super::{SessionSnapshot, SessionStats, SessionSyncController};
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::protocol::MessageMap;
use crate::transport::{Inbound, MessageTransport};

/// Work item for a [`SessionRunner`].
#[derive(Debug)]
pub enum SessionCommand {
    /// Start (or restart) the session locally
    Start,
    /// End the session locally
    End,
    /// Re-arm the tick loop if the session is running
    Resume,
    /// Message received from the peer
    Inbound(MessageMap),
    /// Tick from the loop armed under `generation`
    Tick {
        /// Arming generation that produced this tick
        generation: u64,
    },
    /// Reply with the current snapshot
    Snapshot(oneshot::Sender<SessionSnapshot>),
    /// Stop the runner
    Shutdown,
}

/// Owns the session state and applies commands in arrival order.
pub struct SessionRunner<T> {
    controller: SessionSyncController<T>,
    commands_rx: mpsc::Receiver<SessionCommand>,
    ticks_tx: mpsc::WeakSender<SessionCommand>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    tick_interval: Duration,
    tick_task: Option<(u64, JoinHandle<()>)>,
}

impl<T: MessageTransport> SessionRunner<T> {
    /// Create a runner and the handle used to drive it.
    ///
    /// The runner does nothing until [`SessionRunner::run`] is awaited or
    /// spawned. A zero `tick_interval` is replaced by the default.
    pub fn new(
        controller: SessionSyncController<T>,
        config: &SessionConfig,
    ) -> (Self, SessionHandle) {
        let (commands_tx, commands_rx) = mpsc::channel(config.command_queue.max(1));
        let (snapshot_tx, snapshot_rx) = watch::channel(controller.snapshot());

        let tick_interval = if config.tick_interval.is_zero() {
            tracing::warn!("Zero tick interval, using the default");
            Duration::from_secs(crate::DEFAULT_TICK_INTERVAL_SECS)
        } else {
            config.tick_interval
        };

        let runner = Self {
            controller,
            commands_rx,
            ticks_tx: commands_tx.downgrade(),
            snapshot_tx,
            tick_interval,
            tick_task: None,
        };
        let handle = SessionHandle {
            commands_tx,
            snapshot_rx,
        };
        (runner, handle)
    }

    /// Apply commands until shutdown is requested or every handle is gone.
    ///
    /// Returns the session counters.
    pub async fn run(mut self) -> SessionStats {
        tracing::debug!("Session runner started");

        while let Some(command) = self.commands_rx.recv().await {
            match command {
                SessionCommand::Start => self.controller.start_session(),
                SessionCommand::End => self.controller.end_session(),
                SessionCommand::Resume => self.controller.resume_if_running(),
                SessionCommand::Inbound(message) => {
                    self.controller.on_message_received(&message);
                }
                SessionCommand::Tick { generation } => {
                    self.controller.on_tick(generation);
                }
                SessionCommand::Snapshot(reply) => {
                    let _ = reply.send(self.controller.snapshot());
                }
                SessionCommand::Shutdown => {
                    tracing::debug!("Session runner shutdown requested");
                    break;
                }
            }

            self.sync_tick_task();
            self.publish();
        }

        self.stop_tick_task();

        let stats = self.controller.stats();
        tracing::info!(
            "Session runner stopped: sent {}, dropped {}, failed {}, received {} ({} ignored), {} ticks",
            stats.messages_sent,
            stats.messages_dropped,
            stats.send_failures,
            stats.messages_received,
            stats.messages_ignored,
            stats.ticks
        );
        stats
    }

    /// Restart, stop or keep the tick task to match the controller.
    fn sync_tick_task(&mut self) {
        let wanted = self.controller.tick_generation();
        let current = self.tick_task.as_ref().map(|(generation, _)| *generation);
        if wanted == current {
            return;
        }

        self.stop_tick_task();
        if let Some(generation) = wanted {
            self.tick_task = Some((generation, self.spawn_tick_task(generation)));
        }
    }

    fn spawn_tick_task(&self, generation: u64) -> JoinHandle<()> {
        let ticks_tx = self.ticks_tx.clone();
        let period = self.tick_interval;

        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                let Some(tx) = ticks_tx.upgrade() else {
                    break;
                };
                if tx.send(SessionCommand::Tick { generation }).await.is_err() {
                    break;
                }
            }
        })
    }

    fn stop_tick_task(&mut self) {
        if let Some((generation, task)) = self.tick_task.take() {
            tracing::debug!("Stopping tick loop generation {}", generation);
            task.abort();
        }
    }

    fn publish(&self) {
        let snapshot = self.controller.snapshot();
        self.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}

/// Cloneable front door to a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands_tx: mpsc::Sender<SessionCommand>,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    /// Start (or restart) the session from zero.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionClosed`] if the runner has stopped.
    pub async fn start_session(&self) -> Result<()> {
        self.post(SessionCommand::Start).await
    }

    /// End the session and reset the elapsed time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionClosed`] if the runner has stopped.
    pub async fn end_session(&self) -> Result<()> {
        self.post(SessionCommand::End).await
    }

    /// Re-arm the tick loop if the session is running.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionClosed`] if the runner has stopped.
    pub async fn resume_if_running(&self) -> Result<()> {
        self.post(SessionCommand::Resume).await
    }

    /// Hand a peer message to the session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionClosed`] if the runner has stopped.
    pub async fn deliver(&self, message: MessageMap) -> Result<()> {
        self.post(SessionCommand::Inbound(message)).await
    }

    /// Current snapshot, after every previously posted command was applied.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionClosed`] if the runner has stopped.
    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.post(SessionCommand::Snapshot(reply_tx)).await?;
        reply_rx.await.map_err(|_| Error::SessionClosed)
    }

    /// Observe snapshots as they change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Forward a transport's inbound stream into the session.
    ///
    /// The forwarder does not keep the session alive; it stops when either
    /// the stream or the runner ends.
    pub fn attach_inbound(&self, mut inbound: Inbound) -> JoinHandle<()> {
        let commands_tx = self.commands_tx.downgrade();

        tokio::spawn(async move {
            while let Some(message) = inbound.recv().await {
                let Some(tx) = commands_tx.upgrade() else {
                    break;
                };
                if tx.send(SessionCommand::Inbound(message)).await.is_err() {
                    break;
                }
            }
            tracing::debug!("Inbound forwarder ending");
        })
    }

    /// Ask the runner to stop.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionClosed`] if the runner has already stopped.
    pub async fn shutdown(&self) -> Result<()> {
        self.post(SessionCommand::Shutdown).await
    }

    /// Whether the runner has stopped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.commands_tx.is_closed()
    }

    async fn post(&self, command: SessionCommand) -> Result<()> {
        self.commands_tx
            .send(command)
            .await
            .map_err(|_| Error::SessionClosed)
    }
}
