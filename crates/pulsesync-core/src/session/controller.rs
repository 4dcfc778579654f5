//! The session state machine.
//!
//! [`SessionSyncController`] never spawns or sleeps. It records whether its
//! tick loop should be armed (and under which generation) and leaves running
//! the timer to its owner, see [`super::SessionRunner`].

use std::time::Duration;

use tokio::time::Instant;

use super::{SessionSnapshot, SessionState, SessionStats};
use crate::protocol::{self, MessageMap, SessionMessage};
use crate::transport::MessageTransport;

/// An armed tick loop.
///
/// Elapsed time is `base` plus the time since `armed_at`.
#[derive(Debug, Clone, Copy)]
struct TickArm {
    generation: u64,
    base: Duration,
    armed_at: Instant,
}

impl TickArm {
    fn elapsed(&self) -> Duration {
        self.base
            .saturating_add(Instant::now().saturating_duration_since(self.armed_at))
    }
}

/// Keeps one device's session consistent with its peer.
///
/// Every operation mutates local state first and then tries to tell the peer.
/// Sends only happen while the transport reports the peer reachable; a refused
/// send is logged and otherwise has no effect.
#[derive(Debug)]
pub struct SessionSyncController<T> {
    transport: T,
    state: SessionState,
    arm: Option<TickArm>,
    next_generation: u64,
    stats: SessionStats,
}

impl<T: MessageTransport> SessionSyncController<T> {
    /// Create an idle controller sending through `transport`.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: SessionState::default(),
            arm: None,
            next_generation: 0,
            stats: SessionStats::default(),
        }
    }

    /// Current session values.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Current session values plus tick loop status.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            is_running: self.state.is_running,
            elapsed_time: self.state.elapsed_time,
            tick_armed: self.arm.is_some(),
        }
    }

    /// Counters collected so far.
    #[must_use]
    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Generation of the armed tick loop, if any.
    ///
    /// Changes every time the loop is re-armed, so an owner can tell when
    /// its timer must be restarted.
    #[must_use]
    pub fn tick_generation(&self) -> Option<u64> {
        self.arm.map(|arm| arm.generation)
    }

    /// The transport messages are sent through.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Start (or restart) a session from zero and tell the peer.
    pub fn start_session(&mut self) {
        self.state = SessionState {
            is_running: true,
            elapsed_time: Duration::ZERO,
        };
        self.arm_from(Duration::ZERO);
        tracing::info!("Session started");

        self.send(SessionMessage::Start {
            elapsed_time: Some(Duration::ZERO),
        });
    }

    /// Stop the session, reset elapsed time and tell the peer.
    pub fn end_session(&mut self) {
        let elapsed = self.state.elapsed_time;
        self.state = SessionState::default();
        self.disarm();
        tracing::info!("Session ended after {:?}", elapsed);

        self.send(SessionMessage::End);
    }

    /// Apply a tick from the loop armed under `generation`.
    ///
    /// Returns `false` for ticks from a loop that has since been disarmed or
    /// re-armed; those change nothing.
    pub fn on_tick(&mut self, generation: u64) -> bool {
        let Some(arm) = self.arm.filter(|arm| arm.generation == generation) else {
            tracing::debug!("Discarding stale tick from generation {}", generation);
            return false;
        };

        let elapsed = arm.elapsed();
        self.state.elapsed_time = elapsed;
        self.stats.ticks += 1;

        self.send(SessionMessage::Sync {
            elapsed_time: elapsed,
        });
        true
    }

    /// Apply a message received from the peer.
    ///
    /// Returns `false` if the message was unknown or malformed and therefore
    /// ignored.
    pub fn on_message_received(&mut self, message: &MessageMap) -> bool {
        self.stats.messages_received += 1;

        let message = match protocol::decode_message(message) {
            Ok(message) => message,
            Err(e) => {
                self.stats.messages_ignored += 1;
                tracing::debug!("Ignoring peer message: {}", e);
                return false;
            }
        };

        tracing::debug!("Peer message: {:?}", message);

        match message {
            SessionMessage::Start { elapsed_time } => {
                if !self.state.is_running {
                    tracing::info!("Session started by peer");
                }
                self.state.is_running = true;
                if let Some(elapsed) = elapsed_time {
                    self.adopt(elapsed);
                }
            }
            SessionMessage::End => {
                if self.state.is_running {
                    tracing::info!("Session ended by peer");
                }
                self.state.is_running = false;
                self.disarm();
            }
            SessionMessage::Sync { elapsed_time } => self.adopt(elapsed_time),
        }
        true
    }

    /// Re-arm the tick loop after the process was suspended.
    ///
    /// Does nothing unless the session is running. Sends nothing.
    pub fn resume_if_running(&mut self) {
        if !self.state.is_running {
            return;
        }

        self.arm_from(self.state.elapsed_time);
        tracing::debug!("Resumed tick loop at {:?}", self.state.elapsed_time);
    }

    fn adopt(&mut self, elapsed: Duration) {
        self.state.elapsed_time = elapsed;

        // Keep a local loop counting on from the peer's value.
        if let Some(arm) = self.arm.as_mut() {
            arm.base = elapsed;
            arm.armed_at = Instant::now();
        }
    }

    fn arm_from(&mut self, base: Duration) {
        self.next_generation += 1;
        self.arm = Some(TickArm {
            generation: self.next_generation,
            base,
            armed_at: Instant::now(),
        });
    }

    fn disarm(&mut self) {
        self.arm = None;
    }

    fn send(&mut self, message: SessionMessage) {
        if !self.transport.is_reachable() {
            self.stats.messages_dropped += 1;
            tracing::debug!("Peer unreachable, not sending {}", message.action());
            return;
        }

        match self.transport.send(&message.to_map()) {
            Ok(()) => self.stats.messages_sent += 1,
            Err(e) => {
                self.stats.send_failures += 1;
                tracing::warn!("Failed to send {} to peer: {}", message.action(), e);
            }
        }
    }
}
