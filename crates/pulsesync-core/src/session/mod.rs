//! Session state machine and its owning task.
//!
//! A session is two values per device: whether it is running and how much
//! time has elapsed. Both devices converge on the same values by exchanging
//! best-effort `start` / `end` / `sync` messages.
//!
//! ## Architecture
//!
//! ```text
//!  user actions ──┐
//!  tick task ─────┼──> mpsc<SessionCommand> ──> SessionRunner ──> watch<SessionSnapshot>
//!  transport rx ──┘                               │
//!                                                 └─> SessionSyncController ──> MessageTransport
//! ```
//!
//! [`SessionSyncController`] is the pure state machine. [`SessionRunner`] owns
//! it and applies every command in arrival order, so no locks guard session
//! state. [`SessionHandle`] is the cloneable front door.
//!
//! ## State machine
//!
//! | from      | event              | to                                |
//! |-----------|--------------------|-----------------------------------|
//! | any       | local start        | running, elapsed 0, ticking       |
//! | running   | tick               | running, elapsed = base + since   |
//! | any       | local end          | idle, elapsed 0                   |
//! | any       | peer `start`       | running, elapsed = payload or kept|
//! | any       | peer `end`         | idle, elapsed kept                |
//! | any       | peer `sync`        | flag kept, elapsed = payload      |

use std::time::Duration;

use serde::{Deserialize, Serialize};

mod controller;
mod runner;

pub use controller::SessionSyncController;
pub use runner::{SessionCommand, SessionHandle, SessionRunner};

/// Per-device session values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Whether the session is running
    pub is_running: bool,
    /// Elapsed session time
    pub elapsed_time: Duration,
}

/// Immutable view of the session published to observers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Whether the session is running
    pub is_running: bool,
    /// Elapsed session time
    pub elapsed_time: Duration,
    /// Whether this device's tick loop is driving the elapsed time
    pub tick_armed: bool,
}

/// Counters kept by a session over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Messages handed to the transport
    pub messages_sent: u64,
    /// Messages not sent because the peer was unreachable
    pub messages_dropped: u64,
    /// Messages the transport refused
    pub send_failures: u64,
    /// Messages received from the peer
    pub messages_received: u64,
    /// Received messages that were unknown or malformed
    pub messages_ignored: u64,
    /// Ticks applied to the elapsed time
    pub ticks: u64,
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use crate::error::{Error, Result};
    use crate::protocol::{self, MessageMap, SessionMessage};
    use crate::transport::MessageTransport;

    /// Transport that records what it is asked to send.
    #[derive(Debug, Clone)]
    pub struct RecordingTransport {
        reachable: Arc<AtomicBool>,
        failing: Arc<AtomicBool>,
        sent: Arc<Mutex<Vec<MessageMap>>>,
    }

    impl RecordingTransport {
        pub fn new() -> Self {
            Self {
                reachable: Arc::new(AtomicBool::new(true)),
                failing: Arc::new(AtomicBool::new(false)),
                sent: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn unreachable() -> Self {
            let transport = Self::new();
            transport.set_reachable(false);
            transport
        }

        pub fn set_reachable(&self, reachable: bool) {
            self.reachable.store(reachable, Ordering::SeqCst);
        }

        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        pub fn sent(&self) -> Vec<SessionMessage> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|m| protocol::decode_message(m).unwrap())
                .collect()
        }

        pub fn send_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    impl MessageTransport for RecordingTransport {
        fn is_reachable(&self) -> bool {
            self.reachable.load(Ordering::SeqCst)
        }

        fn send(&self, message: &MessageMap) -> Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(Error::SendFailed("simulated failure".to_string()));
            }
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }
}
