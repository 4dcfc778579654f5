//! In-process transport pair.
//!
//! Two [`MemoryEndpoint`]s are linked back to back: whatever one side sends
//! shows up on the other side's inbound stream. Each side carries its own
//! reachability flag so tests can simulate the peer going out of range.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};

use super::{Inbound, MessageTransport};
use crate::error::{Error, Result};
use crate::protocol::MessageMap;

/// Default inbound queue capacity for each side of a pair.
const DEFAULT_CAPACITY: usize = 64;

/// Sending half of an in-memory link.
///
/// Cloning shares the reachability flag and counters, so a test can keep a
/// handle while the session owns another.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    outbound: mpsc::Sender<MessageMap>,
    reachable: Arc<AtomicBool>,
    sent: Arc<AtomicU64>,
}

/// One side of an in-memory link.
#[derive(Debug)]
pub struct MemoryEndpoint {
    /// Sends to the other side
    pub transport: MemoryTransport,
    /// Receives what the other side sends
    pub inbound: Inbound,
}

impl MemoryTransport {
    /// Create two linked endpoints with the default queue capacity.
    #[must_use]
    pub fn pair() -> (MemoryEndpoint, MemoryEndpoint) {
        Self::pair_with_capacity(DEFAULT_CAPACITY)
    }

    /// Create two linked endpoints with a specific queue capacity.
    #[must_use]
    pub fn pair_with_capacity(capacity: usize) -> (MemoryEndpoint, MemoryEndpoint) {
        let (a_tx, a_rx) = mpsc::channel(capacity);
        let (b_tx, b_rx) = mpsc::channel(capacity);

        let a = MemoryEndpoint {
            transport: Self::new(b_tx),
            inbound: a_rx,
        };
        let b = MemoryEndpoint {
            transport: Self::new(a_tx),
            inbound: b_rx,
        };
        (a, b)
    }

    fn new(outbound: mpsc::Sender<MessageMap>) -> Self {
        Self {
            outbound,
            reachable: Arc::new(AtomicBool::new(true)),
            sent: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Mark the peer as reachable or not.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Number of messages handed to the link so far.
    #[must_use]
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::SeqCst)
    }
}

impl MessageTransport for MemoryTransport {
    fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst) && !self.outbound.is_closed()
    }

    fn send(&self, message: &MessageMap) -> Result<()> {
        match self.outbound.try_send(message.clone()) {
            Ok(()) => {
                self.sent.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(Error::SendFailed("peer queue full".to_string())),
            Err(TrySendError::Closed(_)) => Err(Error::TransportClosed),
        }
    }
}
