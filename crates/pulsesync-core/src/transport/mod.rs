//! Peer messaging transports.
//!
//! The session core only needs three things from a transport: whether the
//! peer is currently reachable, a non-blocking best-effort send, and a stream
//! of inbound key-value messages. Delivery is at-most-once with no ordering
//! guarantee; the core never relies on either.
//!
//! Two implementations are provided:
//!
//! - [`UdpTransport`] - JSON datagrams to a fixed peer on the local network
//! - [`MemoryTransport`] - an in-process linked pair, for tests and demos

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::Result;
use crate::protocol::MessageMap;

mod memory;
mod udp;

pub use memory::{MemoryEndpoint, MemoryTransport};
pub use udp::{UdpTransport, UdpTransportConfig};

/// Stream of messages delivered by a transport, in arrival order.
pub type Inbound = mpsc::Receiver<MessageMap>;

/// Outbound half of a peer messaging channel.
pub trait MessageTransport: Send + Sync {
    /// Whether the peer is currently believed to be reachable.
    fn is_reachable(&self) -> bool;

    /// Hand a message to the transport without waiting for delivery.
    ///
    /// `Ok` only means the message left this process; it may still be lost.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport refused the message.
    fn send(&self, message: &MessageMap) -> Result<()>;
}

impl<T: MessageTransport + ?Sized> MessageTransport for Arc<T> {
    fn is_reachable(&self) -> bool {
        (**self).is_reachable()
    }

    fn send(&self, message: &MessageMap) -> Result<()> {
        (**self).send(message)
    }
}

impl<T: MessageTransport + ?Sized> MessageTransport for Box<T> {
    fn is_reachable(&self) -> bool {
        (**self).is_reachable()
    }

    fn send(&self, message: &MessageMap) -> Result<()> {
        (**self).send(message)
    }
}
