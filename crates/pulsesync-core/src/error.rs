//! Error types for PulseSync.
//!
//! This module provides a unified error type for all PulseSync operations.
//! Note that the session protocol itself has no fatal errors: unreachable
//! peers, failed sends and malformed inbound messages are logged and
//! otherwise ignored. These variants surface at the edges (sockets,
//! configuration, a closed session task).

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// A specialized `Result` type for PulseSync operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for PulseSync.
#[derive(Error, Debug)]
pub enum Error {
    /// Peer could not be reached at send time
    #[error("peer {0} is not reachable")]
    PeerUnreachable(SocketAddr),

    /// Send was attempted but the transport refused it
    #[error("failed to send message: {0}")]
    SendFailed(String),

    /// The transport has been shut down
    #[error("transport closed")]
    TransportClosed,

    /// The session task is no longer running
    #[error("session task is no longer running")]
    SessionClosed,

    /// Invalid protocol message
    #[error("invalid protocol message: {0}")]
    ProtocolError(String),

    /// Datagram exceeded the maximum size
    #[error("datagram too large: {0} bytes")]
    DatagramTooLarge(usize),

    /// Configuration file error
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Invalid configuration value
    #[error("invalid configuration value for '{key}': {reason}")]
    InvalidConfig {
        /// Configuration key
        key: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Heart-rate source error
    #[error("heart-rate source error: {0}")]
    SensorError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Returns whether this error is transient (a later send may succeed).
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::PeerUnreachable(_) | Self::SendFailed(_))
    }

    /// Returns a helpful suggestion for resolving the error, if applicable.
    #[must_use]
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::PeerUnreachable(_) => Some(
                "Make sure the other device is running 'pulsesync run' on the same network\n\
                 and that the configured peer address and port match.",
            ),
            Self::ConfigError(_) | Self::InvalidConfig { .. } => Some(
                "Inspect your configuration with:\n\
                   pulsesync config show\n\
                 Or restore the defaults with:\n\
                   pulsesync config reset",
            ),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
