//! # PulseSync Core Library
//!
//! `pulsesync-core` keeps a heart-rate monitoring session timer consistent
//! between two paired devices (for example a phone and a watch).
//!
//! ## Features
//!
//! - **Session sync**: `start` / `end` / `sync` messages keep both devices'
//!   running flag and elapsed time aligned
//! - **Best effort**: messages are fire-and-forget; a dropped message only
//!   causes drift until the next `sync`
//! - **Single owner**: all state mutations are serialized through one task
//! - **Pluggable transports**: UDP on the local network, or an in-memory pair
//!
//! ## Modules
//!
//! - [`config`] - Configuration management
//! - [`heart_rate`] - Heart-rate samples, sources and rolling statistics
//! - [`protocol`] - Session message wire format
//! - [`session`] - Session state machine and its owning task
//! - [`transport`] - Peer messaging transports
//!
//! ## Example
//!
//! ```rust,ignore
//! use pulsesync_core::config::Config;
//! use pulsesync_core::session::{SessionRunner, SessionSyncController};
//! use pulsesync_core::transport::MemoryTransport;
//!
//! let config = Config::load()?;
//! let (local, _remote) = MemoryTransport::pair();
//! let controller = SessionSyncController::new(local.transport);
//! let (runner, handle) = SessionRunner::new(controller, &config.session);
//! handle.attach_inbound(local.inbound);
//! tokio::spawn(runner.run());
//!
//! handle.start_session().await?;
//! println!("running: {}", handle.snapshot().await?.is_running);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]

pub mod config;
pub mod error;
pub mod heart_rate;
pub mod protocol;
pub mod session;
pub mod transport;

pub use error::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol identifier carried in every datagram
pub const PROTOCOL_NAME: &str = "pulsesync";

/// Protocol version carried in every datagram
pub const PROTOCOL_VERSION: &str = "1.0";

/// Default UDP port for peer messaging
pub const DEFAULT_PORT: u16 = 52640;

/// Default interval between local ticks while a session runs
pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 1;

/// Default interval between presence announcements
pub const DEFAULT_PRESENCE_INTERVAL_SECS: u64 = 2;

/// Default time after which a silent peer is considered unreachable
pub const DEFAULT_REACHABILITY_TIMEOUT_SECS: u64 = 6;

/// Default capacity of the session command queue
pub const DEFAULT_COMMAND_QUEUE: usize = 64;
