//! Common test utilities for `PulseSync` integration tests.
//!
//! This module provides shared functionality for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU16, Ordering};

use pulsesync_core::config::SessionConfig;
use pulsesync_core::protocol::MessageMap;
use pulsesync_core::session::{SessionHandle, SessionRunner, SessionStats, SessionSyncController};
use pulsesync_core::transport::{MemoryEndpoint, MemoryTransport};
use tokio::task::JoinHandle;

/// Base port for tests, incremented for each test to avoid conflicts.
static TEST_PORT_COUNTER: AtomicU16 = AtomicU16::new(52700);

/// A device taking part in a test session.
pub struct Peer {
    /// Drives the device's session
    pub handle: SessionHandle,
    /// Shares the reachability flag with the session's transport
    pub transport: MemoryTransport,
    /// The runner task, yielding stats on shutdown
    pub runner: JoinHandle<SessionStats>,
}

impl Peer {
    /// Shut the session down and collect its stats.
    pub async fn finish(self) -> SessionStats {
        self.handle.shutdown().await.expect("shutdown");
        self.runner.await.expect("runner task")
    }
}

/// Start a session on one side of an in-memory link.
pub fn spawn_peer(endpoint: MemoryEndpoint) -> Peer {
    let transport = endpoint.transport.clone();
    let controller = SessionSyncController::new(endpoint.transport);
    let (runner, handle) = SessionRunner::new(controller, &SessionConfig::default());
    handle.attach_inbound(endpoint.inbound);

    Peer {
        handle,
        transport,
        runner: tokio::spawn(runner.run()),
    }
}

/// Two sessions linked back to back: (phone, watch).
pub fn linked_peers() -> (Peer, Peer) {
    let (phone, watch) = MemoryTransport::pair();
    (spawn_peer(phone), spawn_peer(watch))
}

/// Build a message map from a JSON object literal.
pub fn message(value: serde_json::Value) -> MessageMap {
    value.as_object().cloned().expect("JSON object")
}

/// Create a temporary directory for test files.
///
/// The directory will be automatically cleaned up when the returned
/// `TempDir` is dropped.
pub fn create_temp_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

/// Get unique ports for a test to avoid conflicts between parallel tests.
/// Returns (`first_port`, `second_port`).
pub fn get_test_ports() -> (u16, u16) {
    let base = TEST_PORT_COUNTER.fetch_add(2, Ordering::SeqCst);
    (base, base + 1)
}
