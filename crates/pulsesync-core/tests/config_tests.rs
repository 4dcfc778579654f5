//! Integration tests for configuration files on disk.

mod common;

use std::time::Duration;

use pulsesync_core::config::Config;
use pulsesync_core::Error;

#[test]
fn test_partial_file_fills_in_defaults() {
    let dir = common::create_temp_dir();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "[network]\npeer = \"192.168.0.7:52640\"\nreachability_timeout = \"10s\"\n",
    )
    .unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.network.reachability_timeout, Duration::from_secs(10));
    assert_eq!(config.network.presence_interval, Duration::from_secs(2));
    assert_eq!(config.session.command_queue, pulsesync_core::DEFAULT_COMMAND_QUEUE);
    assert!(config.heart_rate.enabled);
    config.validate().unwrap();
}

#[test]
fn test_malformed_file_is_config_error() {
    let dir = common::create_temp_dir();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[session]\ntick_interval = \"fast\"\n").unwrap();

    assert!(matches!(Config::load_from(&path), Err(Error::ConfigError(_))));
}

#[test]
fn test_loaded_file_can_fail_validation() {
    let dir = common::create_temp_dir();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "[network]\npresence_interval = \"5s\"\nreachability_timeout = \"3s\"\n",
    )
    .unwrap();

    let config = Config::load_from(&path).unwrap();
    match config.validate() {
        Err(Error::InvalidConfig { key, .. }) => assert_eq!(key, "network.reachability_timeout"),
        other => panic!("expected InvalidConfig, got {other:?}"),
    }
}
