//! Config command implementation.

use anyhow::{bail, Context, Result};
use pulsesync_core::config::{format_duration, parse_duration, Config};

use super::{ConfigAction, ConfigArgs};

/// Every key understood by `config get` and `config set`.
const KEYS: &[&str] = &[
    "general.device_name",
    "general.device_id",
    "network.port",
    "network.peer",
    "network.presence_interval",
    "network.reachability_timeout",
    "session.tick_interval",
    "session.command_queue",
    "heart_rate.enabled",
    "heart_rate.sample_interval",
    "heart_rate.baseline_bpm",
];

/// Run the config command.
pub fn run(args: ConfigArgs) -> Result<()> {
    match args.action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            match get_config_value(&config, &key) {
                Some(v) => println!("{}: {}", key, v),
                None => print_unknown_key(&key),
            }
        }

        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            if set_config_value(&mut config, &key, &value)? {
                config.validate()?;
                config.save()?;
                println!("Set {} = {}", key, value);
            } else {
                print_unknown_key(&key);
            }
        }

        ConfigAction::Show => {
            let config = Config::load()?;
            print_config(&config);
        }

        ConfigAction::Path => {
            println!("{}", Config::config_path().display());
        }

        ConfigAction::Reset => {
            let config = Config::default();
            config.save()?;
            println!("Configuration reset to defaults.");
        }
    }

    Ok(())
}

fn print_unknown_key(key: &str) {
    println!("Unknown configuration key: {}", key);
    println!("Known keys: {}", KEYS.join(", "));
}

fn print_config(config: &Config) {
    println!();
    println!("PulseSync Configuration");
    println!("{}", "─".repeat(50));
    println!();
    println!("[general]");
    println!("  device_name = \"{}\"", config.general.device_name);
    println!("  device_id = \"{}\"", config.general.device_id);
    println!();
    println!("[network]");
    println!("  port = {}", config.network.port);
    match config.network.peer {
        Some(peer) => println!("  peer = \"{}\"", peer),
        None => println!("  # peer = \"<address>:<port>\""),
    }
    println!(
        "  presence_interval = \"{}\"",
        format_duration(config.network.presence_interval)
    );
    println!(
        "  reachability_timeout = \"{}\"",
        format_duration(config.network.reachability_timeout)
    );
    println!();
    println!("[session]");
    println!(
        "  tick_interval = \"{}\"",
        format_duration(config.session.tick_interval)
    );
    println!("  command_queue = {}", config.session.command_queue);
    println!();
    println!("[heart_rate]");
    println!("  enabled = {}", config.heart_rate.enabled);
    println!(
        "  sample_interval = \"{}\"",
        format_duration(config.heart_rate.sample_interval)
    );
    println!("  baseline_bpm = {}", config.heart_rate.baseline_bpm);
    println!();
}

fn get_config_value(config: &Config, key: &str) -> Option<String> {
    match key {
        "general.device_name" => Some(config.general.device_name.clone()),
        "general.device_id" => Some(config.general.device_id.to_string()),
        "network.port" => Some(config.network.port.to_string()),
        "network.peer" => Some(
            config
                .network
                .peer
                .map_or_else(|| "(not set)".to_string(), |p| p.to_string()),
        ),
        "network.presence_interval" => Some(format_duration(config.network.presence_interval)),
        "network.reachability_timeout" => {
            Some(format_duration(config.network.reachability_timeout))
        }
        "session.tick_interval" => Some(format_duration(config.session.tick_interval)),
        "session.command_queue" => Some(config.session.command_queue.to_string()),
        "heart_rate.enabled" => Some(config.heart_rate.enabled.to_string()),
        "heart_rate.sample_interval" => Some(format_duration(config.heart_rate.sample_interval)),
        "heart_rate.baseline_bpm" => Some(config.heart_rate.baseline_bpm.to_string()),
        _ => None,
    }
}

fn set_config_value(config: &mut Config, key: &str, value: &str) -> Result<bool> {
    match key {
        "general.device_name" => config.general.device_name = value.to_string(),
        "general.device_id" => {
            config.general.device_id = value.parse().context("expected a UUID")?;
        }
        "network.port" => config.network.port = value.parse().context("expected a port number")?,
        "network.peer" => {
            config.network.peer = match value {
                "" | "none" => None,
                addr => Some(addr.parse().context("expected <address>:<port>")?),
            };
        }
        "network.presence_interval" => config.network.presence_interval = duration(value)?,
        "network.reachability_timeout" => config.network.reachability_timeout = duration(value)?,
        "session.tick_interval" => config.session.tick_interval = duration(value)?,
        "session.command_queue" => {
            config.session.command_queue = value.parse().context("expected a number")?;
        }
        "heart_rate.enabled" => {
            config.heart_rate.enabled = value.parse().context("expected true or false")?;
        }
        "heart_rate.sample_interval" => config.heart_rate.sample_interval = duration(value)?,
        "heart_rate.baseline_bpm" => {
            config.heart_rate.baseline_bpm = value.parse().context("expected a number")?;
        }
        _ => return Ok(false),
    }
    Ok(true)
}

fn duration(value: &str) -> Result<std::time::Duration> {
    match parse_duration(value) {
        Some(d) => Ok(d),
        None => bail!("invalid duration '{}' (use e.g. 500ms, 2s, 1m)", value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_key_is_readable() {
        let config = Config::default();
        for key in KEYS {
            assert!(get_config_value(&config, key).is_some(), "missing getter for {key}");
        }
        assert!(get_config_value(&config, "network.nope").is_none());
    }

    #[test]
    fn test_set_and_get_roundtrip() {
        let mut config = Config::default();

        assert!(set_config_value(&mut config, "network.peer", "10.1.2.3:52640").unwrap());
        assert!(set_config_value(&mut config, "session.tick_interval", "500ms").unwrap());
        assert!(set_config_value(&mut config, "heart_rate.enabled", "false").unwrap());

        assert_eq!(
            get_config_value(&config, "network.peer").as_deref(),
            Some("10.1.2.3:52640")
        );
        assert_eq!(
            get_config_value(&config, "session.tick_interval").as_deref(),
            Some("500ms")
        );
        assert!(!config.heart_rate.enabled);
    }

    #[test]
    fn test_clear_peer() {
        let mut config = Config::default();
        set_config_value(&mut config, "network.peer", "10.1.2.3:52640").unwrap();
        set_config_value(&mut config, "network.peer", "none").unwrap();
        assert!(config.network.peer.is_none());
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let mut config = Config::default();
        assert!(set_config_value(&mut config, "network.port", "huge").is_err());
        assert!(set_config_value(&mut config, "session.tick_interval", "often").is_err());
        assert!(set_config_value(&mut config, "general.device_id", "abc").is_err());
    }

    #[test]
    fn test_set_unknown_key() {
        let mut config = Config::default();
        assert!(!set_config_value(&mut config, "session.colour", "red").unwrap());
    }

    #[test]
    fn test_saved_value_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        set_config_value(&mut config, "general.device_name", "Wrist").unwrap();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(
            get_config_value(&loaded, "general.device_name").as_deref(),
            Some("Wrist")
        );
    }
}
