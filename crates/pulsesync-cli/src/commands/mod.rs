//! CLI command definitions and handlers.

use std::net::SocketAddr;

use clap::{Parser, Subcommand};

pub mod config;
pub mod run;

/// Load configuration with graceful fallback to defaults.
///
/// This function should be used by all commands to load the user's configuration.
/// If the config file doesn't exist or can't be parsed, it falls back to defaults.
pub fn load_config() -> pulsesync_core::config::Config {
    pulsesync_core::config::Config::load().unwrap_or_else(|e| {
        tracing::warn!("Using default configuration: {}", e);
        pulsesync_core::config::Config::default()
    })
}

/// PulseSync - keep a heart-rate session timer in step between two devices
#[derive(Parser)]
#[command(name = "pulsesync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Detailed logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand)]
pub enum Command {
    /// Run a session and keep it in sync with the paired device
    Run(RunArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for the run command
#[derive(Parser)]
pub struct RunArgs {
    /// Address of the paired device (overrides network.peer)
    #[arg(short, long, env = "PULSESYNC_PEER")]
    pub peer: Option<SocketAddr>,

    /// Local UDP port (overrides network.port)
    #[arg(long)]
    pub port: Option<u16>,

    /// Device name announced to the peer
    #[arg(long)]
    pub name: Option<String>,

    /// Pair with a simulated device in this process instead of the network
    #[arg(long, conflicts_with_all = ["peer", "port"])]
    pub loopback: bool,

    /// Start a session immediately
    #[arg(long)]
    pub start: bool,

    /// Don't collect heart-rate samples
    #[arg(long)]
    pub no_heart_rate: bool,

    /// Minimal output
    #[arg(short, long)]
    pub quiet: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the config command
#[derive(Parser)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a configuration value
    Get {
        /// Configuration key (e.g. network.peer)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,

        /// Value to set
        value: String,
    },

    /// Show all configuration
    Show,

    /// Show the configuration file path
    Path,

    /// Reset to defaults
    Reset,
}
