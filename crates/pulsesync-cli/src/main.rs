//! PulseSync CLI - keep a heart-rate session timer in step between two devices
//!
//! One device starts a session, the paired device follows along: both show
//! the same running flag and elapsed time while heart-rate readings are
//! collected locally.
//!
//! ## Quick Start
//!
//! ```bash
//! # Try it without a second device
//! pulsesync run --loopback
//!
//! # Pair with another machine on the local network
//! pulsesync run --peer 192.168.1.20:52640
//! ```

#![allow(clippy::doc_markdown)]
#![allow(clippy::uninlined_format_args)]

use anyhow::Result;
use clap::Parser;

mod commands;
pub mod ui;

use commands::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Run(args) => commands::run::run(args).await,
        Command::Config(args) => commands::config::run(args),
    };

    if let Err(e) = &result {
        if let Some(suggestion) = e
            .downcast_ref::<pulsesync_core::Error>()
            .and_then(pulsesync_core::Error::suggestion)
        {
            eprintln!("\n{}\n", suggestion);
        }
    }

    result
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default_filter = if verbose {
        "warn,pulsesync=debug,pulsesync_core=debug"
    } else {
        "warn,pulsesync=info,pulsesync_core=info"
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
