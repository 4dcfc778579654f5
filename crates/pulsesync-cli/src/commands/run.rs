//! Run command: drive a session from the terminal.
//!
//! Commands are read from stdin one per line (`start`, `end`, `resume`,
//! `status`, `help`, `quit`). Every session change is printed as it happens.

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use pulsesync_core::config::Config;
use pulsesync_core::heart_rate::{
    HeartRateSample, HeartRateSource, HeartRateStats, SimulatedHeartRate,
};
use pulsesync_core::session::{
    SessionHandle, SessionRunner, SessionSnapshot, SessionStats, SessionSyncController,
};
use pulsesync_core::transport::{
    Inbound, MemoryTransport, MessageTransport, UdpTransport, UdpTransportConfig,
};

use super::{load_config, RunArgs};
use crate::ui::{self, DeviceBox};

/// A command typed on stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input {
    Start,
    End,
    Resume,
    Status,
    Help,
    Quit,
}

fn parse_input(line: &str) -> Option<Input> {
    match line.trim().to_ascii_lowercase().as_str() {
        "start" | "s" => Some(Input::Start),
        "end" | "stop" | "e" => Some(Input::End),
        "resume" | "r" => Some(Input::Resume),
        "status" | "st" => Some(Input::Status),
        "help" | "h" | "?" => Some(Input::Help),
        "quit" | "exit" | "q" => Some(Input::Quit),
        _ => None,
    }
}

/// Run the run command
pub async fn run(args: RunArgs) -> Result<()> {
    let mut config = load_config();

    if let Some(name) = &args.name {
        config.general.device_name.clone_from(name);
    }
    if let Some(port) = args.port {
        config.network.port = port;
    }
    if let Some(peer) = args.peer {
        config.network.peer = Some(peer);
    }
    if args.no_heart_rate {
        config.heart_rate.enabled = false;
    }
    config.validate()?;

    if args.loopback {
        run_loopback(&config, &args).await
    } else {
        run_udp(&config, &args).await
    }
}

async fn run_udp(config: &Config, args: &RunArgs) -> Result<()> {
    let transport_config = UdpTransportConfig::from_config(config).context(
        "No peer configured. Pass --peer or run 'pulsesync config set network.peer <address>:<port>'",
    )?;
    let peer_label = transport_config.peer.to_string();

    let (transport, inbound) = UdpTransport::bind(transport_config).await?;
    drive(transport, inbound, None, config, args, &peer_label).await
}

async fn run_loopback(config: &Config, args: &RunArgs) -> Result<()> {
    let (local, remote) = MemoryTransport::pair();

    let controller = SessionSyncController::new(remote.transport);
    let (runner, peer) = SessionRunner::new(controller, &config.session);
    peer.attach_inbound(remote.inbound);
    let peer_task = tokio::spawn(runner.run());

    drive(
        local.transport,
        local.inbound,
        Some(&peer),
        config,
        args,
        "simulated watch",
    )
    .await?;

    let _ = peer.shutdown().await;
    let _ = peer_task.await;
    Ok(())
}

#[allow(clippy::too_many_lines)]
async fn drive<T: MessageTransport + 'static>(
    transport: T,
    inbound: Inbound,
    peer: Option<&SessionHandle>,
    config: &Config,
    args: &RunArgs,
    peer_label: &str,
) -> Result<()> {
    let controller = SessionSyncController::new(transport);
    let (runner, handle) = SessionRunner::new(controller, &config.session);
    handle.attach_inbound(inbound);
    let runner_task = tokio::spawn(runner.run());

    if !args.quiet && !args.json {
        println!("\nPulseSync v{}", env!("CARGO_PKG_VERSION"));
        println!("─────────────────────────────────────");
        println!();
        DeviceBox::new(&config.general.device_name, peer_label).display();
        println!();
        print_help();
        println!();
    }

    let mut source = if config.heart_rate.enabled {
        let mut source = SimulatedHeartRate::from_config(&config.heart_rate);
        source.authorize()?;
        Some(source)
    } else {
        None
    };
    let mut samples = match source.as_mut() {
        Some(source) => Some(source.start()?),
        None => None,
    };
    let mut samples_open = samples.is_some();
    let mut heart_rate = HeartRateStats::new();

    if args.start {
        handle.start_session().await?;
    }

    let mut updates = handle.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => {
                let Some(line) = line? else {
                    tracing::debug!("stdin closed, running until interrupted");
                    stdin_open = false;
                    continue;
                };

                match parse_input(&line) {
                    Some(Input::Start) => {
                        heart_rate.reset();
                        handle.start_session().await?;
                    }
                    Some(Input::End) => handle.end_session().await?,
                    Some(Input::Resume) => handle.resume_if_running().await?,
                    Some(Input::Status) => {
                        let snapshot = handle.snapshot().await?;
                        print_snapshot("local", &snapshot, source.is_some().then_some(&heart_rate), args);
                        if let Some(peer) = peer {
                            let snapshot = peer.snapshot().await?;
                            print_snapshot("peer", &snapshot, None, args);
                        }
                    }
                    Some(Input::Help) => print_help(),
                    Some(Input::Quit) => break,
                    None if line.trim().is_empty() => {}
                    None => eprintln!("  Unknown command: {} (type 'help')", line.trim()),
                }
            }
            sample = next_sample(&mut samples), if samples_open => {
                match sample {
                    Some(sample) => {
                        if updates.borrow().is_running {
                            heart_rate.record(sample.bpm);
                        }
                    }
                    None => samples_open = false,
                }
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    tracing::warn!("Session stopped unexpectedly");
                    break;
                }
                let snapshot = *updates.borrow_and_update();
                if !args.quiet {
                    print_snapshot("local", &snapshot, source.is_some().then_some(&heart_rate), args);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::debug!("Interrupted");
                break;
            }
        }
    }

    if let Some(source) = source.as_mut() {
        source.stop();
    }

    let _ = handle.shutdown().await;
    let stats = runner_task.await.context("session task failed")?;

    if !args.quiet {
        println!();
        print_stats(&stats, args.json);
    }

    Ok(())
}

async fn next_sample(
    samples: &mut Option<mpsc::Receiver<HeartRateSample>>,
) -> Option<HeartRateSample> {
    match samples {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn print_snapshot(
    who: &str,
    snapshot: &SessionSnapshot,
    heart_rate: Option<&HeartRateStats>,
    args: &RunArgs,
) {
    let summary = heart_rate.map(HeartRateStats::summary);

    if args.json {
        let value = serde_json::json!({
            "device": who,
            "session": snapshot,
            "heart_rate": summary,
        });
        println!("{}", value);
        return;
    }

    println!(
        "  {:<6} {}",
        who,
        ui::session_line(snapshot, summary.as_ref())
    );
}

fn print_help() {
    println!("  Commands: start | end | resume | status | help | quit");
}

fn print_stats(stats: &SessionStats, json: bool) {
    if json {
        if let Ok(json_str) = serde_json::to_string(stats) {
            println!("{}", json_str);
        }
        return;
    }

    println!("  Session closed. Stats:");
    println!("    Sent: {} messages", stats.messages_sent);
    if stats.messages_dropped > 0 {
        println!("    Not sent (peer unreachable): {}", stats.messages_dropped);
    }
    if stats.send_failures > 0 {
        println!("    Send failures: {}", stats.send_failures);
    }
    println!(
        "    Received: {} messages ({} ignored)",
        stats.messages_received, stats.messages_ignored
    );
    println!("    Ticks: {}", stats.ticks);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input() {
        assert_eq!(parse_input("start"), Some(Input::Start));
        assert_eq!(parse_input("  STOP \n"), Some(Input::End));
        assert_eq!(parse_input("r"), Some(Input::Resume));
        assert_eq!(parse_input("status"), Some(Input::Status));
        assert_eq!(parse_input("?"), Some(Input::Help));
        assert_eq!(parse_input("exit"), Some(Input::Quit));
        assert_eq!(parse_input("dance"), None);
        assert_eq!(parse_input(""), None);
    }

    #[tokio::test]
    async fn test_next_sample_without_source_never_resolves() {
        let mut samples = None;
        let result = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            next_sample(&mut samples),
        )
        .await;
        assert!(result.is_err());
    }
}
