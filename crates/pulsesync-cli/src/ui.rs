//! UI utilities for PulseSync CLI.

use std::time::Duration;

use pulsesync_core::heart_rate::HeartRateSummary;
use pulsesync_core::session::SessionSnapshot;

const BOX_WIDTH: usize = 37;

/// A formatted box announcing the local device and its peer.
pub struct DeviceBox<'a> {
    device: &'a str,
    peer: &'a str,
}

impl<'a> DeviceBox<'a> {
    /// Create a new device box.
    #[must_use]
    pub const fn new(device: &'a str, peer: &'a str) -> Self {
        Self { device, peer }
    }

    /// Display the device box to stdout.
    pub fn display(&self) {
        let device_line = format!("Device:  {}", self.device);
        let peer_line = format!("Peer:  {}", self.peer);

        println!("  ┌{}┐", "─".repeat(BOX_WIDTH));
        println!("  │{}│", " ".repeat(BOX_WIDTH));
        println!("  │{}│", center_in_box(&device_line, BOX_WIDTH));
        println!("  │{}│", center_in_box(&peer_line, BOX_WIDTH));
        println!("  │{}│", " ".repeat(BOX_WIDTH));
        println!("  └{}┘", "─".repeat(BOX_WIDTH));
    }
}

fn center_in_box(content: &str, width: usize) -> String {
    let content_len = content.chars().count();
    let padding = width.saturating_sub(content_len);
    let left = padding / 2;
    let right = padding - left;
    format!("{}{}{}", " ".repeat(left), content, " ".repeat(right))
}

/// Format elapsed session time as "HH:MM:SS".
pub fn format_elapsed(elapsed: Duration) -> String {
    let total_secs = elapsed.as_secs();
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;
    format!("{:02}:{:02}:{:02}", hours, mins, secs)
}

/// One status line for a session snapshot, with optional heart-rate values.
pub fn session_line(snapshot: &SessionSnapshot, heart_rate: Option<&HeartRateSummary>) -> String {
    let state = if snapshot.is_running {
        "● Running"
    } else {
        "○ Stopped"
    };

    let mut line = format!("{}  {}", state, format_elapsed(snapshot.elapsed_time));

    if let Some(hr) = heart_rate {
        line.push_str(&format!(
            "   ♥ {} bpm (min {} / avg {} / max {})",
            hr.current, hr.minimum, hr.average, hr.maximum
        ));
    }

    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_in_box() {
        let centered = center_in_box("hello", 11);
        assert_eq!(centered, "   hello   ");

        let centered = center_in_box("hi", 6);
        assert_eq!(centered, "  hi  ");
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::ZERO), "00:00:00");
        assert_eq!(format_elapsed(Duration::from_secs(65)), "00:01:05");
        assert_eq!(format_elapsed(Duration::from_millis(3_599_900)), "00:59:59");
        assert_eq!(format_elapsed(Duration::from_secs(3600 * 27 + 61)), "27:01:01");
    }

    #[test]
    fn test_session_line() {
        let snapshot = SessionSnapshot {
            is_running: true,
            elapsed_time: Duration::from_secs(90),
            tick_armed: true,
        };
        assert_eq!(session_line(&snapshot, None), "● Running  00:01:30");

        let hr = HeartRateSummary {
            current: 80,
            minimum: 70,
            maximum: 90,
            average: 78,
        };
        let stopped = SessionSnapshot::default();
        assert_eq!(
            session_line(&stopped, Some(&hr)),
            "○ Stopped  00:00:00   ♥ 80 bpm (min 70 / avg 78 / max 90)"
        );
    }
}
