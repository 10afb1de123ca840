//! Per-channel traffic counters and their text rendering.

use std::io::{self, Write};

use serde::Serialize;

/// Counters for one direction of a channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SocketStats {
    pub bytes: u64,
    pub messages: u64,
    pub errors: u64,
}

impl SocketStats {
    pub(crate) fn record(&mut self, bytes: usize) {
        self.bytes += bytes as u64;
        self.messages += 1;
    }

    pub(crate) fn record_error(&mut self) {
        self.errors += 1;
    }
}

/// Sent and received counters of a channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrafficStats {
    pub sent: SocketStats,
    pub recv: SocketStats,
}

impl TrafficStats {
    /// Write the counter block shared by every transport.
    pub fn write_counters(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(
            out,
            "{:>20} Bytes sent {:>20} Bytes recv",
            self.sent.bytes, self.recv.bytes
        )?;
        writeln!(
            out,
            "{:>20} Pckts sent {:>20} Pckts recv",
            self.sent.messages, self.recv.messages
        )?;
        writeln!(
            out,
            "{:>20} Error send {:>20} Error recv",
            self.sent.errors, self.recv.errors
        )?;
        writeln!(out)
    }
}

/// Link state shown by extended statistics.
pub(crate) fn link_status(running: Option<bool>) -> &'static str {
    match running {
        Some(true) => "RUNNING",
        Some(false) => "DOWN",
        None => "UNKNOWN",
    }
}

pub(crate) fn role(active: bool) -> &'static str {
    if active {
        "ACTIVE"
    } else {
        "BACKUP"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_right_aligned() {
        let mut stats = TrafficStats::default();
        stats.sent.record(120);
        stats.sent.record(80);
        stats.recv.record_error();

        let mut out = Vec::new();
        stats.write_counters(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            format!("{:>20} Bytes sent {:>20} Bytes recv", 200, 0)
        );
        assert!(lines[1].starts_with(&format!("{:>20} Pckts sent", 2)));
        assert!(lines[2].ends_with(&format!("{:>20} Error recv", 1)));
        assert_eq!(lines[3], "");
    }

    #[test]
    fn labels() {
        assert_eq!(link_status(Some(true)), "RUNNING");
        assert_eq!(link_status(Some(false)), "DOWN");
        assert_eq!(role(false), "BACKUP");
    }
}
