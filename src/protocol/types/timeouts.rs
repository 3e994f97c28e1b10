//! Per-command reply timeout table

use std::collections::HashMap;
use std::time::Duration;

use crate::protocol::command::command_name;
use crate::protocol::LINE_FEED;

/// Prefix carried by every timeout entry in the device's reply.
const ENTRY_PREFIX: &str = "Info.Timeout.";

/// Reply deadlines keyed by command name.
///
/// Newer firmware publishes how long each command may take to answer;
/// the table falls back to a configured default for commands the
/// device did not list. Magnetic trackers do not publish the table,
/// so lookups on them always use the default.
#[derive(Debug, Clone)]
pub struct TimeoutTable {
    default_secs: u64,
    entries: HashMap<String, u64>,
}

impl TimeoutTable {
    /// Creates an empty table with the given fallback in seconds.
    pub fn new(default_secs: u64) -> Self {
        TimeoutTable {
            default_secs,
            entries: HashMap::new(),
        }
    }

    /// The fallback deadline.
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_secs)
    }

    /// Number of per-command entries currently held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no per-command entries are held.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every per-command entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Loads entries from a timeout query reply payload.
    ///
    /// The payload holds one `Info.Timeout.<NAME>=<seconds>` entry per
    /// line. Lines that do not match that shape are skipped. Returns
    /// the number of entries added.
    pub fn populate(&mut self, payload: &[u8]) -> usize {
        let mut added = 0;
        for line in payload.split(|&byte| byte == LINE_FEED) {
            let Ok(line) = std::str::from_utf8(line) else {
                continue;
            };
            let Some(entry) = line.trim().strip_prefix(ENTRY_PREFIX) else {
                continue;
            };
            let Some((name, value)) = entry.split_once('=') else {
                continue;
            };
            let Ok(secs) = value.trim().parse::<u64>() else {
                continue;
            };
            self.entries.insert(name.to_string(), secs);
            added += 1;
        }
        added
    }

    /// Returns the reply deadline for a command.
    ///
    /// The lookup key is the command name, the text before the first
    /// space or colon. Commands without a listed entry, commands whose
    /// name cannot be determined, and every command on a magnetic
    /// tracker resolve to the default.
    pub fn lookup(&self, command: &[u8], magnetic: bool) -> Duration {
        if magnetic {
            return self.default_timeout();
        }
        let Some(name) = command_name(command) else {
            return self.default_timeout();
        };
        let Ok(name) = std::str::from_utf8(name) else {
            return self.default_timeout();
        };
        match self.entries.get(name) {
            Some(&secs) => Duration::from_secs(secs),
            None => self.default_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] =
        b"Info.Timeout.INIT=15\nInfo.Timeout.TX=3\nInfo.Timeout.PHSR=5\nInfo.Timeout.PVWR=8";

    #[test]
    fn test_populate_and_lookup() {
        let mut table = TimeoutTable::new(10);
        assert_eq!(table.populate(SAMPLE), 4);
        assert_eq!(table.len(), 4);
        assert_eq!(table.lookup(b"INIT ", false), Duration::from_secs(15));
        assert_eq!(table.lookup(b"TX 0001", false), Duration::from_secs(3));
        assert_eq!(table.lookup(b"PVWR:0A0000FF", false), Duration::from_secs(8));
    }

    #[test]
    fn test_lookup_falls_back_to_default() {
        let mut table = TimeoutTable::new(10);
        table.populate(SAMPLE);
        assert_eq!(table.lookup(b"BEEP 2", false), Duration::from_secs(10));
        assert_eq!(table.lookup(b"", false), Duration::from_secs(10));
    }

    #[test]
    fn test_magnetic_always_default() {
        let mut table = TimeoutTable::new(10);
        table.populate(SAMPLE);
        assert_eq!(table.lookup(b"TX 0001", true), Duration::from_secs(10));
    }

    #[test]
    fn test_populate_skips_malformed_lines() {
        let mut table = TimeoutTable::new(10);
        let added = table.populate(
            b"Info.Timeout.INIT=15\ngarbage line\nInfo.Timeout.BROKEN=abc\nInfo.Other.TX=3",
        );
        assert_eq!(added, 1);
        assert_eq!(table.lookup(b"INIT ", false), Duration::from_secs(15));
        assert_eq!(table.lookup(b"BROKEN ", false), Duration::from_secs(10));
    }

    #[test]
    fn test_clear() {
        let mut table = TimeoutTable::new(10);
        table.populate(SAMPLE);
        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.lookup(b"TX 0001", false), Duration::from_secs(10));
    }
}
