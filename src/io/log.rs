//! Wire traffic logging
//!
//! The session can append every framed command and reply to a log
//! file for offline protocol analysis. Entries are one line each,
//! marked `>` for sent and `<` for received, optionally preceded by a
//! timestamp line. Binary replies are noted rather than dumped.
//!
//! Logging must never take a session down: when a write fails the
//! log disables itself for the remainder of the session and the
//! failure is reported through [`tracing`].

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use chrono::Local;

use crate::protocol::reply::{PREAMBLE_FIRST, PREAMBLE_SECOND};
use crate::protocol::CARRIAGE_RETURN;

/// Sink for framed wire traffic.
pub trait WireLog {
    /// Records bytes written to the device.
    fn sent(&mut self, bytes: &[u8]);

    /// Records a complete reply read from the device.
    fn received(&mut self, bytes: &[u8]);
}

/// Log sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLog;

impl WireLog for NoopLog {
    fn sent(&mut self, _bytes: &[u8]) {}

    fn received(&mut self, _bytes: &[u8]) {}
}

/// Wire log backed by an append-only file.
#[derive(Debug)]
pub struct FileLog {
    file: Option<File>,
    date_stamp: bool,
}

impl FileLog {
    /// Opens or creates the log file.
    ///
    /// # Arguments
    ///
    /// * `path` - Log file location
    /// * `date_stamp` - Prefix each entry with a timestamp line
    /// * `clear` - Truncate an existing log instead of appending
    pub fn create(path: &Path, date_stamp: bool, clear: bool) -> io::Result<Self> {
        let mut options = OpenOptions::new();
        options.create(true);
        if clear {
            options.write(true).truncate(true);
        } else {
            options.append(true);
        }
        let file = options.open(path)?;
        Ok(FileLog {
            file: Some(file),
            date_stamp,
        })
    }

    /// True when the log is still accepting entries.
    pub fn is_active(&self) -> bool {
        self.file.is_some()
    }

    fn write_entry(&mut self, direction: char, bytes: &[u8]) {
        let date_stamp = self.date_stamp;
        let Some(file) = self.file.as_mut() else {
            return;
        };
        let result = write_entry_to(file, date_stamp, direction, bytes);
        if let Err(error) = result {
            tracing::warn!(error = %error, "Wire log write failed, logging disabled for this session");
            self.file = None;
        }
    }
}

impl WireLog for FileLog {
    fn sent(&mut self, bytes: &[u8]) {
        self.write_entry('>', bytes);
    }

    fn received(&mut self, bytes: &[u8]) {
        self.write_entry('<', bytes);
    }
}

fn write_entry_to(
    file: &mut File,
    date_stamp: bool,
    direction: char,
    bytes: &[u8],
) -> io::Result<()> {
    if date_stamp {
        // ctime-style stamp, e.g. "Tue Aug 25 14:33:21 2026"
        writeln!(file, "{}", Local::now().format("%a %b %e %H:%M:%S %Y"))?;
    }
    write!(file, "{} ", direction)?;
    if bytes.first() == Some(&PREAMBLE_FIRST) && bytes.get(1) == Some(&PREAMBLE_SECOND) {
        file.write_all(b"BINARY REPLY")?;
    } else {
        let end = bytes
            .iter()
            .position(|&byte| byte == CARRIAGE_RETURN)
            .unwrap_or(bytes.len());
        file.write_all(&bytes[..end])?;
    }
    file.write_all(b"\n\n")?;
    file.flush()
}
