//! Reply reader with deadline handling and automatic resends
//!
//! Replies are collected one byte at a time so the deadline can be
//! enforced regardless of how the device paces its output. Textual
//! replies end at a carriage return, which is retained; binary
//! replies declare their own length in the frame header. A reply that
//! was requested in binary form but arrives without the preamble is
//! read as text, because devices reject binary requests with an
//! ordinary textual error.
//!
//! When a deadline passes, the partial reply is discarded and the
//! framed command is resent as-is, up to [`MAX_AUTO_RETRIES`] times.
//! After the automatic resends are spent the caller's
//! [`TimeoutHandler`] decides whether to keep trying or give up. A
//! retry decision restarts the resend budget; when there is no
//! command to resend (the reply being awaited is a reset banner), a
//! serial break takes its place.

use std::thread;
use std::time::{Duration, Instant};

use crate::error::{NdiError, Result};
use crate::io::log::WireLog;
use crate::io::transport::Transport;
use crate::protocol::reply::{PREAMBLE_FIRST, PREAMBLE_SECOND};
use crate::protocol::{CARRIAGE_RETURN, MAX_REPLY_LEN};

/// Resends attempted before the timeout handler is consulted.
pub const MAX_AUTO_RETRIES: u32 = 3;

/// Bytes of framing around a binary reply body: preamble, length,
/// header checksum, and trailing checksum.
const BINARY_OVERHEAD: usize = 8;

/// Pause between polls while the device has nothing buffered.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// How a reply terminates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Reply ends at a carriage return
    Text,
    /// Reply length is declared in the frame header
    Binary,
}

/// Verdict from a [`TimeoutHandler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutDecision {
    /// Resend the same command and keep waiting
    RetrySameCommand,
    /// Give up and surface a timeout error
    Abort,
}

/// Decides what to do once the automatic resends are exhausted.
///
/// Interactive hosts typically prompt the operator here; unattended
/// ones abort.
pub trait TimeoutHandler {
    /// Called with the framed command that went unanswered.
    fn on_unrecoverable_timeout(&mut self, last_command: &[u8]) -> TimeoutDecision;
}

/// Handler that declines every escalation.
#[derive(Debug, Default, Clone, Copy)]
pub struct AbortOnTimeout;

impl TimeoutHandler for AbortOnTimeout {
    fn on_unrecoverable_timeout(&mut self, _last_command: &[u8]) -> TimeoutDecision {
        TimeoutDecision::Abort
    }
}

/// Reads one complete reply from the transport.
///
/// `command` is the framed bytes of the command awaiting an answer,
/// used verbatim for resends; pass an empty slice when nothing was
/// sent. The successful reply is recorded in the wire log before it
/// is returned.
pub fn read_reply(
    transport: &mut dyn Transport,
    command: &[u8],
    timeout: Duration,
    mode: ReadMode,
    handler: &mut dyn TimeoutHandler,
    log: &mut dyn WireLog,
) -> Result<Vec<u8>> {
    let mut reply: Vec<u8> = Vec::new();
    let mut expected: Option<usize> = None;
    let mut started = Instant::now();
    let mut retries = 0u32;

    loop {
        while let Some(byte) = transport.try_read_byte()? {
            reply.push(byte);
            match mode {
                ReadMode::Text => {
                    if byte == CARRIAGE_RETURN {
                        log.received(&reply);
                        return Ok(reply);
                    }
                    if reply.len() >= MAX_REPLY_LEN {
                        return Err(NdiError::ProtocolViolation(format!(
                            "textual reply exceeded {} bytes without a terminator",
                            MAX_REPLY_LEN
                        )));
                    }
                }
                ReadMode::Binary => {
                    let binary = reply[0] == PREAMBLE_FIRST
                        && (reply.len() < 2 || reply[1] == PREAMBLE_SECOND);
                    if binary {
                        if reply.len() == 4 {
                            let declared = u16::from_le_bytes([reply[2], reply[3]]) as usize;
                            expected = Some(declared + BINARY_OVERHEAD);
                        }
                        if Some(reply.len()) == expected {
                            log.received(&reply);
                            return Ok(reply);
                        }
                    } else {
                        // A device that rejects a binary request
                        // answers in text, terminated as usual.
                        if byte == CARRIAGE_RETURN {
                            log.received(&reply);
                            return Ok(reply);
                        }
                        if reply.len() >= MAX_REPLY_LEN {
                            return Err(NdiError::ProtocolViolation(format!(
                                "textual reply exceeded {} bytes without a terminator",
                                MAX_REPLY_LEN
                            )));
                        }
                    }
                }
            }
        }

        if started.elapsed() < timeout {
            thread::sleep(POLL_INTERVAL);
            continue;
        }

        // Deadline passed: drop the partial reply and try again.
        reply.clear();
        expected = None;
        if retries < MAX_AUTO_RETRIES {
            retries += 1;
            tracing::warn!(attempt = retries, "Reply deadline passed, resending command");
            resend(transport, command, log)?;
            started = Instant::now();
        } else {
            match handler.on_unrecoverable_timeout(command) {
                TimeoutDecision::RetrySameCommand => {
                    if command.is_empty() {
                        tracing::warn!("Nothing to resend, sending a serial break instead");
                        transport.send_break()?;
                    } else {
                        tracing::warn!("Restarting resend attempts");
                        retries = 1;
                        resend(transport, command, log)?;
                    }
                    started = Instant::now();
                }
                TimeoutDecision::Abort => {
                    return Err(NdiError::Timeout {
                        command: printable_command(command),
                    });
                }
            }
        }
    }
}

/// Writes the framed command again, through its first terminator.
fn resend(transport: &mut dyn Transport, command: &[u8], log: &mut dyn WireLog) -> Result<()> {
    if command.is_empty() {
        return Ok(());
    }
    let end = command
        .iter()
        .position(|&byte| byte == CARRIAGE_RETURN)
        .map(|position| position + 1)
        .unwrap_or(command.len());
    transport.write_all(&command[..end])?;
    transport.flush()?;
    log.sent(&command[..end]);
    Ok(())
}

fn printable_command(command: &[u8]) -> String {
    let trimmed = match command.last() {
        Some(&CARRIAGE_RETURN) => &command[..command.len() - 1],
        _ => command,
    };
    String::from_utf8_lossy(trimmed).into_owned()
}
