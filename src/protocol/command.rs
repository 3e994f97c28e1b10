//! Outgoing command framing
//!
//! Commands travel as ASCII with an optional trailing checksum and a
//! carriage-return terminator. The device separates the command name
//! from its parameters with either a space (no checksum) or a colon
//! (checksummed); parameter text may itself contain spaces, so only the
//! first space is rewritten.

use crate::error::{NdiError, Result};
use crate::protocol::crc::text_crc;
use crate::protocol::CARRIAGE_RETURN;

/// Longest framed command the device accepts, terminator included.
pub const MAX_COMMAND_LEN: usize = 288;

const FIELD_SEPARATOR: u8 = b':';

/// Build the wire form of a command.
///
/// A command that already ends in a carriage return is a resend of an
/// earlier framing and is returned byte for byte. Otherwise the first
/// space (if any) is replaced by a colon when a checksum is requested,
/// the checksum is appended as four uppercase hex digits, and the
/// terminator is appended.
///
/// # Errors
///
/// [`NdiError::CommandTooLong`] if the framed command would exceed
/// [`MAX_COMMAND_LEN`]. Oversized commands are rejected whole, never
/// truncated.
///
/// # Example
///
/// ```
/// use ndicapi_rust::protocol::command::frame_command;
///
/// let framed = frame_command(b"INIT ", true).unwrap();
/// assert!(framed.starts_with(b"INIT:"));
/// assert_eq!(*framed.last().unwrap(), b'\r');
/// ```
pub fn frame_command(command: &[u8], with_checksum: bool) -> Result<Vec<u8>> {
    let mut framed = command.to_vec();
    if framed.last() != Some(&CARRIAGE_RETURN) {
        if with_checksum {
            if let Some(position) = framed.iter().position(|&byte| byte == b' ') {
                framed[position] = FIELD_SEPARATOR;
            }
            let crc = text_crc(&framed);
            framed.extend_from_slice(format!("{:04X}", crc).as_bytes());
        }
        framed.push(CARRIAGE_RETURN);
    }
    if framed.len() > MAX_COMMAND_LEN {
        return Err(NdiError::CommandTooLong {
            len: framed.len(),
            max: MAX_COMMAND_LEN,
        });
    }
    Ok(framed)
}

/// Name portion of a raw command, up to the first space or colon.
///
/// Used to key per-command timeout lookups. A command with no separator
/// has no distinct name and yields `None`.
pub fn command_name(command: &[u8]) -> Option<&[u8]> {
    let position = command
        .iter()
        .position(|&byte| byte == b' ' || byte == FIELD_SEPARATOR)?;
    if position == 0 {
        return None;
    }
    Some(&command[..position])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::crc::verify_text_reply;

    #[test]
    fn test_framed_command_verifies_like_a_reply() {
        let framed = frame_command(b"INIT ", true).unwrap();
        assert_eq!(framed.len(), "INIT:".len() + 5);
        assert_eq!(verify_text_reply(&framed).unwrap(), b"INIT:");
    }

    #[test]
    fn test_only_first_space_is_replaced() {
        let framed = frame_command(b"PHINF 03 0025", true).unwrap();
        assert!(framed.starts_with(b"PHINF:03 0025"));
        assert_eq!(verify_text_reply(&framed).unwrap(), b"PHINF:03 0025");
    }

    #[test]
    fn test_parameter_spaces_survive() {
        let framed = frame_command(b"GET Info.Status.New Alerts", true).unwrap();
        assert!(framed.starts_with(b"GET:Info.Status.New Alerts"));
    }

    #[test]
    fn test_without_checksum() {
        let framed = frame_command(b"VER 4", false).unwrap();
        assert_eq!(framed, b"VER 4\r");
    }

    #[test]
    fn test_resend_is_verbatim() {
        let first = frame_command(b"BEEP 2", true).unwrap();
        let resent = frame_command(&first, true).unwrap();
        assert_eq!(resent, first);
    }

    #[test]
    fn test_command_without_space() {
        let framed = frame_command(b"PVWR:0A0000", true).unwrap();
        assert!(framed.starts_with(b"PVWR:0A0000"));
        assert_eq!(verify_text_reply(&framed).unwrap(), b"PVWR:0A0000");
    }

    #[test]
    fn test_oversized_command_is_rejected() {
        let long = vec![b'A'; MAX_COMMAND_LEN];
        match frame_command(&long, true) {
            Err(NdiError::CommandTooLong { len, max }) => {
                assert_eq!(len, MAX_COMMAND_LEN + 5);
                assert_eq!(max, MAX_COMMAND_LEN);
            }
            other => panic!("expected CommandTooLong, got {:?}", other),
        }
    }

    #[test]
    fn test_command_name_extraction() {
        assert_eq!(command_name(b"TX 0801"), Some(&b"TX"[..]));
        assert_eq!(command_name(b"PVWR:0A0000FF"), Some(&b"PVWR"[..]));
        assert_eq!(command_name(b"TSTART "), Some(&b"TSTART"[..]));
        assert_eq!(command_name(b"RESET"), None);
        assert_eq!(command_name(b" X"), None);
    }
}
