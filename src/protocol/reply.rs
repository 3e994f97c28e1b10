//! Reply classification and field extraction
//!
//! Every reply from the device is first classified against a small
//! taxonomy before any command-specific parsing happens. Textual
//! replies are matched by their leading literal; binary replies are
//! recognized by the two preamble bytes and verified with the binary
//! checksum algorithm instead of the textual one.

use crate::error::{NdiError, Result};
use crate::protocol::crc::{verify_binary_reply, verify_text_reply};
use crate::protocol::CARRIAGE_RETURN;

/// First preamble byte of a binary reply frame.
pub const PREAMBLE_FIRST: u8 = 0xC4;
/// Second preamble byte of a binary reply frame.
pub const PREAMBLE_SECOND: u8 = 0xA5;

/// A reply as read from the transport, tagged by the reader that
/// produced it.
///
/// The tag travels with the bytes so downstream parsers can reject a
/// reply read in the wrong mode instead of guessing the format from
/// content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawReply {
    /// Carriage-return terminated ASCII reply, terminator included
    Text(Vec<u8>),
    /// Complete binary frame starting at the preamble
    Binary(Vec<u8>),
}

impl RawReply {
    /// Raw bytes of the reply regardless of variant.
    pub fn bytes(&self) -> &[u8] {
        match self {
            RawReply::Text(bytes) => bytes,
            RawReply::Binary(bytes) => bytes,
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, RawReply::Binary(_))
    }
}

/// Mutually exclusive classification of a single reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// Banner emitted after a device reset
    Reset,
    /// Command accepted
    Okay,
    /// Command rejected with a coded error
    Error,
    /// Command accepted with a coded, non-fatal warning
    Warning,
    /// Any other well-formed reply (data replies land here)
    Other,
    /// Reply too damaged to carry a verifiable checksum
    Invalid,
    /// Checksum verification failed
    BadCrc,
}

/// Classify a raw reply.
///
/// The leading bytes are compared case-insensitively against the four
/// reply literals; anything else, including an empty reply, is
/// [`ReplyKind::Other`]. Checksum verification runs for `Okay` replies
/// always and for `Other` replies when `check_crc` is set; an empty
/// reply skips verification entirely. Verification selects the binary
/// algorithm when the reply opens with the binary preamble.
pub fn classify(reply: &[u8], check_crc: bool) -> ReplyKind {
    let kind = if starts_with_ignore_case(reply, b"RESET") {
        ReplyKind::Reset
    } else if starts_with_ignore_case(reply, b"OKAY") {
        ReplyKind::Okay
    } else if starts_with_ignore_case(reply, b"ERROR") {
        ReplyKind::Error
    } else if starts_with_ignore_case(reply, b"WARNING") {
        ReplyKind::Warning
    } else if !reply.is_empty() {
        ReplyKind::Other
    } else {
        return ReplyKind::Other;
    };

    if kind == ReplyKind::Okay || (kind == ReplyKind::Other && check_crc) {
        let verified = if reply.len() >= 2 && reply[0] == PREAMBLE_FIRST && reply[1] == PREAMBLE_SECOND
        {
            verify_binary_reply(reply).map(|_| ())
        } else {
            verify_text_reply(reply).map(|_| ())
        };
        return match verified {
            Ok(()) => kind,
            Err(NdiError::BadChecksum) => ReplyKind::BadCrc,
            Err(_) => ReplyKind::Invalid,
        };
    }
    kind
}

/// Two-character error code of an `ERROR` reply, if present.
pub fn error_code(reply: &[u8]) -> Option<&[u8]> {
    reply.get(5..7)
}

/// Two-character warning code of a `WARNING` reply, if present.
pub fn warning_code(reply: &[u8]) -> Option<&[u8]> {
    reply.get(7..9)
}

/// Strip the terminator and trailing checksum field without verifying.
///
/// Used on the tracking fast path when reply checking is switched off;
/// the caller accepts whatever the payload parser makes of the bytes.
pub fn strip_framing(reply: &[u8]) -> &[u8] {
    let body = match reply.last() {
        Some(&CARRIAGE_RETURN) => &reply[..reply.len() - 1],
        _ => reply,
    };
    if body.len() >= 4 {
        &body[..body.len() - 4]
    } else {
        body
    }
}

/// Decode a fixed-width ASCII hex field out of a reply payload.
///
/// # Errors
///
/// [`NdiError::MalformedReply`] if the payload is shorter than
/// `offset + width` or the field contains non-hexadecimal characters.
pub fn hex_field(payload: &[u8], offset: usize, width: usize) -> Result<u32> {
    let field = payload.get(offset..offset + width).ok_or_else(|| {
        NdiError::MalformedReply(format!(
            "expected a {} character field at offset {}, reply has {} bytes",
            width,
            offset,
            payload.len()
        ))
    })?;
    let text = std::str::from_utf8(field)
        .map_err(|_| NdiError::MalformedReply(format!("field at offset {} is not ASCII", offset)))?;
    u32::from_str_radix(text, 16).map_err(|_| {
        NdiError::MalformedReply(format!("field {:?} at offset {} is not hexadecimal", text, offset))
    })
}

fn starts_with_ignore_case(reply: &[u8], literal: &[u8]) -> bool {
    reply.len() >= literal.len() && reply[..literal.len()].eq_ignore_ascii_case(literal)
}
