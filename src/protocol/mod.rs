//! NDI serial protocol implementation module
//!
//! This module contains the wire-level pieces of the combined API:
//! command framing, reply classification, checksum algorithms, the
//! device message catalog, and typed decoders for reply payloads.

pub mod catalog;
pub mod command;
pub mod crc;
pub mod reply;
pub mod types;

// Re-export commonly used types
pub use catalog::{BuiltinCatalog, MessageCatalog, MessageCategory};
pub use command::{frame_command, MAX_COMMAND_LEN};
pub use crc::{binary_crc, text_crc, verify_binary_reply, verify_text_reply};
pub use reply::{classify, RawReply, ReplyKind};

/// Terminator of every textual command and reply.
pub const CARRIAGE_RETURN: u8 = b'\r';

/// Separator between records inside some multi-line replies.
pub const LINE_FEED: u8 = b'\n';

/// Upper bound on any reply the device can produce.
///
/// Replies longer than this indicate a framing failure rather than a
/// legitimate payload, so readers abandon the attempt instead of
/// growing their buffers without bound.
pub const MAX_REPLY_LEN: usize = 4096;
