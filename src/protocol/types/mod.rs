//! Typed decoders for reply payloads
//!
//! This module contains the per-command reply layouts: handle lists,
//! port information, pose records, system capability summaries, alert
//! sets, and the per-command timeout table.

pub mod alerts;
pub mod port_info;
pub mod pose;
pub mod system;
pub mod timeouts;

// Re-export payload types
pub use alerts::{parse_alerts, AlertSet};
pub use port_info::{parse_handle_list, Handle, HandleSearch, HandleStatus, PortInfo};
pub use pose::{parse_bx, Pose, PoseFlag, ToolUpdate, TxReader, BAD_FLOAT, MAX_NEGATIVE};
pub use system::{detect_family, Features, PortCounts, SystemFamily, SystemProfile, SystemStatus};
pub use timeouts::TimeoutTable;
