//! Serial I/O module for device communication
//!
//! Provides the transport abstraction, the serial implementation, the
//! reply reader with its timeout escalation, and wire logging.

pub mod log;
pub mod reader;
pub mod serial;
pub mod transport;

pub use log::{FileLog, NoopLog, WireLog};
pub use reader::{
    read_reply, AbortOnTimeout, ReadMode, TimeoutDecision, TimeoutHandler, MAX_AUTO_RETRIES,
};
pub use serial::SerialTransport;
pub use transport::{CommParams, Parity, Transport, BAUD_RATES};
