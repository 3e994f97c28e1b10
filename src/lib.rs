//! NDI Tracking Device Control in Rust
//!
//! This library drives NDI optical and magnetic tracking systems over
//! their serial command protocol: POLARIS-family optical trackers
//! (including ACCEDO, VICRA and SPECTRA) and AURORA-family magnetic
//! trackers.
//!
//! # Features
//!
//! - **Complete command engine** - Framing, checksums, reply
//!   classification and per-command timeouts
//! - **Port handle lifecycle** - Discovery, tool definition loading,
//!   initialization and enabling
//! - **Textual and binary tracking** - Pose reports in either reply
//!   format, decoded into one registry
//! - **Reference tool support** - Poses re-expressed relative to a
//!   chosen tool
//! - **Transport abstraction** - Serial hardware in production,
//!   scripted transports in tests
//! - **Wire logging** - Optional capture of every framed command and
//!   reply
//!
//! # Quick Start
//!
//! ```no_run
//! use ndicapi_rust::system::TrackingSystem;
//!
//! let mut system = TrackingSystem::builder().build();
//! system.open("/dev/ttyUSB0")?;
//!
//! // Reset, initialize, and learn what is attached.
//! system.hardware_reset()?;
//! system.initialize()?;
//! system.query_system_info()?;
//! system.refresh_timeouts()?;
//!
//! // Bring every occupied port into tracking.
//! let enabled = system.activate_ports()?;
//! println!("tracking {} tools", enabled);
//!
//! system.start_tracking()?;
//! for _ in 0..100 {
//!     system.read_poses(false)?;
//!     for (handle, record) in system.registry().iter() {
//!         println!("{}: {:?}", handle, record.pose.translation);
//!     }
//! }
//! system.stop_tracking()?;
//! # Ok::<(), ndicapi_rust::NdiError>(())
//! ```
//!
//! # Architecture
//!
//! The library is organized into four main modules:
//!
//! - **`protocol`** - The wire protocol
//!   - `crc` - Textual and binary checksum algorithms
//!   - `command` - Command framing
//!   - `reply` - Reply classification and field extraction
//!   - `types` - Typed decoders for every reply payload
//!   - `catalog` - Coded error and warning message catalog
//!
//! - **`io`** - The byte layer
//!   - `Transport` - Byte-level link abstraction
//!   - `SerialTransport` - Serial port implementation
//!   - `read_reply` - Deadline-enforcing reply reader with automatic
//!     resends
//!   - `WireLog` - Wire traffic capture
//!
//! - **`system`** - The session layer
//!   - `TrackingSystem` - One session with one device
//!   - `HandleRegistry` - Everything known about each port handle
//!
//! - **`error`** - Error handling
//!   - `NdiError` - Unified error type for all operations
//!   - `Result<T>` - Type alias for `Result<T, NdiError>`
//!
//! # Choosing a Tracking Format
//!
//! Pose reports come in two reply formats, both decoded into the same
//! registry:
//!
//! - **Textual** ([`system::TrackingSystem::read_poses`]) - Fixed-width
//!   decimal fields
//!   - Use for: Moderate rates, easy wire logs
//!   - Damaged records are isolated; earlier records in the same reply
//!     still apply
//!
//! - **Binary** ([`system::TrackingSystem::read_poses_binary`]) -
//!   Little-endian floats in a checksummed frame
//!   - Use for: High frame rates, full float precision
//!   - The whole frame validates before anything applies
//!
//! # Examples
//!
//! ## Tracking Relative to a Reference Tool
//!
//! ```no_run
//! use ndicapi_rust::protocol::types::Handle;
//! use ndicapi_rust::system::TrackingSystem;
//!
//! let mut system = TrackingSystem::builder().build();
//! system.open("/dev/ttyUSB0")?;
//! system.hardware_reset()?;
//! system.initialize()?;
//! system.query_system_info()?;
//! system.activate_ports()?;
//!
//! // Fix one tool to the patient and report everything else
//! // relative to it; camera motion then cancels out.
//! system.set_reference(Some(Handle(0x0A)));
//!
//! system.start_tracking()?;
//! system.read_poses(false)?;
//! # Ok::<(), ndicapi_rust::NdiError>(())
//! ```
//!
//! ## Loading Tool Definitions from Configuration
//!
//! ```no_run
//! use ndicapi_rust::config::SessionConfig;
//! use ndicapi_rust::system::TrackingSystem;
//!
//! let mut config = SessionConfig::default();
//! config.tool_images.insert(
//!     "Wireless Tool 01".to_string(),
//!     "/srv/tools/probe.rom".to_string(),
//! );
//! // A wired tool whose definition lives in the device itself.
//! config.tool_images.insert("Port 1".to_string(), "TTCFG".to_string());
//!
//! let mut system = TrackingSystem::builder().config(config).build();
//! system.open("/dev/ttyUSB0")?;
//! system.hardware_reset()?;
//! system.initialize()?;
//! system.query_system_info()?;
//! system.activate_ports()?;
//! # Ok::<(), ndicapi_rust::NdiError>(())
//! ```
//!
//! # Error Handling
//!
//! All operations return `Result<T, NdiError>`. Common error types:
//!
//! - **Timeout** - The device never answered, even after resends
//! - **DeviceError** - The device rejected a command with a coded error
//! - **BadChecksum** - A reply failed checksum verification
//! - **MalformedReply** - A reply did not parse as its command's layout
//! - **Io** / **Serial** - The underlying link failed
//!
//! ```no_run
//! use ndicapi_rust::system::TrackingSystem;
//! use ndicapi_rust::NdiError;
//!
//! let mut system = TrackingSystem::builder().build();
//! system.open("/dev/ttyUSB0")?;
//! match system.initialize() {
//!     Ok(()) => println!("ready"),
//!     Err(NdiError::DeviceError { code, message }) => {
//!         eprintln!("device refused: {:02X} {}", code, message)
//!     }
//!     Err(e) => eprintln!("link problem: {}", e),
//! }
//! # Ok::<(), ndicapi_rust::NdiError>(())
//! ```

pub mod config;
pub mod error;
pub mod io;
pub mod protocol;
pub mod system;
pub mod transform;

// Re-export commonly used types
pub use error::{NdiError, Result};

#[cfg(test)]
mod tests {
    use crate::system::TrackingSystem;

    #[test]
    fn test_session_starts_detached() {
        let system = TrackingSystem::builder().build();
        assert!(!system.is_open());
        assert_eq!(system.registry().allocated_count(), 0);
    }
}
