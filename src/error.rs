//! Error types for NDI tracking system communication
//!
//! This module defines error types that can occur during serial
//! communication with POLARIS and AURORA measurement systems, including
//! reply framing, checksum verification, and device-reported failures.

use thiserror::Error;

/// Errors that can occur during NDI communication
#[derive(Error, Debug)]
pub enum NdiError {
    /// No serial connection is currently open
    ///
    /// This error occurs when:
    /// - A command is issued before `TrackingSystem::open` succeeded
    /// - The transport was torn down by a previous fatal error
    ///
    /// # Example
    ///
    /// ```no_run
    /// use ndicapi_rust::system::TrackingSystem;
    ///
    /// let mut system = TrackingSystem::builder().build();
    /// // beep() fails because no serial port has been opened
    /// match system.beep(1) {
    ///     Err(e) => eprintln!("Not connected: {}", e),
    ///     Ok(_) => unreachable!(),
    /// }
    /// ```
    #[error("No serial connection to the measurement system is open")]
    TransportUnavailable,

    /// The device did not produce a complete reply within the deadline
    ///
    /// This error occurs when:
    /// - The device is powered off or the cable is disconnected
    /// - The host and device baud rates disagree
    /// - A reply was corrupted so badly its terminator never arrived
    ///
    /// The command that timed out is retained so recovery layers can
    /// decide whether to resend it.
    #[error("Timed out waiting for a reply to {command:?}")]
    Timeout {
        /// Command that was awaiting a reply, without framing
        command: String,
    },

    /// A reply arrived but could not be parsed
    ///
    /// This error occurs when:
    /// - A numeric field contains non-hexadecimal characters
    /// - A reply is shorter than its mandatory fields
    /// - A record count disagrees with the bytes that follow it
    #[error("Malformed reply: {0}")]
    MalformedReply(String),

    /// Reply checksum verification failed
    ///
    /// This error occurs when:
    /// - Serial line noise corrupted a reply in transit
    /// - The reply was truncated after the payload but before the CRC
    ///
    /// # Example
    ///
    /// ```
    /// use ndicapi_rust::protocol::crc::text_crc;
    ///
    /// let payload = b"OKAY";
    /// let crc = text_crc(payload);
    /// assert_eq!(format!("{:04X}", crc), "A896");
    /// ```
    #[error("Reply checksum verification failed")]
    BadChecksum,

    /// The device reported a command error
    ///
    /// This error occurs when:
    /// - A command was issued in a state that forbids it
    /// - A parameter was out of the range the device accepts
    /// - The device detected an internal fault
    ///
    /// The two-digit code is taken from the ERROR reply and `message`
    /// is its catalog description.
    #[error("Device error {code:02X}: {message}")]
    DeviceError {
        /// Error code reported by the device
        code: u8,
        /// Human-readable description from the message catalog
        message: String,
    },

    /// The device reported a non-fatal warning
    ///
    /// This error occurs when:
    /// - A tool was enabled whose geometry the device flags as risky
    /// - Initialization succeeded with degraded characterization data
    ///
    /// Warnings do not fail the operation that produced them; this
    /// variant exists so the coded message can be surfaced and logged
    /// in a structured form.
    #[error("Device warning {code:02X}: {message}")]
    DeviceWarning {
        /// Warning code reported by the device
        code: u8,
        /// Human-readable description from the message catalog
        message: String,
    },

    /// An operation requested an illegal parameter value
    ///
    /// This error occurs when:
    /// - A serial configuration code is outside the documented range
    /// - A tool definition image exceeds the writable region
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A reply violated the framing rules of the protocol
    ///
    /// This error occurs when:
    /// - A binary reply arrived where a textual one was expected
    /// - A binary header length disagrees with the received body
    /// - A record carried a status value the protocol does not define
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// A command exceeded the device's input buffer
    ///
    /// This error occurs when:
    /// - A caller-assembled command is longer than the device accepts
    ///
    /// Commands are never truncated to fit; the oversized command is
    /// rejected before anything is written to the port.
    #[error("Command length {len} exceeds the {max} byte limit")]
    CommandTooLong {
        /// Length of the rejected command in bytes
        len: usize,
        /// Maximum command length the device accepts
        max: usize,
    },

    /// I/O error during serial communication
    ///
    /// This error occurs when:
    /// - Reading from or writing to the port fails
    /// - The wire log file cannot be created
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port enumeration or configuration failed
    ///
    /// This error occurs when:
    /// - The named port does not exist or is held by another process
    /// - The requested baud rate or framing is unsupported by the host
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

/// Result type alias for NDI operations
pub type Result<T> = std::result::Result<T, NdiError>;
