//! Byte-level transport abstraction
//!
//! The engine drives its device through the [`Transport`] trait so
//! that the session logic stays independent of the physical link.
//! Production code uses the serial implementation; tests substitute
//! scripted transports.

use crate::error::{NdiError, Result};

/// Host-side baud rates selectable by serial configuration code.
///
/// The last entry is the non-standard high rate some magnetic
/// trackers run at.
pub const BAUD_RATES: [u32; 8] = [
    9_600, 14_400, 19_200, 38_400, 57_600, 115_200, 921_600, 1_228_739,
];

/// Parity setting for the serial link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    /// No parity bit
    None,
    /// Odd parity
    Odd,
    /// Even parity
    Even,
}

/// Serial link parameters.
///
/// The device selects its parameters from single-digit codes carried
/// by the serial configuration command; [`CommParams::from_codes`]
/// maps those codes to concrete settings for the host side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommParams {
    /// Baud rate
    pub baud: u32,
    /// Data bits per character, 7 or 8
    pub data_bits: u8,
    /// Parity setting
    pub parity: Parity,
    /// Stop bits per character, 1 or 2
    pub stop_bits: u8,
    /// Hardware handshaking
    pub handshake: bool,
}

impl CommParams {
    /// Power-on settings of every supported device.
    pub const DEFAULT: CommParams = CommParams {
        baud: 9_600,
        data_bits: 8,
        parity: Parity::None,
        stop_bits: 1,
        handshake: false,
    };

    /// Builds parameters from the five single-digit configuration codes.
    ///
    /// # Arguments
    ///
    /// * `baud` - Baud rate code, `0` through `7`
    /// * `data_bits` - `0` for 8 data bits, `1` for 7
    /// * `parity` - `0` none, `1` odd, `2` even
    /// * `stop_bits` - `0` for 1 stop bit, `1` for 2
    /// * `handshake` - `0` off, `1` on
    ///
    /// # Examples
    ///
    /// ```
    /// use ndicapi_rust::io::CommParams;
    ///
    /// let params = CommParams::from_codes(5, 0, 0, 0, 1)?;
    /// assert_eq!(params.baud, 115_200);
    /// assert_eq!(params.data_bits, 8);
    /// assert!(params.handshake);
    /// # Ok::<(), ndicapi_rust::error::NdiError>(())
    /// ```
    pub fn from_codes(
        baud: u8,
        data_bits: u8,
        parity: u8,
        stop_bits: u8,
        handshake: u8,
    ) -> Result<Self> {
        let baud = *BAUD_RATES.get(baud as usize).ok_or_else(|| {
            NdiError::InvalidParameter(format!("baud rate code {} is out of range", baud))
        })?;
        let data_bits = match data_bits {
            0 => 8,
            1 => 7,
            other => {
                return Err(NdiError::InvalidParameter(format!(
                    "data bits code {} is out of range",
                    other
                )))
            }
        };
        let parity = match parity {
            0 => Parity::None,
            1 => Parity::Odd,
            2 => Parity::Even,
            other => {
                return Err(NdiError::InvalidParameter(format!(
                    "parity code {} is out of range",
                    other
                )))
            }
        };
        let stop_bits = match stop_bits {
            0 => 1,
            1 => 2,
            other => {
                return Err(NdiError::InvalidParameter(format!(
                    "stop bits code {} is out of range",
                    other
                )))
            }
        };
        let handshake = match handshake {
            0 => false,
            1 => true,
            other => {
                return Err(NdiError::InvalidParameter(format!(
                    "handshake code {} is out of range",
                    other
                )))
            }
        };
        Ok(CommParams {
            baud,
            data_bits,
            parity,
            stop_bits,
            handshake,
        })
    }
}

/// Byte-level capabilities the reply engine needs from a link.
pub trait Transport {
    /// Writes every byte to the device.
    fn write_all(&mut self, bytes: &[u8]) -> Result<()>;

    /// Returns the next buffered byte, or `None` when the device has
    /// sent nothing new.
    fn try_read_byte(&mut self) -> Result<Option<u8>>;

    /// Pushes buffered output out to the device.
    fn flush(&mut self) -> Result<()>;

    /// Holds a serial break long enough to hardware reset the device.
    fn send_break(&mut self) -> Result<()>;

    /// Reconfigures the host side of the link.
    fn set_params(&mut self, params: CommParams) -> Result<()>;
}
