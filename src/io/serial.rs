//! Serial port transport implementation
//!
//! Wraps a system serial port behind the [`Transport`] trait. Ports
//! open at the power-on settings every supported device wakes up
//! with: 9600 baud, 8 data bits, no parity, one stop bit, no
//! handshaking.

use std::io::{Read, Write};
use std::thread;
use std::time::Duration;

use serialport::{DataBits, FlowControl, SerialPort, StopBits};

use crate::error::Result;
use crate::io::transport::{CommParams, Parity, Transport};

/// How long a serial break is held.
const BREAK_HOLD: Duration = Duration::from_millis(250);

/// Read timeout for individual byte reads.
///
/// Short because the reply reader polls; it only bounds the rare case
/// where a byte count was reported but the read still stalls.
const READ_TIMEOUT: Duration = Duration::from_millis(50);

/// Serial port transport.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Opens a serial port at the device power-on settings.
    ///
    /// # Arguments
    ///
    /// * `path` - Port name (e.g. "/dev/ttyUSB0" or "COM4")
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use ndicapi_rust::io::SerialTransport;
    ///
    /// let transport = SerialTransport::open("/dev/ttyUSB0")?;
    /// # Ok::<(), ndicapi_rust::error::NdiError>(())
    /// ```
    pub fn open(path: &str) -> Result<Self> {
        let defaults = CommParams::DEFAULT;
        let port = serialport::new(path, defaults.baud)
            .data_bits(DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(READ_TIMEOUT)
            .open()?;
        tracing::debug!(path, "Opened serial port");
        Ok(SerialTransport { port })
    }
}

impl Transport for SerialTransport {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.port.write_all(bytes)?;
        Ok(())
    }

    fn try_read_byte(&mut self) -> Result<Option<u8>> {
        if self.port.bytes_to_read()? == 0 {
            return Ok(None);
        }
        let mut byte = [0u8; 1];
        self.port.read_exact(&mut byte)?;
        Ok(Some(byte[0]))
    }

    fn flush(&mut self) -> Result<()> {
        self.port.flush()?;
        Ok(())
    }

    fn send_break(&mut self) -> Result<()> {
        self.port.set_break()?;
        thread::sleep(BREAK_HOLD);
        self.port.clear_break()?;
        tracing::debug!("Sent serial break");
        Ok(())
    }

    fn set_params(&mut self, params: CommParams) -> Result<()> {
        self.port.set_baud_rate(params.baud)?;
        self.port.set_data_bits(host_data_bits(params.data_bits))?;
        self.port.set_parity(host_parity(params.parity))?;
        self.port.set_stop_bits(host_stop_bits(params.stop_bits))?;
        self.port.set_flow_control(host_flow_control(params.handshake))?;
        tracing::debug!(
            baud = params.baud,
            data_bits = params.data_bits,
            stop_bits = params.stop_bits,
            handshake = params.handshake,
            "Reconfigured serial port"
        );
        Ok(())
    }
}

fn host_data_bits(bits: u8) -> DataBits {
    match bits {
        7 => DataBits::Seven,
        _ => DataBits::Eight,
    }
}

fn host_parity(parity: Parity) -> serialport::Parity {
    match parity {
        Parity::None => serialport::Parity::None,
        Parity::Odd => serialport::Parity::Odd,
        Parity::Even => serialport::Parity::Even,
    }
}

fn host_stop_bits(bits: u8) -> StopBits {
    match bits {
        2 => StopBits::Two,
        _ => StopBits::One,
    }
}

fn host_flow_control(handshake: bool) -> FlowControl {
    if handshake {
        FlowControl::Hardware
    } else {
        FlowControl::None
    }
}
