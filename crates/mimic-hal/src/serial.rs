//! UART link to the servo microcontroller.

use std::io::{self, ErrorKind, Write};
use std::time::Duration;

use mimic_types::MimicError;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, info, instrument};

use crate::transport::Transport;

/// Parameters for opening a [`SerialTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct SerialSettings {
    /// Device path, e.g. `/dev/ttyUSB0` or `COM3`.
    pub path: String,
    pub baud_rate: u32,
    /// Upper bound on how long a single command write may block.
    pub write_timeout: Duration,
    /// Pause after opening. Most Arduino-class boards reset when the port is
    /// opened and drop anything sent before the bootloader hands over.
    pub settle_delay: Duration,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            path: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            write_timeout: Duration::from_secs(1),
            settle_delay: Duration::from_secs(2),
        }
    }
}

/// [`Transport`] backed by a serial port (8N1, no flow control).
pub struct SerialTransport {
    path: String,
    write_timeout: Duration,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialTransport {
    /// Open the port described by `settings` and wait out its settle delay.
    ///
    /// # Errors
    ///
    /// Returns [`MimicError::TransportOpen`] if the device cannot be opened.
    #[instrument(skip_all, fields(path = %settings.path, baud = settings.baud_rate))]
    pub fn open(settings: &SerialSettings) -> Result<Self, MimicError> {
        let port = serialport::new(&settings.path, settings.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(settings.write_timeout)
            .open()
            .map_err(|e| MimicError::TransportOpen {
                transport: settings.path.clone(),
                details: e.to_string(),
            })?;

        info!("opened serial port");

        if !settings.settle_delay.is_zero() {
            debug!(delay_ms = settings.settle_delay.as_millis() as u64, "waiting for controller reset");
            std::thread::sleep(settings.settle_delay);
        }

        Ok(Self {
            path: settings.path.clone(),
            write_timeout: settings.write_timeout,
            port: Some(port),
        })
    }
}

impl Transport for SerialTransport {
    fn id(&self) -> &str {
        &self.path
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), MimicError> {
        let port = self.port.as_mut().ok_or_else(|| MimicError::TransportWrite {
            transport: self.path.clone(),
            details: "port already closed".to_string(),
        })?;

        port.write_all(bytes)
            .and_then(|()| port.flush())
            .map_err(|e| map_write_error(&self.path, self.write_timeout, e))
    }

    fn close(&mut self) -> Result<(), MimicError> {
        if self.port.take().is_some() {
            info!(path = %self.path, "closed serial port");
        }
        Ok(())
    }
}

/// A timed-out write becomes [`MimicError::TransportTimeout`]; every other
/// I/O error is a [`MimicError::TransportWrite`].
fn map_write_error(path: &str, timeout: Duration, err: io::Error) -> MimicError {
    match err.kind() {
        ErrorKind::TimedOut => MimicError::TransportTimeout {
            transport: path.to_string(),
            waited_ms: timeout.as_millis() as u64,
        },
        _ => MimicError::TransportWrite {
            transport: path.to_string(),
            details: err.to_string(),
        },
    }
}
