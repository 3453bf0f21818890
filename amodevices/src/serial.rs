//! This module provides the implementation for a device controlled via a serial port.
//!
//! It includes a blocking implementation of the [`InstrumentInterface`](crate::InstrumentInterface)
//! trait using the `serialport` crate.

use std::time::Duration;

use serialport::{SerialPort, SerialPortBuilder};
use tracing::{error, info};

use crate::{DeviceConfig, Instrument, InstrumentError};

/// An interface on an open serial port, as returned by all [`SerialInterface`] constructors.
pub type SerialInstrument = Instrument<Box<dyn SerialPort>>;

/// A blocking serial port interface builder using the `serialport` crate.
#[derive(Debug)]
pub struct SerialInterface {}

impl SerialInterface {
    /// Open a serial port with the given baud rate, 8N1, and a timeout of three seconds.
    ///
    /// # Arguments
    /// * `port` - The name of the serial port, e.g., `"/dev/ttyUSB0"` or `"COM3"`.
    /// * `baud` - The baud rate.
    pub fn simple(port: &str, baud: u32) -> Result<SerialInstrument, InstrumentError> {
        let spb = serialport::new(port, baud).timeout(Duration::from_secs(3));
        Self::full(spb)
    }

    /// Open a serial port from a fully configured [`SerialPortBuilder`].
    ///
    /// The read timeout of the returned interface is the timeout of the builder.
    pub fn full(spb: SerialPortBuilder) -> Result<SerialInstrument, InstrumentError> {
        let port = spb.open()?;
        let timeout = port.timeout();
        Ok(Instrument::new(port, timeout))
    }

    /// Open the serial port described by a device configuration.
    ///
    /// The port name is taken from `Address`, the timeout from `Timeout`, and the framing from
    /// `SerialConnectionParams` (9600 8N1 if absent). If the port cannot be opened, a
    /// [`InstrumentError::ConnectionFailed`] naming the device is returned.
    pub fn from_config(
        config: &DeviceConfig,
    ) -> Result<SerialInstrument, InstrumentError> {
        let params = config.serial.clone().unwrap_or_default();
        let spb = serialport::new(&config.address, params.baudrate)
            .timeout(config.timeout())
            .data_bits(params.data_bits()?)
            .stop_bits(params.stop_bits()?)
            .parity(params.parity.into());
        let port = spb.open().map_err(|err| {
            error!(device = %config.device, address = %config.address, "{err}");
            InstrumentError::ConnectionFailed {
                device: config.device.clone(),
                reason: format!("serial port '{}': {err}", config.address),
            }
        })?;
        info!(
            "{}: Opened serial connection on port '{}'",
            config.device, config.address
        );
        Ok(Instrument::new(port, config.timeout()))
    }
}
