//! A rust driver for the KJLC Carbon XCG pressure gauge controller.
//!
//! The controller is an Arduino that digitizes the analog output of the gauge and answers
//! address-prefixed queries over a serial port, using nearly the same protocol as the KJLC 352
//! and 354 ion gauge controllers: a query `#<addr><cmd>\r` is answered with `*<addr> <value>\r`,
//! an error with a response starting with `?`.
//!
//! # Example
//!
//! ```no_run
//! use amodevices::SerialInterface;
//! use kjlc_xcg::Xcg;
//!
//! let port = "/dev/ttyACM0";
//! let baud = 9600;
//!
//! let serial_inst = SerialInterface::simple(port, baud).unwrap();
//! let mut inst = Xcg::try_new(serial_inst, 1).unwrap();
//!
//! let pressure = inst.read_pressure().unwrap();
//! println!("Pressure: {} Torr", pressure.as_pascals() / kjlc_xcg::PA_PER_TORR);
//! ```

#![warn(missing_docs)]

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use measurements::Pressure;
use serde::Deserialize;
use tracing::info;

use amodevices::{
    ChannelConfig, DeviceConfig, InstrumentError, InstrumentInterface, SerialInstrument,
    SerialInterface,
};

/// Pascal per Torr, the unit the controller reports pressures in.
pub const PA_PER_TORR: f64 = 133.32236842;

/// Parameters in `DeviceSpecificParams` of the device configuration.
#[derive(Debug, Deserialize)]
struct XcgParams {
    #[serde(rename = "InternalAddress")]
    internal_address: u8,
}

/// A rust driver for the KJLC Carbon XCG controller.
pub struct Xcg<T: InstrumentInterface> {
    interface: Arc<Mutex<T>>,
    name: String,
    internal_address: u8,
    channels: BTreeMap<String, ChannelConfig>,
}

impl<T: InstrumentInterface> Xcg<T> {
    /// Create a new controller instance with the given interface and internal address.
    ///
    /// The terminator of the interface is set to `"\r"`. No communication happens here.
    ///
    /// # Arguments
    /// - `interface`: An interface that implements the `InstrumentInterface` trait.
    /// - `internal_address`: The address the controller answers to.
    pub fn try_new(interface: T, internal_address: u8) -> Result<Self, InstrumentError> {
        let mut intf = interface;
        intf.set_terminator("\r");
        Ok(Xcg {
            interface: Arc::new(Mutex::new(intf)),
            name: "KJLC XCG".to_string(),
            internal_address,
            channels: BTreeMap::new(),
        })
    }

    /// Set the name of the device used in error messages.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Set the logical channels that are read by [`Xcg::get_values`].
    pub fn with_channels(mut self, channels: BTreeMap<String, ChannelConfig>) -> Self {
        self.channels = channels;
        self
    }

    /// Get the internal address of the controller.
    pub fn internal_address(&self) -> u8 {
        self.internal_address
    }

    /// Query the controller with a command and return the payload of the response.
    ///
    /// The command is framed as `#<addr><cmd>\r`. The response must start with `*<addr> `,
    /// which is stripped.
    ///
    /// # Errors
    /// - [`InstrumentError::EmptyResponse`] if the response is empty.
    /// - [`InstrumentError::ErrorResponse`] if the response starts with `?`.
    /// - [`InstrumentError::NotAcknowledged`] if the address prefix is missing.
    pub fn query(&mut self, cmd: &str) -> Result<String, InstrumentError> {
        let resp = {
            let mut intf = self.interface.lock().expect("Mutex should not be poisoned");
            intf.query(&format!("#{}{cmd}", self.internal_address))?
        };
        if resp.is_empty() {
            return Err(InstrumentError::EmptyResponse);
        }
        if resp.starts_with('?') {
            return Err(InstrumentError::ErrorResponse(resp));
        }
        match resp.strip_prefix(&format!("*{} ", self.internal_address)) {
            Some(payload) => Ok(payload.trim().to_string()),
            None => Err(InstrumentError::NotAcknowledged(resp)),
        }
    }

    /// Read the pressure.
    pub fn read_pressure(&mut self) -> Result<Pressure, InstrumentError> {
        let resp = self.query("RD")?;
        let torr = resp
            .parse::<f64>()
            .map_err(|_| InstrumentError::ResponseParseError(resp))?;
        Ok(Pressure::from_pascals(torr * PA_PER_TORR))
    }

    /// Read all configured channels.
    ///
    /// Only channels of type `"Pressure"` are supported, any other type fails with an
    /// [`InstrumentError::InvalidArgument`] before anything is read.
    pub fn get_values(&mut self) -> Result<BTreeMap<String, Pressure>, InstrumentError> {
        if let Some((id, chan)) = self
            .channels
            .iter()
            .find(|(_, chan)| chan.channel_type != "Pressure")
        {
            return Err(InstrumentError::InvalidArgument(format!(
                "Unknown channel type '{}' for channel '{id}' of device '{}'",
                chan.channel_type, self.name
            )));
        }
        let ids: Vec<String> = self.channels.keys().cloned().collect();
        let mut readings = BTreeMap::new();
        for id in ids {
            readings.insert(id, self.read_pressure()?);
        }
        Ok(readings)
    }

    /// Close the connection to the controller.
    pub fn close(self) {
        info!("{}: Connection closed", self.name);
    }
}

impl Xcg<SerialInstrument> {
    /// Open the controller described by a device configuration.
    ///
    /// The serial port is opened from `Address`, `Timeout` and `SerialConnectionParams`. The
    /// internal address is read from `DeviceSpecificParams.InternalAddress`, the logical
    /// channels from `Channels`.
    pub fn from_config(config: &DeviceConfig) -> Result<Self, InstrumentError> {
        let params: XcgParams = config.device_specific_params()?;
        let interface = SerialInterface::from_config(config)?;
        Ok(Self::try_new(interface, params.internal_address)?
            .with_name(&config.device)
            .with_channels(config.channels.clone()))
    }
}
