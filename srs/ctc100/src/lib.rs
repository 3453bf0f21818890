//! A rust driver for the Stanford Research Systems CTC100 cryogenic temperature controller.
//!
//! The controller is connected via its USB port, which implements a virtual serial port.
//! Commands are terminated with `"\n"`, responses with `"\r\n"`. Channels are addressed by
//! their (user configurable) names, e.g., `"In1"` or `"Out1"`. Values are returned in the units
//! the controller is configured to, which are assumed to be kelvin and watt.
//!
//! # Example
//!
//! ```no_run
//! use amodevices::DeviceConfig;
//! use srs_ctc100::Ctc100;
//!
//! let config = DeviceConfig::new("SRS CTC100", "COM7");
//! let mut inst = Ctc100::from_config(&config).unwrap();
//!
//! println!("Cold plate: {}", inst.read_temperature("Tcold").unwrap());
//! println!("Heater: {}", inst.read_heater_power("Heater").unwrap());
//! ```

#![warn(missing_docs)]

use std::sync::{Arc, Mutex};

use measurements::{Power, Temperature};
use tracing::info;

use amodevices::{
    DeviceConfig, InstrumentError, InstrumentInterface, SerialInstrument, SerialInterface,
    convert::to_float,
};

/// A rust driver for the CTC100.
pub struct Ctc100<T: InstrumentInterface> {
    interface: Arc<Mutex<T>>,
    name: String,
}

impl<T: InstrumentInterface> Ctc100<T> {
    /// Create a new CTC100 instance with the given interface.
    ///
    /// The read terminator of the interface is set to `"\r\n"`.
    pub fn try_new(interface: T) -> Result<Self, InstrumentError> {
        let mut intf = interface;
        intf.set_terminator("\r\n");
        Ok(Ctc100 {
            interface: Arc::new(Mutex::new(intf)),
            name: "SRS CTC100".to_string(),
        })
    }

    /// Set the name of the device used in log messages.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Write a command to the controller.
    pub fn write(&mut self, cmd: &str) -> Result<(), InstrumentError> {
        let mut intf = self.interface.lock().expect("Mutex should not be poisoned");
        intf.write(&format!("{cmd}\n"))
    }

    /// Query the controller and return the response.
    ///
    /// A response that is not terminated by `"\r\n"` within the timeout fails with
    /// [`InstrumentError::TimeoutQuery`], an empty one with [`InstrumentError::EmptyResponse`].
    pub fn query(&mut self, cmd: &str) -> Result<String, InstrumentError> {
        let resp = {
            let mut intf = self.interface.lock().expect("Mutex should not be poisoned");
            intf.write(&format!("{cmd}\n"))?;
            intf.read_until_terminator().map_err(|err| match err {
                InstrumentError::Timeout(timeout) => InstrumentError::TimeoutQuery {
                    query: cmd.to_string(),
                    timeout,
                },
                err => err,
            })?
        };
        if resp.is_empty() {
            return Err(InstrumentError::EmptyResponse);
        }
        Ok(resp)
    }

    /// Read the temperature of the channel with the given name.
    pub fn read_temperature(&mut self, name: &str) -> Result<Temperature, InstrumentError> {
        let resp = self.query(&format!("{name}?"))?;
        Ok(Temperature::from_kelvin(to_float(&resp)?))
    }

    /// Read the PID temperature setpoint of the channel with the given name.
    pub fn read_pid_setpoint(&mut self, name: &str) -> Result<Temperature, InstrumentError> {
        let resp = self.query(&format!("{name}.PID.Setpoint?"))?;
        Ok(Temperature::from_kelvin(to_float(&resp)?))
    }

    /// Read the power of the heater output with the given name.
    pub fn read_heater_power(&mut self, name: &str) -> Result<Power, InstrumentError> {
        let resp = self.query(&format!("{name}?"))?;
        Ok(Power::from_watts(to_float(&resp)?))
    }

    /// Send any query and convert its response to a float.
    pub fn query_custom_command(&mut self, cmd: &str) -> Result<f64, InstrumentError> {
        let resp = self.query(cmd)?;
        to_float(&resp)
    }

    /// Close the connection to the controller.
    pub fn close(self) {
        info!("{}: Connection closed", self.name);
    }
}

impl<T: InstrumentInterface> Clone for Ctc100<T> {
    fn clone(&self) -> Self {
        Self {
            interface: self.interface.clone(),
            name: self.name.clone(),
        }
    }
}

impl Ctc100<SerialInstrument> {
    /// Open the controller on the serial port described by a device configuration.
    pub fn from_config(config: &DeviceConfig) -> Result<Self, InstrumentError> {
        let interface = SerialInterface::from_config(config)?;
        Ok(Self::try_new(interface)?.with_name(&config.device))
    }
}
