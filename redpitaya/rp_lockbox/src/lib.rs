//! A rust driver for the Red Pitaya lockbox firmware
//! [rp-lockbox](https://github.com/lmaisenbacher/rp-lockbox), controlled with SCPI commands over
//! TCP/IP.
//!
//! The lockbox has two fast analog inputs and two fast analog outputs. Each output has a
//! signal generator and output limits, see [`Output`]. There are four PID controllers, one for
//! each combination of input and output, see [`Pid`].
//!
//! # Example
//!
//! ```no_run
//! use amodevices::DeviceConfig;
//! use measurements::Voltage;
//! use redpitaya_rp_lockbox::RpLockbox;
//!
//! let config = DeviceConfig::new("Lockbox", "192.168.1.100");
//! let lockbox = RpLockbox::connect(&config).unwrap();
//!
//! let mut pid = lockbox.get_pid(1, 2).unwrap();
//! pid.set_setpoint(Voltage::from_volts(0.1)).unwrap();
//! pid.set_kp(20.0).unwrap();
//! pid.set_hold_state(false).unwrap();
//!
//! let mut out = lockbox.get_output(2).unwrap();
//! println!("Output 2: {} V", out.get_fast_analog_output().unwrap().as_volts());
//! ```

#![warn(missing_docs)]

mod output;
mod pid;

use std::{
    net::TcpStream,
    sync::{Arc, Mutex},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use amodevices::{DeviceConfig, Instrument, InstrumentError, InstrumentInterface, TcpIpInterface};

pub use output::{Output, Waveform};
pub use pid::{Pid, RELOCK_INPUTS};

/// Terminator of commands and responses.
pub const TERMINATOR: &str = "\r\n";

/// Number of fast analog inputs and outputs.
pub const NOF_CHANNELS: u8 = 2;

fn default_port() -> u16 {
    5000
}

fn default_timeout() -> f64 {
    1.0
}

/// SCPI server settings, read from `SCPIConnectionParams` in the device specific parameters.
///
/// ```json
/// {"SCPIConnectionParams": {"Port": 5000, "Timeout": 1.0}}
/// ```
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ScpiConnectionParams {
    /// TCP port of the SCPI server.
    #[serde(rename = "Port", default = "default_port")]
    pub port: u16,
    /// Timeout in seconds, used if no `Timeout` is given in the device configuration.
    #[serde(rename = "Timeout", default = "default_timeout")]
    pub timeout_secs: f64,
}

impl Default for ScpiConnectionParams {
    fn default() -> Self {
        Self {
            port: default_port(),
            timeout_secs: default_timeout(),
        }
    }
}

#[derive(Deserialize, Default)]
struct LockboxParams {
    #[serde(rename = "SCPIConnectionParams", default)]
    scpi: ScpiConnectionParams,
}

/// A rust driver for the Red Pitaya lockbox.
pub struct RpLockbox<T: InstrumentInterface> {
    interface: Arc<Mutex<T>>,
    name: String,
}

impl<T: InstrumentInterface> RpLockbox<T> {
    /// Create a new lockbox instance with an already opened interface.
    ///
    /// The terminator of the interface is set to `"\r\n"`.
    pub fn try_new(interface: T) -> Result<Self, InstrumentError> {
        let mut intf = interface;
        intf.set_terminator(TERMINATOR);
        Ok(RpLockbox {
            interface: Arc::new(Mutex::new(intf)),
            name: "Red Pitaya lockbox".to_string(),
        })
    }

    /// Set the name of the device used in log messages.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Get a handle to fast analog output 1 or 2, with its signal generator.
    pub fn get_output(&self, output: u8) -> Result<Output<T>, InstrumentError> {
        check_channel(output)?;
        Ok(Output::new(self.interface.clone(), output))
    }

    /// Get a handle to the PID controller from fast analog input `input` to output `output`,
    /// both 1 or 2.
    pub fn get_pid(&self, input: u8, output: u8) -> Result<Pid<T>, InstrumentError> {
        check_channel(input)?;
        check_channel(output)?;
        Ok(Pid::new(self.interface.clone(), input, output))
    }

    /// Save the lockbox configuration to the SD card.
    pub fn save_config(&mut self) -> Result<(), InstrumentError> {
        self.sendcmd("LOCK:CONF:SAVE")
    }

    /// Load the lockbox configuration from the SD card.
    pub fn load_config(&mut self) -> Result<(), InstrumentError> {
        self.sendcmd("LOCK:CONF:LOAD")
    }

    /// Close the connection to the lockbox.
    pub fn close(self) {
        info!("{}: Connection closed", self.name);
    }

    fn sendcmd(&mut self, cmd: &str) -> Result<(), InstrumentError> {
        let mut intf = self.interface.lock().expect("Mutex should not be poisoned");
        intf.sendcmd(cmd)
    }
}

impl<T: InstrumentInterface> Clone for RpLockbox<T> {
    fn clone(&self) -> Self {
        Self {
            interface: self.interface.clone(),
            name: self.name.clone(),
        }
    }
}

impl RpLockbox<Instrument<TcpStream>> {
    /// Connect to the SCPI server of the lockbox at the host name given as address in the
    /// configuration.
    ///
    /// The port and the fallback timeout are taken from [`ScpiConnectionParams`], default to
    /// port 5000 and 1 s.
    pub fn connect(config: &DeviceConfig) -> Result<Self, InstrumentError> {
        let params: LockboxParams = config.device_specific_params()?;
        let timeout_secs = config.timeout_secs.unwrap_or(params.scpi.timeout_secs);
        let timeout = Duration::try_from_secs_f64(timeout_secs).map_err(|_| {
            InstrumentError::InvalidArgument(format!(
                "{}: Invalid timeout of {timeout_secs} s",
                config.device
            ))
        })?;
        let interface =
            TcpIpInterface::with_timeout((config.address.as_str(), params.scpi.port), timeout)
                .map_err(|err| {
                    let err = InstrumentError::ConnectionFailed {
                        device: config.device.clone(),
                        reason: format!(
                            "Failed to connect to {}:{}: {err}",
                            config.address, params.scpi.port
                        ),
                    };
                    error!("{err}");
                    err
                })?;
        let lockbox = Self::try_new(interface)?.with_name(&config.device);
        info!("{}: Connection opened", lockbox.name);
        Ok(lockbox)
    }
}

fn check_channel(channel: u8) -> Result<(), InstrumentError> {
    if !(1..=NOF_CHANNELS).contains(&channel) {
        return Err(InstrumentError::ChannelIndexOutOfRange {
            idx: channel.into(),
            nof_channels: NOF_CHANNELS.into(),
        });
    }
    Ok(())
}
