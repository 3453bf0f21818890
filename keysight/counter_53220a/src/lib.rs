//! A rust driver for the Keysight 53220A universal frequency counter, controlled through VISA.
//!
//! The two inputs are accessed via [`Counter53220a::input`], the gate settings via
//! [`Counter53220a::gate`].
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use amodevices::{DeviceConfig, InstrumentError, VisaResourceManager};
//! use keysight_counter_53220a::{Counter53220a, Slope};
//! use measurements::Voltage;
//!
//! fn run<M: VisaResourceManager>(rm: &mut M) -> Result<(), InstrumentError> {
//!     let config = DeviceConfig::new("Counter", "USB0::0x0957::0x1807::MY5912345::INSTR");
//!     let mut inst = Counter53220a::connect(rm, &config)?;
//!
//!     let mut inp = inst.input(1)?;
//!     inp.set_level(Voltage::from_volts(0.1))?;
//!     inp.set_noise_reject(true)?;
//!     inst.gate().set_slope(Slope::Positive)?;
//!     inst.set_totalize_gate_time(Duration::from_secs(1))?;
//!     println!("Counts: {}", inst.get_totalize_data()?);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use measurements::Voltage;
use tracing::info;

use amodevices::{
    DeviceConfig, InstrumentError, InstrumentInterface, VisaInterface, VisaResourceManager,
    convert::{to_bool, to_float},
};

/// Slope of the gate start trigger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slope {
    /// Rising edge.
    Positive,
    /// Falling edge.
    Negative,
}

impl Slope {
    fn as_str(&self) -> &'static str {
        match self {
            Slope::Positive => "POS",
            Slope::Negative => "NEG",
        }
    }

    fn from_cmd_str(resp: &str) -> Result<Self, InstrumentError> {
        let resp_upper = resp.to_ascii_uppercase();
        if resp_upper.starts_with("POS") {
            Ok(Slope::Positive)
        } else if resp_upper.starts_with("NEG") {
            Ok(Slope::Negative)
        } else {
            Err(InstrumentError::ResponseParseError(resp.to_string()))
        }
    }
}

/// A rust driver for the 53220A.
pub struct Counter53220a<T: InstrumentInterface> {
    interface: Arc<Mutex<T>>,
    name: String,
}

impl<T: InstrumentInterface> Counter53220a<T> {
    /// Create a new counter instance with an already opened interface.
    pub fn try_new(interface: T) -> Result<Self, InstrumentError> {
        let mut intf = interface;
        intf.set_terminator("\n");
        Ok(Counter53220a {
            interface: Arc::new(Mutex::new(intf)),
            name: "Keysight 53220A".to_string(),
        })
    }

    /// Set the name of the device used in log messages.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Get a handle to input 1 or 2.
    pub fn input(&self, channel: u8) -> Result<Input<T>, InstrumentError> {
        if !(1..=2).contains(&channel) {
            return Err(InstrumentError::ChannelIndexOutOfRange {
                idx: channel.into(),
                nof_channels: 2,
            });
        }
        Ok(Input {
            interface: self.interface.clone(),
            channel,
        })
    }

    /// Get a handle to the gate settings.
    pub fn gate(&self) -> Gate<T> {
        Gate {
            interface: self.interface.clone(),
        }
    }

    /// Get the number of events recorded by the totalize measurement.
    pub fn get_totalize_data(&mut self) -> Result<f64, InstrumentError> {
        to_float(&query(&self.interface, ":TOTalize:DATA?")?)
    }

    /// Get the gate time of totalize measurements.
    pub fn get_totalize_gate_time(&mut self) -> Result<Duration, InstrumentError> {
        to_duration(&query(&self.interface, ":TOTalize:GATE:TIME?")?)
    }

    /// Set the gate time of totalize measurements.
    pub fn set_totalize_gate_time(&mut self, time: Duration) -> Result<(), InstrumentError> {
        write(
            &self.interface,
            &format!(":TOTalize:GATE:TIME {}", time.as_secs_f64()),
        )
    }

    /// Close the connection to the counter.
    pub fn close(self) {
        info!("{}: Connection closed", self.name);
    }
}

impl<T: InstrumentInterface> Clone for Counter53220a<T> {
    fn clone(&self) -> Self {
        Self {
            interface: self.interface.clone(),
            name: self.name.clone(),
        }
    }
}

impl<R: InstrumentInterface> Counter53220a<VisaInterface<R>> {
    /// Connect to the counter at the VISA resource named in the configuration.
    pub fn connect<M>(rm: &mut M, config: &DeviceConfig) -> Result<Self, InstrumentError>
    where
        M: VisaResourceManager<Resource = R>,
    {
        let interface = VisaInterface::init(rm, config)?;
        Ok(Self::try_new(interface)?.with_name(&config.device))
    }
}

/// Handle to one input of the counter.
pub struct Input<T: InstrumentInterface> {
    interface: Arc<Mutex<T>>,
    channel: u8,
}

impl<T: InstrumentInterface> Input<T> {
    /// Get the trigger level.
    pub fn get_level(&mut self) -> Result<Voltage, InstrumentError> {
        let resp = query(&self.interface, &format!("INPut{}:LEVel?", self.channel))?;
        Ok(Voltage::from_volts(to_float(&resp)?))
    }

    /// Set the trigger level.
    pub fn set_level(&mut self, level: Voltage) -> Result<(), InstrumentError> {
        write(
            &self.interface,
            &format!("INPut{}:LEVel {}", self.channel, level.as_volts()),
        )
    }

    /// Is the noise rejection (hysteresis) of the input enabled?
    pub fn get_noise_reject(&mut self) -> Result<bool, InstrumentError> {
        to_bool(&query(
            &self.interface,
            &format!("INPut{}:NREject?", self.channel),
        )?)
    }

    /// Enable or disable the noise rejection (hysteresis) of the input.
    pub fn set_noise_reject(&mut self, state: bool) -> Result<(), InstrumentError> {
        let state = if state { "ON" } else { "OFF" };
        write(
            &self.interface,
            &format!("INPut{}:NREject {state}", self.channel),
        )
    }
}

/// Handle to the gate settings of the counter.
pub struct Gate<T: InstrumentInterface> {
    interface: Arc<Mutex<T>>,
}

impl<T: InstrumentInterface> Gate<T> {
    /// Get the slope of the gate start trigger.
    pub fn get_slope(&mut self) -> Result<Slope, InstrumentError> {
        Slope::from_cmd_str(&query(&self.interface, ":GATE:STARt:SLOPe?")?)
    }

    /// Set the slope of the gate start trigger.
    pub fn set_slope(&mut self, slope: Slope) -> Result<(), InstrumentError> {
        write(
            &self.interface,
            &format!(":GATE:STARt:SLOPe {}", slope.as_str()),
        )
    }

    /// Get the delay between gate start trigger and gate start.
    pub fn get_delay(&mut self) -> Result<Duration, InstrumentError> {
        to_duration(&query(&self.interface, ":GATE:STARt:DELay:TIME?")?)
    }

    /// Set the delay between gate start trigger and gate start.
    pub fn set_delay(&mut self, delay: Duration) -> Result<(), InstrumentError> {
        write(
            &self.interface,
            &format!(":GATE:STARt:DELay:TIME {}", delay.as_secs_f64()),
        )
    }
}

fn write<T: InstrumentInterface>(
    interface: &Arc<Mutex<T>>,
    cmd: &str,
) -> Result<(), InstrumentError> {
    let mut intf = interface.lock().expect("Mutex should not be poisoned");
    intf.sendcmd(cmd)
}

fn query<T: InstrumentInterface>(
    interface: &Arc<Mutex<T>>,
    cmd: &str,
) -> Result<String, InstrumentError> {
    let mut intf = interface.lock().expect("Mutex should not be poisoned");
    let resp = intf.query(cmd)?;
    if resp.is_empty() {
        return Err(InstrumentError::EmptyResponse);
    }
    Ok(resp)
}

fn to_duration(resp: &str) -> Result<Duration, InstrumentError> {
    Duration::try_from_secs_f64(to_float(resp)?)
        .map_err(|_| InstrumentError::ResponseParseError(resp.to_string()))
}
