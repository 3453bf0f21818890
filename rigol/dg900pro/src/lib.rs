//! A rust driver for the Rigol DG800 Pro/DG900 Pro function generators, controlled through VISA.
//!
//! # Example
//!
//! ```no_run
//! use amodevices::{DeviceConfig, InstrumentError, VisaResourceManager};
//! use measurements::Frequency;
//! use rigol_dg900pro::Dg900Pro;
//!
//! fn run<M: VisaResourceManager>(rm: &mut M) -> Result<(), InstrumentError> {
//!     let config = DeviceConfig::new("Function generator", "USB0::0x1AB1::0x0643::DG9A1234::INSTR");
//!     let inst = Dg900Pro::connect(rm, &config)?;
//!     let mut ch2 = inst.get_channel(2)?;
//!     ch2.set_frequency(Frequency::from_hertz(10e6))?;
//!     println!("{}", ch2.get_frequency()?);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

use std::sync::{Arc, Mutex};

use measurements::Frequency;
use tracing::info;

use amodevices::{
    DeviceConfig, InstrumentError, InstrumentInterface, VisaInterface, VisaResourceManager,
    convert::to_float,
};

/// A rust driver for the DG900 Pro.
pub struct Dg900Pro<T: InstrumentInterface> {
    interface: Arc<Mutex<T>>,
    name: String,
}

impl<T: InstrumentInterface> Dg900Pro<T> {
    /// Create a new function generator instance with an already opened interface.
    pub fn try_new(interface: T) -> Result<Self, InstrumentError> {
        let mut intf = interface;
        intf.set_terminator("\n");
        Ok(Dg900Pro {
            interface: Arc::new(Mutex::new(intf)),
            name: "Rigol DG900 Pro".to_string(),
        })
    }

    /// Set the name of the device used in log messages.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Get a handle to output channel 1 or 2.
    pub fn get_channel(&self, channel: u8) -> Result<Channel<T>, InstrumentError> {
        if !(1..=2).contains(&channel) {
            return Err(InstrumentError::ChannelIndexOutOfRange {
                idx: channel.into(),
                nof_channels: 2,
            });
        }
        Ok(Channel {
            interface: self.interface.clone(),
            channel,
        })
    }

    /// Close the connection to the function generator.
    pub fn close(self) {
        info!("{}: Connection closed", self.name);
    }
}

impl<T: InstrumentInterface> Clone for Dg900Pro<T> {
    fn clone(&self) -> Self {
        Self {
            interface: self.interface.clone(),
            name: self.name.clone(),
        }
    }
}

impl<R: InstrumentInterface> Dg900Pro<VisaInterface<R>> {
    /// Connect to the function generator at the VISA resource named in the configuration.
    pub fn connect<M>(rm: &mut M, config: &DeviceConfig) -> Result<Self, InstrumentError>
    where
        M: VisaResourceManager<Resource = R>,
    {
        let interface = VisaInterface::init(rm, config)?;
        Ok(Self::try_new(interface)?.with_name(&config.device))
    }
}

/// Handle to one output channel of the function generator.
pub struct Channel<T: InstrumentInterface> {
    interface: Arc<Mutex<T>>,
    channel: u8,
}

impl<T: InstrumentInterface> Channel<T> {
    /// Number of the channel.
    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// Get the output frequency.
    pub fn get_frequency(&mut self) -> Result<Frequency, InstrumentError> {
        let resp = {
            let mut intf = self.interface.lock().expect("Mutex should not be poisoned");
            intf.query(&format!(":SOUR{}:FREQ?", self.channel))?
        };
        Ok(Frequency::from_hertz(to_float(&resp)?))
    }

    /// Set the output frequency.
    pub fn set_frequency(&mut self, freq: Frequency) -> Result<(), InstrumentError> {
        let mut intf = self.interface.lock().expect("Mutex should not be poisoned");
        intf.sendcmd(&format!(":SOUR{}:FREQ {}", self.channel, freq.as_hertz()))
    }
}
