//! Rust drivers for National Instruments DAQ modules that set and read static analog voltages.
//!
//! Two drivers are provided:
//!
//! - [`NiDaq`]: Generic analog outputs. Each configured axis is mapped to one physical AO
//!   channel with a 0 V to 10 V range.
//! - [`Ni9264Ni9205`]: A fixed pairing of an NI 9264 output module and an NI 9205 input module.
//!   The axes x, y, z, and g are output on `ao8` to `ao11`, the axes x, y, and z are read back
//!   on `ai18` to `ai20`, all with a 0 V to 5 V range.
//!
//! Every channel gets its own task. The DAQ hardware itself is reached through the
//! [`DaqSystem`](amodevices::daq::DaqSystem) trait.
//!
//! # Example
//!
//! ```no_run
//! use amodevices::{DeviceConfig, InstrumentError, daq::DaqSystem};
//! use measurements::Voltage;
//! use ni_daq::NiDaq;
//!
//! fn run<S: DaqSystem>(system: S, config: &DeviceConfig) -> Result<(), InstrumentError> {
//!     let daq = NiDaq::from_config(system, config)?;
//!     daq.connect()?;
//!     daq.set_voltage("x", Voltage::from_volts(1.5))?;
//!     println!("x: {} V", daq.voltage("x")?.as_volts());
//!     daq.close()
//! }
//! ```

#![warn(missing_docs)]

mod analog_output;
mod ni9264_ni9205;
mod task;

pub use analog_output::{AO_RANGE, NiDaq, NiDaqParams};
pub use ni9264_ni9205::{Axis, NI9264_NI9205_RANGE, Ni9264Ni9205, Ni9264Ni9205Params};
