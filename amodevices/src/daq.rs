//! Minimal abstraction of a data acquisition (DAQ) system with analog input and output tasks.
//!
//! Drivers that sit on top of DAQ hardware (e.g., National Instruments modules) are written
//! against the [`DaqSystem`] and [`DaqTask`] traits. A task groups a number of physical channels
//! that are read or written together, one sample per channel at a time or in batches.
//!
//! For testing, see [`LoopbackDaqSystem`](crate::LoopbackDaqSystem).

use std::time::Duration;

use thiserror::Error;

use crate::InstrumentError;

/// Errors reported by a DAQ backend.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum DaqError {
    /// The device cannot be accessed (anymore), e.g., because it was unplugged or reserved by
    /// another process.
    #[error("DAQ device cannot be accessed: {0}")]
    DeviceNotAccessible(String),
    /// Any other error reported by the DAQ driver.
    #[error("DAQ driver error {code}: {message}")]
    Driver {
        /// Error code of the driver.
        code: i64,
        /// Error message of the driver.
        message: String,
    },
}

impl From<DaqError> for InstrumentError {
    fn from(err: DaqError) -> Self {
        match err {
            DaqError::DeviceNotAccessible(msg) => {
                InstrumentError::NotConnected(format!("DAQ device cannot be accessed: {msg}"))
            }
            DaqError::Driver { code, message } => InstrumentError::Vendor { code, message },
        }
    }
}

/// Samples read from an analog input task, grouped by channel.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnalogSamples {
    /// One vector of samples per channel, in the order the channels were added to the task.
    pub data: Vec<Vec<f64>>,
    /// Number of samples per channel that were actually read.
    pub samples_per_channel_read: usize,
}

impl AnalogSamples {
    /// Create samples from data grouped by channel.
    ///
    /// The number of samples read is taken from the first channel.
    pub fn new(data: Vec<Vec<f64>>) -> Self {
        let samples_per_channel_read = data.first().map(|ch| ch.len()).unwrap_or_default();
        Self {
            data,
            samples_per_channel_read,
        }
    }

    /// Mean value of each channel. Channels without samples yield NaN.
    pub fn channel_means(&self) -> Vec<f64> {
        self.data
            .iter()
            .map(|ch| {
                if ch.is_empty() {
                    f64::NAN
                } else {
                    ch.iter().sum::<f64>() / ch.len() as f64
                }
            })
            .collect()
    }
}

/// A DAQ task that groups physical channels.
pub trait DaqTask {
    /// Add an analog input voltage channel with the given voltage range.
    fn add_ai_voltage_channel(
        &mut self,
        physical_channel: &str,
        min_val: f64,
        max_val: f64,
    ) -> Result<(), DaqError>;

    /// Add an analog output voltage channel with the given voltage range.
    fn add_ao_voltage_channel(
        &mut self,
        physical_channel: &str,
        min_val: f64,
        max_val: f64,
    ) -> Result<(), DaqError>;

    /// Start the task.
    fn start(&mut self) -> Result<(), DaqError>;

    /// Read the given number of samples per channel from all input channels of the task.
    fn read_analog(
        &mut self,
        samples_per_channel: usize,
        timeout: Duration,
    ) -> Result<AnalogSamples, DaqError>;

    /// Write one sample to each output channel of the task, in the order the channels were
    /// added. Returns the number of samples per channel that were written.
    fn write_analog(&mut self, values: &[f64], timeout: Duration) -> Result<usize, DaqError>;

    /// Stop the task.
    fn stop(&mut self) -> Result<(), DaqError>;

    /// Clear the task and release its resources.
    fn clear(&mut self) -> Result<(), DaqError>;
}

/// A DAQ system that creates tasks.
pub trait DaqSystem {
    /// The task type of this system.
    type Task: DaqTask;

    /// Create a new, empty task with the given name.
    fn create_task(&mut self, name: &str) -> Result<Self::Task, DaqError>;
}
