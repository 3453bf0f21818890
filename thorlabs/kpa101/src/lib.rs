//! A Rust driver for the Thorlabs KPA101 beam position aligner.
//!
//! The KPA101 reads a quadrant detector and reports the x and y difference signals, the sum
//! signal, and (for position sensing detectors) the beam position. The Kinesis quad detector
//! library is hidden behind the [`QuadDetectorBackend`] trait.
//!
//! All five readings are taken in a single call to the device and cached together for 0.1 s,
//! such that reading them one after the other only talks to the device once.

#![warn(missing_docs)]

use std::{
    fmt::Display,
    sync::{Arc, Mutex},
    time::Duration,
};

use measurements::{Length, Voltage};
use serde::Deserialize;
use tracing::{debug, error, info};

use amodevices::{CachedReading, DeviceConfig, InstrumentError};

/// Time that a set of readings is reused before the device is read again.
pub const CACHE_INTERVAL: Duration = Duration::from_millis(100);

/// The functions of the Kinesis quad detector library that are used by this driver.
pub trait QuadDetectorBackend {
    /// Open the device with the given serial number.
    fn open(&mut self, serial_number: u32) -> Result<(), InstrumentError>;

    /// Close the device.
    fn close(&mut self) -> Result<(), InstrumentError>;

    /// Read all signals of the detector at once.
    fn get_readings(&mut self) -> Result<QuadReadings, InstrumentError>;

    /// Get the operation mode.
    fn get_operation_mode(&mut self) -> Result<OperationMode, InstrumentError>;

    /// Set the operation mode.
    fn set_operation_mode(&mut self, mode: OperationMode) -> Result<(), InstrumentError>;
}

/// One set of readings of the quadrant detector.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuadReadings {
    /// X-axis difference signal in V.
    pub xdiff: f64,
    /// Y-axis difference signal in V.
    pub ydiff: f64,
    /// Sum signal in V.
    pub sum: f64,
    /// X position in mm.
    pub xpos: f64,
    /// Y position in mm.
    pub ypos: f64,
}

/// Operation mode of the KPA101.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationMode {
    /// Monitor the detector only.
    Monitor,
    /// Output the difference signals to the piezo drivers without feedback.
    OpenLoop,
    /// Feedback loop on the position.
    ClosedLoop,
    /// Switch between open and closed loop depending on the sum signal.
    AutoLoop,
}

impl OperationMode {
    /// Name of the mode as used by the Kinesis library.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationMode::Monitor => "monitor",
            OperationMode::OpenLoop => "open_loop",
            OperationMode::ClosedLoop => "closed_loop",
            OperationMode::AutoLoop => "auto_loop",
        }
    }
}

impl Display for OperationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for OperationMode {
    type Error = InstrumentError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "monitor" => Ok(OperationMode::Monitor),
            "open_loop" => Ok(OperationMode::OpenLoop),
            "closed_loop" => Ok(OperationMode::ClosedLoop),
            "auto_loop" => Ok(OperationMode::AutoLoop),
            _ => Err(InstrumentError::InvalidArgument(format!(
                "Unknown operation mode '{value}'. Valid modes are monitor, open_loop, closed_loop, and auto_loop"
            ))),
        }
    }
}

/// Device specific configuration parameters of the KPA101.
#[derive(Clone, Debug, Deserialize)]
pub struct Kpa101Params {
    /// Serial number of the beam position aligner.
    #[serde(rename = "SerialNumber")]
    pub serial_number: u32,
}

struct Inner<B: QuadDetectorBackend> {
    backend: B,
    connected: bool,
    readings: CachedReading<QuadReadings>,
}

/// Driver for the Thorlabs KPA101 beam position aligner.
pub struct Kpa101<B: QuadDetectorBackend> {
    inner: Arc<Mutex<Inner<B>>>,
    serial_number: u32,
    name: String,
}

impl<B: QuadDetectorBackend> Kpa101<B> {
    /// Create a new driver for the device with the given serial number.
    ///
    /// The connection is not opened, see [`Kpa101::connect`].
    pub fn new(backend: B, serial_number: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                backend,
                connected: false,
                readings: CachedReading::new(CACHE_INTERVAL),
            })),
            serial_number,
            name: format!("Thorlabs KPA101 {serial_number}"),
        }
    }

    /// Create a new driver from a device configuration with the serial number in
    /// `DeviceSpecificParams.SerialNumber`.
    pub fn from_config(backend: B, config: &DeviceConfig) -> Result<Self, InstrumentError> {
        let params: Kpa101Params = config.device_specific_params()?;
        Ok(Self::new(backend, params.serial_number).with_name(&config.device))
    }

    /// Set the name of the device, which is used in log messages.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Serial number of the device.
    pub fn serial_number(&self) -> u32 {
        self.serial_number
    }

    /// Is the connection to the device open?
    pub fn is_connected(&self) -> bool {
        self.inner
            .lock()
            .expect("Mutex should not be poisoned")
            .connected
    }

    /// Open the connection to the device and take a first set of readings.
    pub fn connect(&self) -> Result<(), InstrumentError> {
        let mut inner = self.inner.lock().expect("Mutex should not be poisoned");
        if let Err(err) = inner.backend.open(self.serial_number) {
            let reason = format!(
                "Thorlabs KPA101: Could not connect to device with serial number {} (is it open in another instance?): {err}",
                self.serial_number
            );
            error!("{reason}");
            return Err(InstrumentError::ConnectionFailed {
                device: self.name.clone(),
                reason,
            });
        }
        inner.connected = true;
        info!("{}: Connected to device", self.name);
        inner.readings.invalidate();
        drop(inner);
        self.readings()?;
        Ok(())
    }

    /// Close the connection to the device. Closing a connection that is not open does nothing.
    pub fn close(&self) -> Result<(), InstrumentError> {
        let mut inner = self.inner.lock().expect("Mutex should not be poisoned");
        if !inner.connected {
            return Ok(());
        }
        inner.connected = false;
        inner.readings.invalidate();
        info!("{}: Connection closed", self.name);
        inner.backend.close()
    }

    /// Check that the connection to the device is open.
    pub fn check_connection(&self) -> Result<(), InstrumentError> {
        let inner = self.inner.lock().expect("Mutex should not be poisoned");
        self.check_connected(&inner)
    }

    fn check_connected(&self, inner: &Inner<B>) -> Result<(), InstrumentError> {
        if inner.connected {
            Ok(())
        } else {
            let msg = format!(
                "Thorlabs KPA101: Connection to device with serial number {} not open",
                self.serial_number
            );
            error!("{msg}");
            Err(InstrumentError::NotConnected(msg))
        }
    }

    /// Get all readings, from the cache if they are younger than [`CACHE_INTERVAL`].
    pub fn readings(&self) -> Result<QuadReadings, InstrumentError> {
        let mut inner = self.inner.lock().expect("Mutex should not be poisoned");
        self.check_connected(&inner)?;
        let Inner {
            backend,
            readings: cache,
            ..
        } = &mut *inner;
        cache.get_or_refresh(|| {
            let readings = backend.get_readings()?;
            debug!(?readings, "{}: New readings", self.name);
            Ok(readings)
        })
    }

    /// X-axis alignment difference signal.
    pub fn xdiff(&self) -> Result<Voltage, InstrumentError> {
        Ok(Voltage::from_volts(self.readings()?.xdiff))
    }

    /// Y-axis alignment difference signal.
    pub fn ydiff(&self) -> Result<Voltage, InstrumentError> {
        Ok(Voltage::from_volts(self.readings()?.ydiff))
    }

    /// Sum signal.
    pub fn sum(&self) -> Result<Voltage, InstrumentError> {
        Ok(Voltage::from_volts(self.readings()?.sum))
    }

    /// X position. Only meaningful for position sensing detectors.
    pub fn xpos(&self) -> Result<Length, InstrumentError> {
        Ok(Length::from_millimeters(self.readings()?.xpos))
    }

    /// Y position. Only meaningful for position sensing detectors.
    pub fn ypos(&self) -> Result<Length, InstrumentError> {
        Ok(Length::from_millimeters(self.readings()?.ypos))
    }

    /// X position of the beam on a Thorlabs PDP90A, calculated as `5 mm * xdiff / sum`.
    ///
    /// A sum signal of zero results in a non-finite length.
    pub fn xpos_pdp90a(&self) -> Result<Length, InstrumentError> {
        let readings = self.readings()?;
        Ok(pdp90a_position(readings.xdiff, readings.sum))
    }

    /// Y position of the beam on a Thorlabs PDP90A, calculated as `5 mm * ydiff / sum`.
    pub fn ypos_pdp90a(&self) -> Result<Length, InstrumentError> {
        let readings = self.readings()?;
        Ok(pdp90a_position(readings.ydiff, readings.sum))
    }

    /// Get the operation mode.
    pub fn get_operation_mode(&self) -> Result<OperationMode, InstrumentError> {
        let mut inner = self.inner.lock().expect("Mutex should not be poisoned");
        self.check_connected(&inner)?;
        inner.backend.get_operation_mode()
    }

    /// Set the operation mode.
    pub fn set_operation_mode(&self, mode: OperationMode) -> Result<(), InstrumentError> {
        let mut inner = self.inner.lock().expect("Mutex should not be poisoned");
        self.check_connected(&inner)?;
        info!("{}: Setting operation mode to {mode}", self.name);
        inner.backend.set_operation_mode(mode)
    }
}

impl<B: QuadDetectorBackend> Clone for Kpa101<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            serial_number: self.serial_number,
            name: self.name.clone(),
        }
    }
}

fn pdp90a_position(diff: f64, sum: f64) -> Length {
    Length::from_millimeters(5.0 * diff / sum)
}
