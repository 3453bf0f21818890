//! A rust driver for the Stanford Research Systems SIM922 diode temperature monitor.
//!
//! The monitor has four diode channels, of which channels 1 to 3 are read by this driver.
//! Besides reading temperatures, user calibration curves can be loaded into the monitor, e.g.,
//! the standard curve of a Lake Shore DT-670 diode.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use amodevices::DeviceConfig;
//! use srs_sim922::{CalibrationPoint, Curve, Sim922};
//!
//! let config = DeviceConfig::new("SRS SIM922", "COM19").with_timeout(Duration::from_secs(1));
//! let mut inst = Sim922::from_config(&config).unwrap();
//! println!("Channel 1: {}", inst.read_temperature(1).unwrap());
//!
//! // Load a user calibration from a curve file (temperature and voltage columns).
//! let table = std::fs::read_to_string("dt600.txt").unwrap();
//! let points = CalibrationPoint::parse_table(&table, 3).unwrap();
//! inst.load_user_calibration(2, "DT670", &points, Duration::from_millis(500))
//!     .unwrap();
//! assert_eq!(inst.get_curve(2).unwrap(), Curve::User);
//! ```

#![warn(missing_docs)]

use std::{
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use measurements::{Temperature, Voltage};
use tracing::{debug, info};

use amodevices::{
    DeviceConfig, InstrumentError, InstrumentInterface, SerialInstrument, SerialInterface,
    convert::to_float,
};

/// Channels that can be read.
const CHANNELS: std::ops::RangeInclusive<u8> = 1..=3;

/// Calibration curve used to convert the diode voltage of a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Curve {
    /// The built-in standard curve.
    Standard,
    /// The user calibration curve.
    User,
}

impl Curve {
    fn as_str(&self) -> &'static str {
        match self {
            Curve::Standard => "STAN",
            Curve::User => "USER",
        }
    }

    fn from_cmd_str(resp: &str) -> Result<Self, InstrumentError> {
        match resp.trim() {
            "0" | "STAN" => Ok(Curve::Standard),
            "1" | "USER" => Ok(Curve::User),
            _ => Err(InstrumentError::ResponseParseError(resp.to_string())),
        }
    }
}

/// A point of a calibration curve.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CalibrationPoint {
    /// Diode voltage.
    pub voltage: Voltage,
    /// Temperature at this voltage.
    pub temperature: Temperature,
}

impl CalibrationPoint {
    /// Create a new calibration point.
    pub fn new(voltage: Voltage, temperature: Temperature) -> Self {
        Self {
            voltage,
            temperature,
        }
    }

    /// Parse a whitespace-separated table with temperature (K) in the first and voltage (V) in
    /// the second column, as distributed by Lake Shore for their diode curves.
    ///
    /// The first `skip_rows` lines are skipped, as are empty lines.
    pub fn parse_table(table: &str, skip_rows: usize) -> Result<Vec<Self>, InstrumentError> {
        table
            .lines()
            .skip(skip_rows)
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                let mut cols = line.split_whitespace();
                match (cols.next(), cols.next()) {
                    (Some(temp), Some(volt)) => Ok(CalibrationPoint::new(
                        Voltage::from_volts(to_float(volt)?),
                        Temperature::from_kelvin(to_float(temp)?),
                    )),
                    _ => Err(InstrumentError::InvalidArgument(format!(
                        "Invalid calibration table line '{line}'"
                    ))),
                }
            })
            .collect()
    }
}

/// A rust driver for the SIM922.
pub struct Sim922<T: InstrumentInterface> {
    interface: Arc<Mutex<T>>,
    name: String,
}

impl<T: InstrumentInterface> Sim922<T> {
    /// Create a new SIM922 instance with the given interface.
    ///
    /// The terminator is set to `"\n"`. Responses end in `"\r\n"`, the carriage return is
    /// trimmed.
    pub fn try_new(interface: T) -> Result<Self, InstrumentError> {
        let mut intf = interface;
        intf.set_terminator("\n");
        Ok(Sim922 {
            interface: Arc::new(Mutex::new(intf)),
            name: "SRS SIM922".to_string(),
        })
    }

    /// Set the name of the device used in log messages.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Send a command to the monitor.
    pub fn write(&mut self, cmd: &str) -> Result<(), InstrumentError> {
        let mut intf = self.interface.lock().expect("Mutex should not be poisoned");
        intf.sendcmd(cmd)
    }

    /// Query the monitor. An empty response fails with [`InstrumentError::EmptyResponse`].
    pub fn query(&mut self, cmd: &str) -> Result<String, InstrumentError> {
        let resp = {
            let mut intf = self.interface.lock().expect("Mutex should not be poisoned");
            intf.query(cmd)?
        };
        if resp.is_empty() {
            return Err(InstrumentError::EmptyResponse);
        }
        Ok(resp)
    }

    /// Read the temperature of the given channel (1-3).
    pub fn read_temperature(&mut self, channel: u8) -> Result<Temperature, InstrumentError> {
        check_channel(channel)?;
        let resp = self.query(&format!("TVAL? {channel}"))?;
        Ok(Temperature::from_kelvin(to_float(&resp)?))
    }

    /// Get the calibration curve the given channel uses.
    pub fn get_curve(&mut self, channel: u8) -> Result<Curve, InstrumentError> {
        check_channel(channel)?;
        let resp = self.query(&format!("CURV? {channel}"))?;
        Curve::from_cmd_str(&resp)
    }

    /// Set the calibration curve the given channel uses.
    pub fn set_curve(&mut self, channel: u8, curve: Curve) -> Result<(), InstrumentError> {
        check_channel(channel)?;
        self.write(&format!("CURV {channel},{}", curve.as_str()))
    }

    /// Get the description of the user calibration curve of the given channel.
    pub fn get_calibration_info(&mut self, channel: u8) -> Result<String, InstrumentError> {
        check_channel(channel)?;
        self.query(&format!("CINI? {channel}"))
    }

    /// Start a new, empty user calibration curve with the given name for the given channel.
    pub fn init_user_calibration(
        &mut self,
        channel: u8,
        curve_name: &str,
    ) -> Result<(), InstrumentError> {
        check_channel(channel)?;
        if curve_name.is_empty() || curve_name.contains(',') {
            return Err(InstrumentError::InvalidArgument(format!(
                "Invalid calibration curve name '{curve_name}'"
            )));
        }
        self.write(&format!("CINI {channel},0,{curve_name}"))
    }

    /// Add a point to the user calibration curve of the given channel.
    pub fn add_calibration_point(
        &mut self,
        channel: u8,
        point: CalibrationPoint,
    ) -> Result<(), InstrumentError> {
        check_channel(channel)?;
        self.write(&format!(
            "CAPT {channel},{},{}",
            point.voltage.as_volts(),
            point.temperature.as_kelvin()
        ))
    }

    /// Load a complete user calibration curve into the given channel and select it.
    ///
    /// The points are sent in order of increasing voltage, waiting `point_delay` after each
    /// point for the monitor to store it.
    pub fn load_user_calibration(
        &mut self,
        channel: u8,
        curve_name: &str,
        points: &[CalibrationPoint],
        point_delay: Duration,
    ) -> Result<(), InstrumentError> {
        self.init_user_calibration(channel, curve_name)?;
        let mut points = points.to_vec();
        points.sort_by(|a, b| a.voltage.as_volts().total_cmp(&b.voltage.as_volts()));
        for point in points {
            self.add_calibration_point(channel, point)?;
            debug!("{}: Added calibration point {point:?}", self.name);
            thread::sleep(point_delay);
        }
        self.set_curve(channel, Curve::User)?;
        info!(
            "{}: Loaded user calibration '{curve_name}' for channel {channel}",
            self.name
        );
        Ok(())
    }

    /// Close the connection to the monitor.
    pub fn close(self) {
        info!("{}: Connection closed", self.name);
    }
}

impl<T: InstrumentInterface> Clone for Sim922<T> {
    fn clone(&self) -> Self {
        Self {
            interface: self.interface.clone(),
            name: self.name.clone(),
        }
    }
}

impl Sim922<SerialInstrument> {
    /// Open the monitor on the serial port described by a device configuration.
    pub fn from_config(config: &DeviceConfig) -> Result<Self, InstrumentError> {
        let interface = SerialInterface::from_config(config)?;
        Ok(Self::try_new(interface)?.with_name(&config.device))
    }
}

fn check_channel(channel: u8) -> Result<(), InstrumentError> {
    if !CHANNELS.contains(&channel) {
        return Err(InstrumentError::IntValueOutOfRange {
            value: channel.into(),
            min: (*CHANNELS.start()).into(),
            max: (*CHANNELS.end()).into(),
        });
    }
    Ok(())
}
