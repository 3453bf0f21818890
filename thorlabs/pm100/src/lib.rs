//! A rust driver for Thorlabs PM100 optical power meters, controlled through VISA.
//!
//! Other Thorlabs power meters are supported in their "PM100D" mode, e.g., the PM101 and the
//! PM16-121. The meters must be switched from the "TLPM (libusb)" driver to the "PM100D" mode
//! with the Thorlabs driver switcher for a VISA library to see them.
//!
//! The sensor head and the power readings are accessed via handles, see [`Pm100::sensor`] and
//! [`Pm100::power`].
//!
//! # Example
//!
//! ```no_run
//! use amodevices::{DeviceConfig, InstrumentError, VisaResourceManager};
//! use measurements::Length;
//! use thorlabs_pm100::Pm100;
//!
//! fn run<M: VisaResourceManager>(rm: &mut M) -> Result<(), InstrumentError> {
//!     let config = DeviceConfig::new("Power meter", "USB0::0x1313::0x8078::P0012345::INSTR");
//!     let mut inst = Pm100::connect(rm, &config)?;
//!
//!     inst.set_wavelength(Length::from_nanometers(486.0))?;
//!     println!("Sensor: {}", inst.sensor().info()?.name);
//!     println!("Power: {}", inst.power().read_power()?);
//!     inst.close();
//!     Ok(())
//! }
//! ```
//!
//! With the `visa` feature, `amodevices::VisaRsResourceManager` connects to the system's VISA
//! library.

#![warn(missing_docs)]

use std::{
    fmt::Display,
    sync::{Arc, Mutex},
};

use measurements::{Length, Power, Voltage};
use tracing::info;

use amodevices::{
    DeviceConfig, InstrumentError, InstrumentInterface, VisaInterface, VisaResourceManager,
    convert::{to_bool, to_float, to_int},
};

/// Unit in which the power meter reports power values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PowerUnit {
    /// Watt.
    Watt,
    /// Decibel relative to one milliwatt.
    Dbm,
}

impl PowerUnit {
    fn as_str(&self) -> &'static str {
        match self {
            PowerUnit::Watt => "W",
            PowerUnit::Dbm => "DBM",
        }
    }

    fn from_cmd_str(resp: &str) -> Result<Self, InstrumentError> {
        match resp {
            "W" => Ok(PowerUnit::Watt),
            "DBM" => Ok(PowerUnit::Dbm),
            _ => Err(InstrumentError::ResponseParseError(resp.to_string())),
        }
    }

    /// Convert a value in this unit to a [`Power`].
    pub fn to_power(&self, value: f64) -> Power {
        match self {
            PowerUnit::Watt => Power::from_watts(value),
            PowerUnit::Dbm => Power::from_watts(1e-3 * 10f64.powf(value / 10.0)),
        }
    }
}

impl Display for PowerUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identification of the connected sensor head, as returned by `SYSTem:SENSor:IDN?`.
#[derive(Clone, Debug, PartialEq)]
pub struct SensorInfo {
    /// Name of the sensor, e.g., `S120C`.
    pub name: String,
    /// Serial number of the sensor.
    pub serial_number: String,
    /// Calibration message.
    pub cal_msg: String,
    /// Sensor type.
    pub sensor_type: i64,
    /// Sensor subtype.
    pub subtype: i64,
    /// Sensor flags, see the `is_*` and `has_*` methods.
    pub flags: i64,
}

impl SensorInfo {
    fn from_idn(idn: &str) -> Result<Self, InstrumentError> {
        let parts: Vec<&str> = idn.split(',').map(str::trim).collect();
        if parts.len() != 6 {
            return Err(InstrumentError::ResponseParseError(idn.to_string()));
        }
        Ok(SensorInfo {
            name: parts[0].to_string(),
            serial_number: parts[1].to_string(),
            cal_msg: parts[2].to_string(),
            sensor_type: to_int(parts[3])?,
            subtype: to_int(parts[4])?,
            flags: to_int(parts[5])?,
        })
    }

    fn flag(&self, bit: u32) -> bool {
        (self.flags >> bit) & 1 == 1
    }

    /// Is the sensor a power sensor?
    pub fn is_power_sensor(&self) -> bool {
        self.flag(0)
    }

    /// Is the sensor an energy sensor?
    pub fn is_energy_sensor(&self) -> bool {
        self.flag(1)
    }

    /// Can the wavelength be set for this sensor?
    pub fn is_wavelength_settable(&self) -> bool {
        self.flag(5)
    }

    /// Does the sensor have a temperature sensor?
    pub fn has_temperature_sensor(&self) -> bool {
        self.flag(8)
    }
}

/// A rust driver for the PM100.
pub struct Pm100<T: InstrumentInterface> {
    interface: Arc<Mutex<T>>,
    name: String,
}

impl<T: InstrumentInterface> Pm100<T> {
    /// Create a new power meter instance with an already opened interface.
    ///
    /// The terminator is set to `"\n"`.
    pub fn try_new(interface: T) -> Result<Self, InstrumentError> {
        let mut intf = interface;
        intf.set_terminator("\n");
        Ok(Pm100 {
            interface: Arc::new(Mutex::new(intf)),
            name: "Thorlabs PM100".to_string(),
        })
    }

    /// Set the name of the device used in log messages.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Get a handle to the sensor head.
    pub fn sensor(&self) -> Sensor<T> {
        Sensor {
            interface: self.interface.clone(),
        }
    }

    /// Get a handle to the power readings.
    pub fn power(&self) -> PowerChannel<T> {
        PowerChannel {
            interface: self.interface.clone(),
        }
    }

    /// Send a command.
    pub fn write(&mut self, cmd: &str) -> Result<(), InstrumentError> {
        write(&self.interface, cmd)
    }

    /// Send a query and return the response.
    pub fn query(&mut self, cmd: &str) -> Result<String, InstrumentError> {
        query(&self.interface, cmd)
    }

    /// Get the operation wavelength.
    pub fn get_wavelength(&mut self) -> Result<Length, InstrumentError> {
        let resp = self.query("SENSe:CORRection:WAVElength?")?;
        Ok(Length::from_nanometers(to_float(&resp)?))
    }

    /// Set the operation wavelength. It is sent in nanometers, rounded to picometers.
    pub fn set_wavelength(&mut self, wavelength: Length) -> Result<(), InstrumentError> {
        self.write(&format!(
            "SENSe:CORRection:WAVElength {:.3}",
            wavelength.as_nanometers()
        ))
    }

    /// Get the beam diameter.
    pub fn get_beam_diameter(&mut self) -> Result<Length, InstrumentError> {
        let resp = self.query("SENSe:CORRection:BEAMdiameter?")?;
        Ok(Length::from_millimeters(to_float(&resp)?))
    }

    /// Set the beam diameter. It is sent in millimeters, rounded to micrometers.
    pub fn set_beam_diameter(&mut self, diameter: Length) -> Result<(), InstrumentError> {
        self.write(&format!(
            "SENSe:CORRection:BEAMdiameter {:.3}",
            diameter.as_millimeters()
        ))
    }

    /// Get the number of readings that are averaged.
    pub fn get_num_averages(&mut self) -> Result<u32, InstrumentError> {
        let resp = self.query("SENSe:AVERage:COUNt?")?;
        let value = to_int(&resp)?;
        u32::try_from(value).map_err(|_| InstrumentError::ResponseParseError(resp))
    }

    /// Set the number of readings that are averaged.
    pub fn set_num_averages(&mut self, num_averages: u32) -> Result<(), InstrumentError> {
        self.write(&format!("SENSe:AVERage:COUNt {num_averages}"))
    }

    /// Run the zero adjustment routine. The sensor must be covered.
    pub fn zero(&mut self) -> Result<(), InstrumentError> {
        self.write("SENSe:CORRection:COLLect:ZERO")
    }

    /// Get the voltage offset applied by the last zero adjustment.
    pub fn get_zero_magnitude(&mut self) -> Result<Voltage, InstrumentError> {
        let resp = self.query("SENSe:CORRection:COLLect:ZERO:MAGNitude?")?;
        Ok(Voltage::from_volts(to_float(&resp)?))
    }

    /// Close the connection to the power meter.
    pub fn close(self) {
        info!("{}: Connection closed", self.name);
    }
}

impl<T: InstrumentInterface> Clone for Pm100<T> {
    fn clone(&self) -> Self {
        Self {
            interface: self.interface.clone(),
            name: self.name.clone(),
        }
    }
}

impl<R: InstrumentInterface> Pm100<VisaInterface<R>> {
    /// Connect to the power meter at the VISA resource named in the configuration.
    pub fn connect<M>(rm: &mut M, config: &DeviceConfig) -> Result<Self, InstrumentError>
    where
        M: VisaResourceManager<Resource = R>,
    {
        let interface = VisaInterface::init(rm, config)?;
        Ok(Self::try_new(interface)?.with_name(&config.device))
    }
}

/// Handle to the sensor head of a [`Pm100`].
pub struct Sensor<T: InstrumentInterface> {
    interface: Arc<Mutex<T>>,
}

impl<T: InstrumentInterface> Sensor<T> {
    /// Query the identification of the sensor head.
    pub fn info(&mut self) -> Result<SensorInfo, InstrumentError> {
        let resp = query(&self.interface, "SYSTem:SENSor:IDN?")?;
        SensorInfo::from_idn(&resp)
    }
}

/// Handle to the power readings of a [`Pm100`].
pub struct PowerChannel<T: InstrumentInterface> {
    interface: Arc<Mutex<T>>,
}

impl<T: InstrumentInterface> PowerChannel<T> {
    /// Get the unit in which power values are reported.
    pub fn get_unit(&mut self) -> Result<PowerUnit, InstrumentError> {
        let resp = query(&self.interface, "SENSe:POWer:UNIT?")?;
        PowerUnit::from_cmd_str(&resp)
    }

    /// Set the unit in which power values are reported.
    pub fn set_unit(&mut self, unit: PowerUnit) -> Result<(), InstrumentError> {
        write(&self.interface, &format!("SENSe:POWer:UNIT {unit}"))
    }

    /// Get the state of the auto ranging function.
    pub fn get_auto_range(&mut self) -> Result<bool, InstrumentError> {
        let resp = query(&self.interface, "SENSe:POWer:RANGe:AUTO?")?;
        to_bool(&resp)
    }

    /// Enable or disable the auto ranging function.
    pub fn set_auto_range(&mut self, state: bool) -> Result<(), InstrumentError> {
        write(
            &self.interface,
            &format!("SENSe:POWer:RANGe:AUTO {}", u8::from(state)),
        )
    }

    /// Measure the power, in the unit currently set (see [`PowerChannel::get_unit`]).
    pub fn value(&mut self) -> Result<f64, InstrumentError> {
        let resp = query(&self.interface, "MEASure:POWer?")?;
        to_float(&resp)
    }

    /// Measure the power and return it as a [`Power`], regardless of the unit set.
    ///
    /// Unit query and measurement run as one transaction.
    pub fn read_power(&mut self) -> Result<Power, InstrumentError> {
        let mut intf = self.interface.lock().expect("Mutex should not be poisoned");
        let unit = PowerUnit::from_cmd_str(&intf.query("SENSe:POWer:UNIT?")?)?;
        let value = to_float(&intf.query("MEASure:POWer?")?)?;
        Ok(unit.to_power(value))
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
