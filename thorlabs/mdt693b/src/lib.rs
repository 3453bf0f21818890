//! A rust driver for the Thorlabs MDT693B 3-axis piezo controller.
//!
//! Commands are terminated with `"\n"`. The controller answers queries with a line terminated
//! by `"\r"`, and acknowledges every command with a single `>` prompt character.
//!
//! # Example
//!
//! ```no_run
//! use measurements::Voltage;
//! use thorlabs_mdt693b::{Mdt693b, SerialInterfaceMdt693b};
//!
//! let serial_inst = SerialInterfaceMdt693b::simple("COM14").unwrap();
//! let mut inst = Mdt693b::try_new(serial_inst).unwrap();
//!
//! let mut x = inst.get_axis("x").unwrap();
//! x.set_voltage(Voltage::from_volts(12.5)).unwrap();
//! println!("x: {}", x.read_voltage().unwrap());
//! ```

#![warn(missing_docs)]

use std::{
    fmt::Display,
    sync::{Arc, Mutex},
    time::Duration,
};

use measurements::Voltage;
use tracing::info;

use amodevices::{
    CachedReading, InstrumentError, InstrumentInterface, SerialInstrument, SerialInterface,
};

/// Time a voltage reading of an axis is cached.
pub const CACHE_INTERVAL: Duration = Duration::from_millis(100);

/// Prompt that acknowledges every command.
const PROMPT: u8 = b'>';

/// A SerialInterface for the MDT693B, using 115200 baud, 8N1.
#[derive(Debug)]
pub struct SerialInterfaceMdt693b {}

impl SerialInterfaceMdt693b {
    /// Open the serial port with the settings of the MDT693B and a one second timeout.
    ///
    /// Arguments:
    /// * `port` - The name of the serial port, e.g., `"/dev/ttyUSB0"` or `"COM3"`.
    pub fn simple(port: &str) -> Result<SerialInstrument, InstrumentError> {
        let port = serialport::new(port, 115_200)
            .timeout(Duration::from_secs(1))
            .parity(serialport::Parity::None)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One);
        SerialInterface::full(port)
    }
}

/// The three axes of the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    /// x axis
    X,
    /// y axis
    Y,
    /// z axis
    Z,
}

impl Axis {
    fn idx(&self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }
}

impl TryFrom<&str> for Axis {
    type Error = InstrumentError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "x" => Ok(Axis::X),
            "y" => Ok(Axis::Y),
            "z" => Ok(Axis::Z),
            _ => Err(InstrumentError::InvalidArgument(format!(
                "Unknown axis '{value}'"
            ))),
        }
    }
}

impl Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A rust driver for the MDT693B.
pub struct Mdt693b<T: InstrumentInterface> {
    interface: Arc<Mutex<T>>,
    voltages: [Arc<Mutex<CachedReading<f64>>>; 3],
}

impl<T: InstrumentInterface> Mdt693b<T> {
    /// Create a new MDT693B instance with the given interface.
    ///
    /// The read terminator of the interface is set to `"\r"`.
    pub fn try_new(interface: T) -> Result<Self, InstrumentError> {
        let mut intf = interface;
        intf.set_terminator("\r");
        Ok(Mdt693b {
            interface: Arc::new(Mutex::new(intf)),
            voltages: std::array::from_fn(|_| {
                Arc::new(Mutex::new(CachedReading::new(CACHE_INTERVAL)))
            }),
        })
    }

    /// Get a handle to the axis with the given name (`"x"`, `"y"`, or `"z"`).
    pub fn get_axis(&mut self, name: &str) -> Result<AxisHandle<T>, InstrumentError> {
        Ok(self.axis(Axis::try_from(name)?))
    }

    /// Get a handle to the given axis.
    pub fn axis(&mut self, axis: Axis) -> AxisHandle<T> {
        AxisHandle {
            axis,
            interface: Arc::clone(&self.interface),
            voltage: Arc::clone(&self.voltages[axis.idx()]),
        }
    }

    /// Query the controller and return the response without the prompt.
    pub fn query(&mut self, cmd: &str) -> Result<String, InstrumentError> {
        let mut intf = self.interface.lock().expect("Mutex should not be poisoned");
        query(&mut *intf, cmd)
    }

    /// Send a command that has no response other than the prompt.
    pub fn send_command(&mut self, cmd: &str) -> Result<(), InstrumentError> {
        let mut intf = self.interface.lock().expect("Mutex should not be poisoned");
        send_command(&mut *intf, cmd)
    }

    /// Close the connection to the controller.
    pub fn close(self) {
        info!("MDT693B: Connection closed");
    }
}

impl<T: InstrumentInterface> Clone for Mdt693b<T> {
    fn clone(&self) -> Self {
        Self {
            interface: self.interface.clone(),
            voltages: self.voltages.clone(),
        }
    }
}

fn check_prompt<T: InstrumentInterface>(intf: &mut T) -> Result<(), InstrumentError> {
    let ack = intf.read_byte()?;
    if ack != PROMPT {
        return Err(InstrumentError::NotAcknowledged(
            String::from_utf8_lossy(&[ack]).into_owned(),
        ));
    }
    Ok(())
}

fn query<T: InstrumentInterface>(intf: &mut T, cmd: &str) -> Result<String, InstrumentError> {
    intf.write(&format!("{cmd}\n"))?;
    let resp = intf.read_until_terminator()?;
    check_prompt(intf)?;
    Ok(resp)
}

fn send_command<T: InstrumentInterface>(intf: &mut T, cmd: &str) -> Result<(), InstrumentError> {
    intf.write(&format!("{cmd}\n"))?;
    check_prompt(intf)
}

/// Handle to a single axis of the MDT693B.
///
/// **This structure can only be created through the [`Mdt693b`] struct.**
///
/// Voltage readings are cached per axis for [`CACHE_INTERVAL`].
pub struct AxisHandle<T: InstrumentInterface> {
    axis: Axis,
    interface: Arc<Mutex<T>>,
    voltage: Arc<Mutex<CachedReading<f64>>>,
}

impl<T: InstrumentInterface> AxisHandle<T> {
    /// The axis this handle controls.
    pub fn axis(&self) -> Axis {
        self.axis
    }

    /// Read the output voltage of the axis.
    ///
    /// Returns the cached value if the last reading is no older than [`CACHE_INTERVAL`].
    pub fn read_voltage(&mut self) -> Result<Voltage, InstrumentError> {
        let mut cache = self.voltage.lock().expect("Mutex should not be poisoned");
        let volts = cache.get_or_refresh(|| {
            let resp = {
                let mut intf = self.interface.lock().expect("Mutex should not be poisoned");
                query(&mut *intf, &format!("{}voltage?", self.axis))?
            };
            resp.strip_prefix('[')
                .and_then(|val| val.strip_suffix(']'))
                .and_then(|val| val.trim().parse::<f64>().ok())
                .ok_or(InstrumentError::ResponseParseError(resp))
        })?;
        Ok(Voltage::from_volts(volts))
    }

    /// Set the output voltage of the axis.
    ///
    /// Negative voltages are rejected with [`InstrumentError::FloatValueOutOfRange`]. The cached
    /// reading of the axis is dropped.
    pub fn set_voltage(&mut self, voltage: Voltage) -> Result<(), InstrumentError> {
        let volts = voltage.as_volts();
        if volts < 0.0 {
            return Err(InstrumentError::FloatValueOutOfRange {
                value: volts,
                min: 0.0,
                max: f64::INFINITY,
            });
        }
        {
            let mut intf = self.interface.lock().expect("Mutex should not be poisoned");
            send_command(&mut *intf, &format!("{}voltage={volts}", self.axis))?;
        }
        self.voltage
            .lock()
            .expect("Mutex should not be poisoned")
            .invalidate();
        Ok(())
    }
}

impl<T: InstrumentInterface> Clone for AxisHandle<T> {
    fn clone(&self) -> Self {
        Self {
            axis: self.axis,
            interface: self.interface.clone(),
            voltage: self.voltage.clone(),
        }
    }
}
