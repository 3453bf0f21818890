//! NI 9264 analog output module paired with an NI 9205 analog input module.

use std::{
    collections::BTreeMap,
    fmt::Display,
    str::FromStr,
    sync::{Arc, Mutex},
    time::Duration,
};

use measurements::Voltage;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use amodevices::{
    DeviceConfig, InstrumentError,
    daq::{DaqError, DaqSystem, DaqTask},
};

use crate::task::{close_tasks, read_value, write_value};

/// Voltage range of all inputs and outputs in V.
pub const NI9264_NI9205_RANGE: (f64, f64) = (0.0, 5.0);

/// Axes of the module pair. All axes have an output, only x, y, and z are read back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Axis {
    /// x axis, `ao8` and `ai18`.
    X,
    /// y axis, `ao9` and `ai19`.
    Y,
    /// z axis, `ao10` and `ai20`.
    Z,
    /// g axis, `ao11`. Output only.
    G,
}

impl Axis {
    /// All axes, in the order their tasks are created.
    pub const ALL: [Axis; 4] = [Axis::X, Axis::Y, Axis::Z, Axis::G];

    /// Physical output channel number on the NI 9264.
    pub fn ao_channel(&self) -> u32 {
        match self {
            Axis::X => 8,
            Axis::Y => 9,
            Axis::Z => 10,
            Axis::G => 11,
        }
    }

    /// Physical input channel number on the NI 9205, if the axis is read back.
    pub fn ai_channel(&self) -> Option<u32> {
        match self {
            Axis::X => Some(18),
            Axis::Y => Some(19),
            Axis::Z => Some(20),
            Axis::G => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
            Axis::G => "g",
        }
    }
}

impl Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Axis {
    type Err = InstrumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Axis::ALL
            .into_iter()
            .find(|axis| axis.as_str() == s)
            .ok_or_else(|| InstrumentError::InvalidArgument(format!("Unknown axis: {s}")))
    }
}

/// Device specific parameters of [`Ni9264Ni9205`].
///
/// ```json
/// {"AODevice": "cDAQ1Mod1", "AIDevice": "cDAQ1Mod2"}
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Ni9264Ni9205Params {
    /// Name of the NI 9264 output module.
    #[serde(rename = "AODevice")]
    pub ao_device: String,
    /// Name of the NI 9205 input module.
    #[serde(rename = "AIDevice")]
    pub ai_device: String,
}

type TaskMap<S> = BTreeMap<Axis, <S as DaqSystem>::Task>;

struct Inner<S: DaqSystem> {
    system: S,
    ao_tasks: TaskMap<S>,
    ai_tasks: TaskMap<S>,
    voltages: BTreeMap<Axis, f64>,
    connected: bool,
}

/// Driver for an NI 9264 and NI 9205 module pair.
pub struct Ni9264Ni9205<S: DaqSystem> {
    inner: Arc<Mutex<Inner<S>>>,
    params: Ni9264Ni9205Params,
    timeout: Duration,
    name: String,
}

impl<S: DaqSystem> Ni9264Ni9205<S> {
    /// Create a new driver. The tasks are created on [`Ni9264Ni9205::connect`].
    pub fn new(system: S, params: Ni9264Ni9205Params, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                system,
                ao_tasks: BTreeMap::new(),
                ai_tasks: BTreeMap::new(),
                voltages: Axis::ALL.into_iter().map(|axis| (axis, 0.0)).collect(),
                connected: false,
            })),
            params,
            timeout,
            name: "NI 9264/NI 9205".to_string(),
        }
    }

    /// Create a new driver from a device configuration, see [`Ni9264Ni9205Params`].
    pub fn from_config(system: S, config: &DeviceConfig) -> Result<Self, InstrumentError> {
        let params: Ni9264Ni9205Params = config.device_specific_params()?;
        Ok(Self::new(system, params, config.timeout()).with_name(&config.device))
    }

    /// Set the name of the device, which is used in log messages.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Physical output channel of an axis, e.g., `cDAQ1Mod1/ao8`.
    pub fn ao_channel(&self, axis: Axis) -> String {
        format!("{}/ao{}", self.params.ao_device, axis.ao_channel())
    }

    /// Physical input channel of an axis, e.g., `cDAQ1Mod2/ai18`.
    pub fn ai_channel(&self, axis: Axis) -> Option<String> {
        axis.ai_channel()
            .map(|n| format!("{}/ai{n}", self.params.ai_device))
    }

    /// Create one output task per axis, then one input task per read back axis.
    pub fn connect(&self) -> Result<(), InstrumentError> {
        let mut inner = self.lock();
        match self.create_tasks(&mut inner.system) {
            Ok((ao_tasks, ai_tasks)) => {
                inner.ao_tasks = ao_tasks;
                inner.ai_tasks = ai_tasks;
                inner.connected = true;
                info!("{}: Connection opened", self.name);
                Ok(())
            }
            Err(err) => {
                inner.connected = false;
                error!("{}: Connection error: {err}", self.name);
                Err(err.into())
            }
        }
    }

    fn create_tasks(&self, system: &mut S) -> Result<(TaskMap<S>, TaskMap<S>), DaqError> {
        let (min, max) = NI9264_NI9205_RANGE;
        let mut ao_tasks = BTreeMap::new();
        for axis in Axis::ALL {
            let mut task = system.create_task(&format!("AO {axis}"))?;
            task.add_ao_voltage_channel(&self.ao_channel(axis), min, max)?;
            ao_tasks.insert(axis, task);
        }
        let mut ai_tasks = BTreeMap::new();
        for axis in Axis::ALL {
            if let Some(chan) = self.ai_channel(axis) {
                let mut task = system.create_task(&format!("AI {axis}"))?;
                task.add_ai_voltage_channel(&chan, min, max)?;
                ai_tasks.insert(axis, task);
            }
        }
        Ok((ao_tasks, ai_tasks))
    }

    /// Stop and clear all output tasks, then all input tasks.
    pub fn close(&self) -> Result<(), InstrumentError> {
        let mut inner = self.lock();
        inner.connected = false;
        let ao_tasks = std::mem::take(&mut inner.ao_tasks);
        let ai_tasks = std::mem::take(&mut inner.ai_tasks);
        close_tasks(ao_tasks.into_values().chain(ai_tasks.into_values()))?;
        info!("{}: Connection closed", self.name);
        Ok(())
    }

    /// Are the tasks set up?
    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    /// Set the output voltage of an axis.
    pub fn set_voltage(&self, axis: Axis, value: Voltage) -> Result<(), InstrumentError> {
        let (min, max) = NI9264_NI9205_RANGE;
        let volts = value.as_volts();
        if !(min..=max).contains(&volts) {
            return Err(InstrumentError::FloatValueOutOfRange {
                value: volts,
                min,
                max,
            });
        }
        let mut inner = self.lock();
        let inner = &mut *inner;
        if !inner.connected {
            return Err(self.not_connected());
        }
        let task = inner
            .ao_tasks
            .get_mut(&axis)
            .ok_or_else(|| self.not_connected())?;
        if let Err(err) = write_value(task, volts, self.timeout, &mut inner.connected) {
            error!("{}: Setting voltage of axis {axis} failed: {err}", self.name);
            return Err(err);
        }
        inner.voltages.insert(axis, volts);
        debug!("{}: Set axis {axis} to {volts} V", self.name);
        Ok(())
    }

    /// Last voltage that was set on an axis, 0 V if none was set yet.
    pub fn voltage(&self, axis: Axis) -> Voltage {
        Voltage::from_volts(self.lock().voltages.get(&axis).copied().unwrap_or_default())
    }

    /// Read the input voltage of an axis.
    pub fn read_voltage(&self, axis: Axis) -> Result<Voltage, InstrumentError> {
        if axis.ai_channel().is_none() {
            return Err(InstrumentError::InvalidArgument(format!(
                "Unknown AI axis: {axis}"
            )));
        }
        let mut inner = self.lock();
        let inner = &mut *inner;
        if !inner.connected {
            return Err(self.not_connected());
        }
        let task = inner
            .ai_tasks
            .get_mut(&axis)
            .ok_or_else(|| self.not_connected())?;
        match read_value(task, self.timeout, &mut inner.connected) {
            Ok(volts) => Ok(Voltage::from_volts(volts)),
            Err(err) => {
                error!("{}: Reading voltage of axis {axis} failed: {err}", self.name);
                Err(err)
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<S>> {
        self.inner.lock().expect("Mutex should not be poisoned")
    }

    fn not_connected(&self) -> InstrumentError {
        InstrumentError::NotConnected(format!("{}: Tasks are not set up", self.name))
    }
}

impl<S: DaqSystem> Clone for Ni9264Ni9205<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            params: self.params.clone(),
            timeout: self.timeout,
            name: self.name.clone(),
        }
    }
}
