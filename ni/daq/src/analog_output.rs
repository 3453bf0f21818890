//! Generic analog outputs.

use std::{
    collections::BTreeMap,
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

use crate::task::{close_tasks, write_value};

/// Voltage range of the outputs in V.
pub const AO_RANGE: (f64, f64) = (0.0, 10.0);

/// Device specific parameters of [`NiDaq`].
///
/// ```json
/// {"AOChannels": {"x": "cDAQ1Mod1/ao0", "y": "cDAQ1Mod1/ao1"}}
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct NiDaqParams {
    /// Physical output channel of each axis.
    #[serde(rename = "AOChannels")]
    pub ao_channels: BTreeMap<String, String>,
}

struct Inner<S: DaqSystem> {
    system: S,
    tasks: BTreeMap<String, S::Task>,
    voltages: BTreeMap<String, f64>,
    connected: bool,
}

/// Analog outputs of an NI DAQ module, addressed by axis name.
pub struct NiDaq<S: DaqSystem> {
    inner: Arc<Mutex<Inner<S>>>,
    ao_channels: BTreeMap<String, String>,
    timeout: Duration,
    name: String,
}

impl<S: DaqSystem> NiDaq<S> {
    /// Create a new driver for the given axes. The tasks are created on
    /// [`NiDaq::connect`].
    pub fn new(system: S, params: NiDaqParams, timeout: Duration) -> Self {
        let voltages = params
            .ao_channels
            .keys()
            .map(|axis| (axis.clone(), 0.0))
            .collect();
        Self {
            inner: Arc::new(Mutex::new(Inner {
                system,
                tasks: BTreeMap::new(),
                voltages,
                connected: false,
            })),
            ao_channels: params.ao_channels,
            timeout,
            name: "NI DAQ".to_string(),
        }
    }

    /// Create a new driver from a device configuration, see [`NiDaqParams`].
    pub fn from_config(system: S, config: &DeviceConfig) -> Result<Self, InstrumentError> {
        let params: NiDaqParams = config.device_specific_params()?;
        Ok(Self::new(system, params, config.timeout()).with_name(&config.device))
    }

    /// Set the name of the device, which is used in log messages.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Create one output task per axis.
    pub fn connect(&self) -> Result<(), InstrumentError> {
        let mut inner = self.lock();
        let mut tasks = BTreeMap::new();
        let result: Result<(), DaqError> = self.ao_channels.iter().try_for_each(|(axis, chan)| {
            let mut task = inner.system.create_task(&format!("AO {axis}"))?;
            task.add_ao_voltage_channel(chan, AO_RANGE.0, AO_RANGE.1)?;
            tasks.insert(axis.clone(), task);
            Ok(())
        });
        if let Err(err) = result {
            inner.connected = false;
            error!("{}: Connection error: {err}", self.name);
            return Err(err.into());
        }
        inner.tasks = tasks;
        inner.connected = true;
        info!("{}: Connection opened", self.name);
        Ok(())
    }

    /// Stop and clear all tasks.
    pub fn close(&self) -> Result<(), InstrumentError> {
        let mut inner = self.lock();
        inner.connected = false;
        let tasks = std::mem::take(&mut inner.tasks);
        close_tasks(tasks.into_values())?;
        info!("{}: Connection closed", self.name);
        Ok(())
    }

    /// Are the tasks set up?
    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    /// Configured axes.
    pub fn axes(&self) -> Vec<String> {
        self.ao_channels.keys().cloned().collect()
    }

    /// Set the output voltage of an axis.
    pub fn set_voltage(&self, axis: &str, value: Voltage) -> Result<(), InstrumentError> {
        let volts = value.as_volts();
        if !(AO_RANGE.0..=AO_RANGE.1).contains(&volts) {
            return Err(InstrumentError::FloatValueOutOfRange {
                value: volts,
                min: AO_RANGE.0,
                max: AO_RANGE.1,
            });
        }
        let mut inner = self.lock();
        let inner = &mut *inner;
        if !inner.connected {
            return Err(self.not_connected());
        }
        let task = inner
            .tasks
            .get_mut(axis)
            .ok_or_else(|| unknown_axis(axis))?;
        if let Err(err) = write_value(task, volts, self.timeout, &mut inner.connected) {
            error!("{}: Setting voltage of axis '{axis}' failed: {err}", self.name);
            return Err(err);
        }
        inner.voltages.insert(axis.to_string(), volts);
        debug!("{}: Set axis '{axis}' to {volts} V", self.name);
        Ok(())
    }

    /// Last voltage that was set on an axis, 0 V if none was set yet.
    pub fn voltage(&self, axis: &str) -> Result<Voltage, InstrumentError> {
        self.lock()
            .voltages
            .get(axis)
            .map(|v| Voltage::from_volts(*v))
            .ok_or_else(|| unknown_axis(axis))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<S>> {
        self.inner.lock().expect("Mutex should not be poisoned")
    }

    fn not_connected(&self) -> InstrumentError {
        InstrumentError::NotConnected(format!("{}: Tasks are not set up", self.name))
    }
}

impl<S: DaqSystem> Clone for NiDaq<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            ao_channels: self.ao_channels.clone(),
            timeout: self.timeout,
            name: self.name.clone(),
        }
    }
}

fn unknown_axis(axis: &str) -> InstrumentError {
    InstrumentError::InvalidArgument(format!("Unknown AO axis: '{axis}'"))
}
