//! A Rust driver for Matsusada high voltage supplies that are controlled and monitored through
//! National Instruments DAQ modules.
//!
//! The output voltage of the supplies (KA-10P, J4-5P, J4-5N) is set by an analog control
//! voltage from a DAC module (e.g., NI 9264) and monitored with analog voltages read by an ADC
//! module (e.g., NI 9205). The KA-10P also has a current monitor.
//!
//! All monitor channels are read in one task, all control channels are written in another
//! one. Reading any supply reads all monitors at once (64 samples per channel, averaged) and
//! the result is cached for 0.5 s. Setting the voltage of one supply writes the control
//! voltages of all supplies.
//!
//! # Example
//!
//! ```no_run
//! use amodevices::{DeviceConfig, InstrumentError, daq::DaqSystem};
//! use hvs_controller::HvsController;
//! use measurements::Voltage;
//!
//! fn run<S: DaqSystem>(system: S, config: &DeviceConfig) -> Result<(), InstrumentError> {
//!     let hvs = HvsController::from_config(system, config)?;
//!     hvs.connect()?;
//!     hvs.set_voltage("HV1", Voltage::from_volts(2500.0))?;
//!     println!("HV1: {} V", hvs.read_voltage("HV1")?.as_volts());
//!     hvs.close()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

mod config;

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use measurements::{Current, Voltage};
use tracing::{debug, error, info};

use amodevices::{
    CachedReading, DeviceConfig, InstrumentError,
    daq::{DaqError, DaqSystem, DaqTask},
};

pub use config::{HvsParams, Model, Modules, SupplyConfig};

/// Time that the monitor readings are reused before the monitors are read again.
pub const CACHE_INTERVAL: Duration = Duration::from_millis(500);

/// Samples per monitor channel that are read and averaged.
pub const SAMPLES_PER_CHANNEL: usize = 64;

/// Name of the task that reads the monitors.
pub const MONITOR_TASK: &str = "Voltage Monitors";

/// Name of the task that writes the control voltages.
pub const CONTROL_TASK: &str = "Voltage Controls";

#[derive(Clone, Debug)]
struct Supply {
    config: SupplyConfig,
    control_value: f64,
}

/// Monitor reading of one supply, in V and mA.
#[derive(Clone, Copy, Debug)]
struct Reading {
    voltage: f64,
    current: Option<f64>,
}

struct Inner<S: DaqSystem> {
    system: S,
    supplies: Vec<Supply>,
    monitors: Option<S::Task>,
    controls: Option<S::Task>,
    connected: bool,
    readings: CachedReading<Vec<Reading>>,
}

/// Controller for a set of Matsusada high voltage supplies.
pub struct HvsController<S: DaqSystem> {
    inner: Arc<Mutex<Inner<S>>>,
    modules: Modules,
    timeout: Duration,
    name: String,
}

impl<S: DaqSystem> HvsController<S> {
    /// Create a new controller for the given supplies. No tasks are created until
    /// [`HvsController::connect`] is called.
    pub fn new(system: S, params: HvsParams, timeout: Duration) -> Result<Self, InstrumentError> {
        params.validate()?;
        let supplies = params
            .channels
            .into_iter()
            .map(|config| Supply {
                config,
                control_value: 0.0,
            })
            .collect();
        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                system,
                supplies,
                monitors: None,
                controls: None,
                connected: false,
                readings: CachedReading::new(CACHE_INTERVAL),
            })),
            modules: params.modules,
            timeout,
            name: "HVS controller".to_string(),
        })
    }

    /// Create a new controller from a device configuration. The supplies are taken from the
    /// `DeviceSpecificParams`, see [`HvsParams`].
    pub fn from_config(system: S, config: &DeviceConfig) -> Result<Self, InstrumentError> {
        let params: HvsParams = config.device_specific_params()?;
        Ok(Self::new(system, params, config.timeout())?.with_name(&config.device))
    }

    /// Set the name of the controller, which is used in log messages.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Create and start the monitor and control tasks.
    pub fn connect(&self) -> Result<(), InstrumentError> {
        let mut inner = self.lock();
        let result = self.create_tasks(&mut inner);
        if let Err(err) = result {
            inner.connected = false;
            error!("{}: Connection error: {err}", self.name);
            return Err(err.into());
        }
        inner.connected = true;
        inner.readings.invalidate();
        info!("{}: Connected to {} and {}", self.name, self.modules.adc, self.modules.dac);
        Ok(())
    }

    fn create_tasks(&self, inner: &mut Inner<S>) -> Result<(), DaqError> {
        let mut monitors = inner.system.create_task(MONITOR_TASK)?;
        let mut controls = inner.system.create_task(CONTROL_TASK)?;
        for supply in &inner.supplies {
            let cfg = &supply.config;
            let (ai_min, ai_max) = cfg.model.monitor_range();
            let (ao_min, ao_max) = cfg.model.control_range();
            monitors.add_ai_voltage_channel(
                &self.ai_channel(cfg.voltage_monitor),
                ai_min,
                ai_max,
            )?;
            if let Some(current_monitor) = cfg.current_monitor {
                monitors.add_ai_voltage_channel(
                    &self.ai_channel(current_monitor),
                    ai_min,
                    ai_max,
                )?;
            }
            controls.add_ao_voltage_channel(
                &self.ao_channel(cfg.voltage_control),
                ao_min,
                ao_max,
            )?;
        }
        monitors.start()?;
        controls.start()?;
        inner.monitors = Some(monitors);
        inner.controls = Some(controls);
        Ok(())
    }

    fn ai_channel(&self, input: u32) -> String {
        format!("/{}/AI{input}", self.modules.adc)
    }

    fn ao_channel(&self, output: u32) -> String {
        format!("/{}/AO{output}", self.modules.dac)
    }

    /// Clear both tasks.
    pub fn close(&self) -> Result<(), InstrumentError> {
        let mut inner = self.lock();
        inner.connected = false;
        inner.readings.invalidate();
        let monitors = inner.monitors.take();
        let controls = inner.controls.take();
        for mut task in [monitors, controls].into_iter().flatten() {
            task.clear()?;
        }
        info!("{}: Connection closed", self.name);
        Ok(())
    }

    /// Are the tasks set up and was there no connection error since?
    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    /// Names of all supplies, in configuration order.
    pub fn channel_names(&self) -> Vec<String> {
        self.lock()
            .supplies
            .iter()
            .map(|s| s.config.name.clone())
            .collect()
    }

    /// Rename a supply. The physical channels of the supply are kept.
    pub fn set_name(&self, channel_name: &str, new_name: &str) -> Result<(), InstrumentError> {
        let mut inner = self.lock();
        if inner.supplies.iter().any(|s| s.config.name == new_name) {
            return Err(InstrumentError::InvalidArgument(format!(
                "{new_name} is an invalid name, cannot duplicate names!"
            )));
        }
        let idx = index_of(&inner.supplies, channel_name)?;
        inner.supplies[idx].config.name = new_name.to_string();
        debug!("{}: Renamed '{channel_name}' to '{new_name}'", self.name);
        Ok(())
    }

    /// Output voltage of a supply, from the voltage monitor.
    pub fn read_voltage(&self, channel_name: &str) -> Result<Voltage, InstrumentError> {
        let (_, reading) = self.reading(channel_name)?;
        Ok(Voltage::from_volts(reading.voltage))
    }

    /// Output current of a supply, from the current monitor.
    ///
    /// Fails with [`InstrumentError::InvalidArgument`] if the supply has no current monitor.
    pub fn read_current(&self, channel_name: &str) -> Result<Current, InstrumentError> {
        let (model, reading) = self.reading(channel_name)?;
        reading
            .current
            .map(Current::from_milliamperes)
            .ok_or_else(|| {
                InstrumentError::InvalidArgument(format!(
                    "Supply '{channel_name}' ({model:?}) has no current monitor"
                ))
            })
    }

    fn reading(&self, channel_name: &str) -> Result<(Model, Reading), InstrumentError> {
        let mut inner = self.lock();
        let idx = index_of(&inner.supplies, channel_name)?;
        let model = inner.supplies[idx].config.model;
        let readings = self.update_readings(&mut inner)?;
        Ok((model, readings[idx]))
    }

    /// Read all monitors, unless the cached readings are fresh.
    fn update_readings(&self, inner: &mut Inner<S>) -> Result<Vec<Reading>, InstrumentError> {
        if inner.readings.is_fresh() {
            if let Some(readings) = inner.readings.value() {
                return Ok(readings.clone());
            }
        }
        match self.measure(inner) {
            Ok(readings) => {
                inner.readings.set(readings.clone());
                Ok(readings)
            }
            Err(InstrumentError::Measurement(msg)) => {
                let nan = inner
                    .supplies
                    .iter()
                    .map(|s| Reading {
                        voltage: f64::NAN,
                        current: s.config.current_monitor.map(|_| f64::NAN),
                    })
                    .collect();
                inner.readings.set(nan);
                Err(InstrumentError::Measurement(msg))
            }
            Err(err) => {
                inner.readings.invalidate();
                Err(err)
            }
        }
    }

    fn measure(&self, inner: &mut Inner<S>) -> Result<Vec<Reading>, InstrumentError> {
        if !inner.connected {
            return Err(self.not_connected());
        }
        let monitors = inner.monitors.as_mut().ok_or_else(|| self.not_connected())?;
        let samples = match monitors.read_analog(SAMPLES_PER_CHANNEL, self.timeout) {
            Ok(samples) => samples,
            Err(err) => {
                if matches!(err, DaqError::DeviceNotAccessible(_)) {
                    inner.connected = false;
                }
                error!("{}: Reading monitors failed: {err}", self.name);
                return Err(err.into());
            }
        };

        let nof_inputs: usize = inner
            .supplies
            .iter()
            .map(|s| 1 + usize::from(s.config.current_monitor.is_some()))
            .sum();
        if samples.samples_per_channel_read != SAMPLES_PER_CHANNEL
            || samples.data.len() != nof_inputs
        {
            return Err(InstrumentError::Measurement(format!(
                "{}: Requested and read samples mismatch! Requested {SAMPLES_PER_CHANNEL} samples on {nof_inputs} channels, read {} samples on {} channels",
                self.name,
                samples.samples_per_channel_read,
                samples.data.len()
            )));
        }

        let mut means = samples.channel_means().into_iter();
        let mut readings = Vec::with_capacity(inner.supplies.len());
        for supply in &inner.supplies {
            let model = supply.config.model;
            let voltage = means.next().unwrap_or(f64::NAN) * model.voltage_monitor_scaling();
            let current = match model.current_monitor_scaling() {
                Some(scaling) => Some(means.next().unwrap_or(f64::NAN) * scaling),
                None => None,
            };
            readings.push(Reading { voltage, current });
        }
        Ok(readings)
    }

    /// Set the output voltage of a supply. The control voltages of all supplies are written.
    ///
    /// For the negative polarity J4-5N, the magnitude of the output voltage is given.
    pub fn set_voltage(&self, channel_name: &str, value: Voltage) -> Result<(), InstrumentError> {
        let mut inner = self.lock();
        if !inner.connected {
            return Err(self.not_connected());
        }
        let idx = index_of(&inner.supplies, channel_name)?;
        let model = inner.supplies[idx].config.model;
        let scaling = model.set_scaling();
        let (ao_min, ao_max) = model.control_range();
        let volts = value.as_volts();
        let control_value = volts * scaling;
        if !(ao_min..=ao_max).contains(&control_value) {
            return Err(InstrumentError::FloatValueOutOfRange {
                value: volts,
                min: ao_min / scaling,
                max: ao_max / scaling,
            });
        }

        let mut values: Vec<f64> = inner.supplies.iter().map(|s| s.control_value).collect();
        values[idx] = control_value;
        debug!("{}: Writing control voltages {values:?}", self.name);
        let controls = inner.controls.as_mut().ok_or_else(|| self.not_connected())?;
        let written = match controls.write_analog(&values, self.timeout) {
            Ok(written) => written,
            Err(err) => {
                if matches!(err, DaqError::DeviceNotAccessible(_)) {
                    inner.connected = false;
                }
                error!("{}: Writing control voltages failed: {err}", self.name);
                return Err(err.into());
            }
        };
        if written == 0 {
            return Err(InstrumentError::Measurement(format!(
                "{}: Requested and written samples mismatch!",
                self.name
            )));
        }
        inner.supplies[idx].control_value = control_value;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<S>> {
        self.inner.lock().expect("Mutex should not be poisoned")
    }

    fn not_connected(&self) -> InstrumentError {
        InstrumentError::NotConnected(format!("{}: Not connected to DAQ modules", self.name))
    }
}

impl<S: DaqSystem> Clone for HvsController<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            modules: self.modules.clone(),
            timeout: self.timeout,
            name: self.name.clone(),
        }
    }
}

fn index_of(supplies: &[Supply], channel_name: &str) -> Result<usize, InstrumentError> {
    supplies
        .iter()
        .position(|s| s.config.name == channel_name)
        .ok_or_else(|| {
            InstrumentError::InvalidArgument(format!("No supply with name '{channel_name}'"))
        })
}
