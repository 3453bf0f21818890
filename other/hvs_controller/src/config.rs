//! Configuration of the high voltage controller.
//!
//! The parameters live in `DeviceSpecificParams` of the device configuration:
//!
//! ```json
//! {
//!     "cDAQs": {"adc": "cDAQ1Mod1", "dac": "cDAQ1Mod2"},
//!     "channels": [
//!         {"name": "HV1", "model": "Matsusada KA-10P", "voltage_monitor": 0,
//!          "current_monitor": 4, "voltage_control": 0},
//!         {"name": "HV2", "model": "Matsusada J4-5P", "voltage_monitor": 1,
//!          "voltage_control": 1}
//!     ]
//! }
//! ```

use serde::{Deserialize, Serialize};

use amodevices::InstrumentError;

/// Supported high voltage supply models.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum Model {
    /// Matsusada KA-10P, with voltage and current monitor.
    #[serde(rename = "Matsusada KA-10P")]
    Ka10p,
    /// Matsusada J4-5P, positive polarity, with voltage monitor.
    #[serde(rename = "Matsusada J4-5P")]
    J45p,
    /// Matsusada J4-5N, negative polarity, with voltage monitor.
    #[serde(rename = "Matsusada J4-5N")]
    J45n,
}

impl Model {
    /// Range of the monitor inputs in V.
    pub fn monitor_range(&self) -> (f64, f64) {
        match self {
            Model::Ka10p => (0.0, 10.0),
            Model::J45p | Model::J45n => (0.0, 5.0),
        }
    }

    /// Range of the control output in V.
    pub fn control_range(&self) -> (f64, f64) {
        match self {
            Model::Ka10p => (0.0, 10.0),
            Model::J45p | Model::J45n => (0.0, 9.0),
        }
    }

    /// Control voltage per V of output voltage.
    pub fn set_scaling(&self) -> f64 {
        match self {
            Model::Ka10p => 0.001,
            Model::J45p | Model::J45n => 0.0018,
        }
    }

    /// Output voltage in V per V of voltage monitor signal.
    pub fn voltage_monitor_scaling(&self) -> f64 {
        1000.0
    }

    /// Output current in mA per V of current monitor signal, if the model has a current
    /// monitor.
    pub fn current_monitor_scaling(&self) -> Option<f64> {
        match self {
            Model::Ka10p => Some(0.1),
            Model::J45p | Model::J45n => None,
        }
    }
}

/// Names of the DAQ modules.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Modules {
    /// Module that reads the monitor signals.
    pub adc: String,
    /// Module that outputs the control signals.
    pub dac: String,
}

/// Connection of one high voltage supply to the DAQ modules.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct SupplyConfig {
    /// Name of the supply.
    pub name: String,
    /// Model of the supply.
    pub model: Model,
    /// Analog input of the voltage monitor.
    pub voltage_monitor: u32,
    /// Analog input of the current monitor. Required for models with a current monitor.
    #[serde(default)]
    pub current_monitor: Option<u32>,
    /// Analog output of the voltage control.
    pub voltage_control: u32,
}

/// Device specific parameters of the controller.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct HvsParams {
    /// DAQ modules.
    #[serde(rename = "cDAQs")]
    pub modules: Modules,
    /// Supplies, in the order of their monitor and control channels.
    pub channels: Vec<SupplyConfig>,
}

impl HvsParams {
    /// Check that names are unique and that current monitors are given where needed.
    pub fn validate(&self) -> Result<(), InstrumentError> {
        for (idx, supply) in self.channels.iter().enumerate() {
            if self.channels[..idx].iter().any(|s| s.name == supply.name) {
                return Err(InstrumentError::InvalidArgument(format!(
                    "Supply name '{}' is used more than once",
                    supply.name
                )));
            }
            let needs_current = supply.model.current_monitor_scaling().is_some();
            if needs_current != supply.current_monitor.is_some() {
                return Err(InstrumentError::InvalidArgument(format!(
                    "Supply '{}' ({:?}) {} a current monitor",
                    supply.name,
                    supply.model,
                    if needs_current { "requires" } else { "does not have" }
                )));
            }
        }
        Ok(())
    }
}
