//! PID controllers from a fast analog input to a fast analog output.
//!
//! The relock feature monitors one of the slow analog inputs (XADC inputs `AIN0` to `AIN3`).
//! If its voltage leaves the configured window, the integrator is frozen and the output is
//! ramped with the configured step size until the input is back inside the window.

use std::sync::{Arc, Mutex};

use measurements::Voltage;

use amodevices::{
    InstrumentError, InstrumentInterface,
    convert::{to_bool, to_float, to_int},
};

/// Number of slow analog inputs that can be used for relocking.
pub const RELOCK_INPUTS: u8 = 4;

/// Handle to the PID controller for one input/output pair.
pub struct Pid<T: InstrumentInterface> {
    interface: Arc<Mutex<T>>,
    input: u8,
    output: u8,
}

impl<T: InstrumentInterface> Pid<T> {
    pub(crate) fn new(interface: Arc<Mutex<T>>, input: u8, output: u8) -> Self {
        Self {
            interface,
            input,
            output,
        }
    }

    /// Input of the controller.
    pub fn input(&self) -> u8 {
        self.input
    }

    /// Output of the controller.
    pub fn output(&self) -> u8 {
        self.output
    }

    /// Get the setpoint.
    pub fn get_setpoint(&mut self) -> Result<Voltage, InstrumentError> {
        Ok(Voltage::from_volts(self.query_float("SETPoint")?))
    }

    /// Set the setpoint.
    pub fn set_setpoint(&mut self, setpoint: Voltage) -> Result<(), InstrumentError> {
        self.set("SETPoint", setpoint.as_volts())
    }

    /// Get the global gain.
    pub fn get_kg(&mut self) -> Result<f64, InstrumentError> {
        self.query_float("KG")
    }

    /// Set the global gain (0 to 4096).
    pub fn set_kg(&mut self, gain: f64) -> Result<(), InstrumentError> {
        self.set("KG", gain)
    }

    /// Get the proportional gain.
    pub fn get_kp(&mut self) -> Result<f64, InstrumentError> {
        self.query_float("KP")
    }

    /// Set the proportional gain (0 to 4096).
    pub fn set_kp(&mut self, gain: f64) -> Result<(), InstrumentError> {
        self.set("KP", gain)
    }

    /// Get the integral gain in 1/s. The unity gain frequency is `ki / (2 pi)`.
    pub fn get_ki(&mut self) -> Result<f64, InstrumentError> {
        self.query_float("KI")
    }

    /// Set the integral gain in 1/s.
    pub fn set_ki(&mut self, gain: f64) -> Result<(), InstrumentError> {
        self.set("KI", gain)
    }

    /// Get the gain of the second integrator in 1/s. The corner frequency is `kii / (2 pi)`.
    pub fn get_kii(&mut self) -> Result<f64, InstrumentError> {
        self.query_float("KII")
    }

    /// Set the gain of the second integrator in 1/s.
    pub fn set_kii(&mut self, gain: f64) -> Result<(), InstrumentError> {
        self.set("KII", gain)
    }

    /// Get the derivative gain in s. The unity gain frequency is `1 / (2 pi kd)`.
    pub fn get_kd(&mut self) -> Result<f64, InstrumentError> {
        self.query_float("KD")
    }

    /// Set the derivative gain in s.
    pub fn set_kd(&mut self, gain: f64) -> Result<(), InstrumentError> {
        self.set("KD", gain)
    }

    /// Is the integrator held in reset?
    pub fn get_int_reset_state(&mut self) -> Result<bool, InstrumentError> {
        self.query_bool("INT:RES")
    }

    /// Hold the integrator in reset or release it.
    pub fn set_int_reset_state(&mut self, state: bool) -> Result<(), InstrumentError> {
        self.set("INT:RES", u8::from(state))
    }

    /// Is the internal state of the controller held?
    pub fn get_hold_state(&mut self) -> Result<bool, InstrumentError> {
        self.query_bool("HOLD")
    }

    /// Hold the internal state of the controller or release it.
    pub fn set_hold_state(&mut self, state: bool) -> Result<(), InstrumentError> {
        self.set("HOLD", u8::from(state))
    }

    /// Is the integrator reset automatically when the output hits a limit?
    pub fn get_int_auto_state(&mut self) -> Result<bool, InstrumentError> {
        self.query_bool("INT:AUTO")
    }

    /// Enable or disable the automatic integrator reset.
    pub fn set_int_auto_state(&mut self, state: bool) -> Result<(), InstrumentError> {
        self.set("INT:AUTO", u8::from(state))
    }

    /// Is the sign of the output inverted?
    pub fn get_inv_state(&mut self) -> Result<bool, InstrumentError> {
        self.query_bool("INV")
    }

    /// Invert the sign of the output or not.
    pub fn set_inv_state(&mut self, state: bool) -> Result<(), InstrumentError> {
        self.set("INV", u8::from(state))
    }

    /// Is relocking enabled?
    pub fn get_relock_state(&mut self) -> Result<bool, InstrumentError> {
        self.query_bool("REL")
    }

    /// Enable or disable relocking.
    pub fn set_relock_state(&mut self, state: bool) -> Result<(), InstrumentError> {
        self.set("REL", u8::from(state))
    }

    /// Get the relock step size (slew rate) in V/s.
    pub fn get_relock_stepsize(&mut self) -> Result<f64, InstrumentError> {
        self.query_float("REL:STEP")
    }

    /// Set the relock step size (slew rate) in V/s.
    pub fn set_relock_stepsize(&mut self, stepsize: f64) -> Result<(), InstrumentError> {
        self.set("REL:STEP", stepsize)
    }

    /// Get the lowest relock input voltage at which the controller counts as locked.
    pub fn get_relock_minimum(&mut self) -> Result<Voltage, InstrumentError> {
        Ok(Voltage::from_volts(self.query_float("REL:MIN")?))
    }

    /// Set the lowest relock input voltage at which the controller counts as locked.
    pub fn set_relock_minimum(&mut self, minimum: Voltage) -> Result<(), InstrumentError> {
        self.set("REL:MIN", minimum.as_volts())
    }

    /// Get the highest relock input voltage at which the controller counts as locked.
    pub fn get_relock_maximum(&mut self) -> Result<Voltage, InstrumentError> {
        Ok(Voltage::from_volts(self.query_float("REL:MAX")?))
    }

    /// Set the highest relock input voltage at which the controller counts as locked.
    pub fn set_relock_maximum(&mut self, maximum: Voltage) -> Result<(), InstrumentError> {
        self.set("REL:MAX", maximum.as_volts())
    }

    /// Get the slow analog input (0 to 3) that is monitored for relocking.
    pub fn get_relock_input(&mut self) -> Result<u8, InstrumentError> {
        let resp = self.query("REL:INP")?;
        let idx = resp
            .strip_prefix("AIN")
            .ok_or_else(|| {
                InstrumentError::ResponseParseError(format!("Unknown relock input '{resp}'"))
            })
            .and_then(to_int)?;
        u8::try_from(idx)
            .ok()
            .filter(|idx| *idx < RELOCK_INPUTS)
            .ok_or_else(|| {
                InstrumentError::ResponseParseError(format!("Unknown relock input '{resp}'"))
            })
    }

    /// Set the slow analog input (0 to 3) that is monitored for relocking.
    pub fn set_relock_input(&mut self, input: u8) -> Result<(), InstrumentError> {
        if input >= RELOCK_INPUTS {
            return Err(InstrumentError::IntValueOutOfRange {
                value: input.into(),
                min: 0,
                max: (RELOCK_INPUTS - 1).into(),
            });
        }
        self.set("REL:INP", format!("AIN{input}"))
    }

    fn prefix(&self) -> String {
        format!("PID:IN{}:OUT{}:", self.input, self.output)
    }

    fn set<V: std::fmt::Display>(&mut self, param: &str, value: V) -> Result<(), InstrumentError> {
        let cmd = format!("{}{param} {value}", self.prefix());
        let mut intf = self.interface.lock().expect("Mutex should not be poisoned");
        intf.sendcmd(&cmd)
    }

    fn query(&mut self, param: &str) -> Result<String, InstrumentError> {
        let cmd = format!("{}{param}?", self.prefix());
        let mut intf = self.interface.lock().expect("Mutex should not be poisoned");
        intf.query(&cmd)
    }

    fn query_float(&mut self, param: &str) -> Result<f64, InstrumentError> {
        to_float(&self.query(param)?)
    }

    fn query_bool(&mut self, param: &str) -> Result<bool, InstrumentError> {
        to_bool(&self.query(param)?)
    }
}
