//! Fast analog outputs and their signal generators.

use std::{
    fmt::Display,
    sync::{Arc, Mutex},
};

use measurements::{Frequency, Voltage};

use amodevices::{
    InstrumentError, InstrumentInterface,
    convert::{to_bool, to_float},
};

/// Waveform of the signal generator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Waveform {
    /// Sine wave.
    Sine,
    /// Square wave.
    Square,
    /// Triangle wave.
    Triangle,
    /// Rising sawtooth.
    SawUp,
    /// Falling sawtooth.
    SawDown,
    /// Pulse width modulation.
    Pwm,
    /// Arbitrary waveform.
    Arbitrary,
}

impl Waveform {
    const ALL: [Waveform; 7] = [
        Waveform::Sine,
        Waveform::Square,
        Waveform::Triangle,
        Waveform::SawUp,
        Waveform::SawDown,
        Waveform::Pwm,
        Waveform::Arbitrary,
    ];

    fn as_scpi(&self) -> &'static str {
        match self {
            Waveform::Sine => "SINE",
            Waveform::Square => "SQUARE",
            Waveform::Triangle => "TRIANGLE",
            Waveform::SawUp => "SAWU",
            Waveform::SawDown => "SAWD",
            Waveform::Pwm => "PWM",
            Waveform::Arbitrary => "ARBITRARY",
        }
    }
}

impl Display for Waveform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_scpi())
    }
}

impl TryFrom<&str> for Waveform {
    type Error = InstrumentError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let value = value.trim();
        Waveform::ALL
            .into_iter()
            .find(|wf| wf.as_scpi().eq_ignore_ascii_case(value))
            .ok_or_else(|| {
                InstrumentError::ResponseParseError(format!("Unknown waveform '{value}'"))
            })
    }
}

/// Handle to a fast analog output.
pub struct Output<T: InstrumentInterface> {
    interface: Arc<Mutex<T>>,
    output: u8,
}

impl<T: InstrumentInterface> Output<T> {
    pub(crate) fn new(interface: Arc<Mutex<T>>, output: u8) -> Self {
        Self { interface, output }
    }

    /// Number of the output.
    pub fn output(&self) -> u8 {
        self.output
    }

    /// Is the signal generator output enabled?
    pub fn get_output_state(&mut self) -> Result<bool, InstrumentError> {
        to_bool(&self.query(&format!("OUTPUT{}:STATE?", self.output))?)
    }

    /// Enable or disable the signal generator output.
    pub fn set_output_state(&mut self, state: bool) -> Result<(), InstrumentError> {
        self.sendcmd(&format!("OUTPUT{}:STATE {}", self.output, u8::from(state)))
    }

    /// Get the frequency of the signal generator.
    pub fn get_generator_frequency(&mut self) -> Result<Frequency, InstrumentError> {
        let resp = self.query(&format!("SOUR{}:FREQ:FIX?", self.output))?;
        Ok(Frequency::from_hertz(to_float(&resp)?))
    }

    /// Set the frequency of the signal generator.
    pub fn set_generator_frequency(&mut self, freq: Frequency) -> Result<(), InstrumentError> {
        self.sendcmd(&format!("SOUR{}:FREQ:FIX {}", self.output, freq.as_hertz()))
    }

    /// Get the waveform of the signal generator.
    pub fn get_generator_waveform(&mut self) -> Result<Waveform, InstrumentError> {
        let resp = self.query(&format!("SOUR{}:FUNC?", self.output))?;
        Waveform::try_from(resp.as_str())
    }

    /// Set the waveform of the signal generator.
    pub fn set_generator_waveform(&mut self, waveform: Waveform) -> Result<(), InstrumentError> {
        self.sendcmd(&format!("SOUR{}:FUNC {waveform}", self.output))
    }

    /// Get the amplitude of the signal generator.
    pub fn get_generator_amplitude(&mut self) -> Result<Voltage, InstrumentError> {
        self.query_voltage(&format!("SOUR{}:VOLT?", self.output))
    }

    /// Set the amplitude of the signal generator.
    ///
    /// Amplitude and offset together must stay within the output range of +/- 1 V.
    pub fn set_generator_amplitude(&mut self, amplitude: Voltage) -> Result<(), InstrumentError> {
        self.sendcmd(&format!("SOUR{}:VOLT {}", self.output, amplitude.as_volts()))
    }

    /// Get the offset of the signal generator.
    pub fn get_generator_offset(&mut self) -> Result<Voltage, InstrumentError> {
        self.query_voltage(&format!("SOUR{}:VOLT:OFFS?", self.output))
    }

    /// Set the offset of the signal generator.
    pub fn set_generator_offset(&mut self, offset: Voltage) -> Result<(), InstrumentError> {
        self.sendcmd(&format!("SOUR{}:VOLT:OFFS {}", self.output, offset.as_volts()))
    }

    /// Get the lower limit of the output voltage.
    pub fn get_output_minimum(&mut self) -> Result<Voltage, InstrumentError> {
        self.query_voltage(&format!("OUT{}:LIM:MIN?", self.output))
    }

    /// Set the lower limit of the output voltage.
    pub fn set_output_minimum(&mut self, minimum: Voltage) -> Result<(), InstrumentError> {
        self.sendcmd(&format!("OUT{}:LIM:MIN {}", self.output, minimum.as_volts()))
    }

    /// Get the upper limit of the output voltage.
    pub fn get_output_maximum(&mut self) -> Result<Voltage, InstrumentError> {
        self.query_voltage(&format!("OUT{}:LIM:MAX?", self.output))
    }

    /// Set the upper limit of the output voltage.
    pub fn set_output_maximum(&mut self, maximum: Voltage) -> Result<(), InstrumentError> {
        self.sendcmd(&format!("OUT{}:LIM:MAX {}", self.output, maximum.as_volts()))
    }

    /// Read the voltage at the fast analog input with the same number as this output.
    pub fn get_fast_analog_input(&mut self) -> Result<Voltage, InstrumentError> {
        self.query_voltage(&format!("ANALOG:IN{}:VOLT?", self.output))
    }

    /// Read the voltage at this fast analog output.
    pub fn get_fast_analog_output(&mut self) -> Result<Voltage, InstrumentError> {
        self.query_voltage(&format!("ANALOG:OUT{}:VOLT?", self.output))
    }

    fn query_voltage(&mut self, cmd: &str) -> Result<Voltage, InstrumentError> {
        Ok(Voltage::from_volts(to_float(&self.query(cmd)?)?))
    }

    fn query(&mut self, cmd: &str) -> Result<String, InstrumentError> {
        let mut intf = self.interface.lock().expect("Mutex should not be poisoned");
        intf.query(cmd)
    }

    fn sendcmd(&mut self, cmd: &str) -> Result<(), InstrumentError> {
        let mut intf = self.interface.lock().expect("Mutex should not be poisoned");
        intf.sendcmd(cmd)
    }
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;

    #[rstest]
    #[case("SINE", Waveform::Sine)]
    #[case("sawd", Waveform::SawDown)]
    #[case(" ARBITRARY ", Waveform::Arbitrary)]
    fn test_waveform_from_str(#[case] resp: &str, #[case] exp: Waveform) {
        assert_eq!(Waveform::try_from(resp).unwrap(), exp);
    }

    #[test]
    fn test_waveform_unknown() {
        assert!(matches!(
            Waveform::try_from("NOISE"),
            Err(InstrumentError::ResponseParseError(_))
        ));
    }
}
