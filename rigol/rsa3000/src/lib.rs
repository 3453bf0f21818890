//! A rust driver for the Rigol RSA3000 series spectrum analyzers, controlled through VISA.
//!
//! The frequency axis and the traces are accessed via handles, see [`Rsa3000::freq`] and
//! [`Rsa3000::trace`]. Trace data can only be parsed in the ASCII format, which has to be
//! selected with [`Rsa3000::set_trace_data_format`] if the analyzer is set up differently. The
//! tracking generator of the RSA3000 is controlled through the `:EXTernal` subsystem.
//!
//! # Example
//!
//! ```no_run
//! use amodevices::{DeviceConfig, InstrumentError, VisaResourceManager};
//! use measurements::Frequency;
//! use rigol_rsa3000::{Rsa3000, TraceDataFormat};
//!
//! fn run<M: VisaResourceManager>(rm: &mut M) -> Result<(), InstrumentError> {
//!     let config = DeviceConfig::new("Rigol RSA", "USB0::0x1AB1::0x0968::RSA3E123456::INSTR");
//!     let mut inst = Rsa3000::connect(rm, &config)?;
//!     inst.set_trace_data_format(TraceDataFormat::Ascii)?;
//!     inst.freq().set_center(Frequency::from_megahertz(110.0))?;
//!     let data = inst.trace(1)?.data()?;
//!     println!("{data:?}");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

use std::{
    fmt::Display,
    sync::{Arc, Mutex},
};

use measurements::Frequency;
use tracing::info;

use amodevices::{
    DeviceConfig, InstrumentError, InstrumentInterface, VisaInterface, VisaResourceManager,
    convert::{parse_float_list, to_bool, to_float, to_int},
};

/// Traces of the analyzer.
const TRACES: std::ops::RangeInclusive<u8> = 1..=6;

/// Unit of the y-axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum YUnit {
    /// dBm
    Dbm,
    /// dBmV
    Dbmv,
    /// dBµV
    Dbuv,
    /// Volt
    Volt,
    /// Watt
    Watt,
}

impl YUnit {
    fn as_str(&self) -> &'static str {
        match self {
            YUnit::Dbm => "DBM",
            YUnit::Dbmv => "DBMV",
            YUnit::Dbuv => "DBUV",
            YUnit::Volt => "V",
            YUnit::Watt => "W",
        }
    }

    fn from_cmd_str(resp: &str) -> Result<Self, InstrumentError> {
        [YUnit::Dbm, YUnit::Dbmv, YUnit::Dbuv, YUnit::Volt, YUnit::Watt]
            .into_iter()
            .find(|unit| unit.as_str().eq_ignore_ascii_case(resp))
            .ok_or_else(|| InstrumentError::ResponseParseError(resp.to_string()))
    }
}

impl Display for YUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Detector type of a trace.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Detector {
    /// Average.
    Average,
    /// Negative peak.
    Negative,
    /// Normal.
    Normal,
    /// Positive peak.
    Positive,
    /// Sample.
    Sample,
    /// Quasi peak.
    QuasiPeak,
    /// Voltage average.
    VoltageAverage,
}

impl Detector {
    fn as_str(&self) -> &'static str {
        match self {
            Detector::Average => "AVER",
            Detector::Negative => "NEG",
            Detector::Normal => "NORM",
            Detector::Positive => "POS",
            Detector::Sample => "SAMP",
            Detector::QuasiPeak => "QPE",
            Detector::VoltageAverage => "RAV",
        }
    }

    fn from_cmd_str(resp: &str) -> Result<Self, InstrumentError> {
        let resp_upper = resp.to_ascii_uppercase();
        [
            Detector::Average,
            Detector::Negative,
            Detector::Normal,
            Detector::Positive,
            Detector::Sample,
            Detector::QuasiPeak,
            Detector::VoltageAverage,
        ]
        .into_iter()
        .find(|det| resp_upper.starts_with(det.as_str()))
        .ok_or_else(|| InstrumentError::ResponseParseError(resp.to_string()))
    }
}

impl Display for Detector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Format in which trace data is transferred.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraceDataFormat {
    /// Comma-separated ASCII values.
    Ascii,
    /// 32 bit binary integers.
    Integer32,
    /// 32 bit binary floats.
    Real32,
    /// 64 bit binary floats.
    Real64,
}

impl TraceDataFormat {
    fn as_str(&self) -> &'static str {
        match self {
            TraceDataFormat::Ascii => "ASCii",
            TraceDataFormat::Integer32 => "INTeger,32",
            TraceDataFormat::Real32 => "REAL,32",
            TraceDataFormat::Real64 => "REAL,64",
        }
    }

    /// Queries return the short forms, e.g., `ASC,8` or `INT,32`.
    fn from_cmd_str(resp: &str) -> Result<Self, InstrumentError> {
        let resp_upper = resp.to_ascii_uppercase();
        match resp_upper.split(',').next().unwrap_or_default() {
            s if s.starts_with("ASC") => Ok(TraceDataFormat::Ascii),
            s if s.starts_with("INT") => Ok(TraceDataFormat::Integer32),
            "REAL" if resp_upper.ends_with("32") => Ok(TraceDataFormat::Real32),
            "REAL" if resp_upper.ends_with("64") => Ok(TraceDataFormat::Real64),
            _ => Err(InstrumentError::ResponseParseError(resp.to_string())),
        }
    }
}

impl Display for TraceDataFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A rust driver for the RSA3000.
pub struct Rsa3000<T: InstrumentInterface> {
    interface: Arc<Mutex<T>>,
    name: String,
}

impl<T: InstrumentInterface> Rsa3000<T> {
    /// Create a new analyzer instance with an already opened interface.
    pub fn try_new(interface: T) -> Result<Self, InstrumentError> {
        let mut intf = interface;
        intf.set_terminator("\n");
        Ok(Rsa3000 {
            interface: Arc::new(Mutex::new(intf)),
            name: "Rigol RSA3000".to_string(),
        })
    }

    /// Set the name of the device used in log messages.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Get a handle to the frequency axis.
    pub fn freq(&self) -> FrequencyAxis<T> {
        FrequencyAxis {
            interface: self.interface.clone(),
        }
    }

    /// Get a handle to the trace with the given number (1-6).
    pub fn trace(&self, trace_id: u8) -> Result<Trace<T>, InstrumentError> {
        if !TRACES.contains(&trace_id) {
            return Err(InstrumentError::IntValueOutOfRange {
                value: trace_id.into(),
                min: (*TRACES.start()).into(),
                max: (*TRACES.end()).into(),
            });
        }
        Ok(Trace {
            interface: self.interface.clone(),
            trace_id,
        })
    }

    /// Send a command.
    pub fn write(&mut self, cmd: &str) -> Result<(), InstrumentError> {
        let mut intf = self.interface.lock().expect("Mutex should not be poisoned");
        intf.sendcmd(cmd)
    }

    /// Send a query and return the response.
    pub fn query(&mut self, cmd: &str) -> Result<String, InstrumentError> {
        let mut intf = self.interface.lock().expect("Mutex should not be poisoned");
        query(&mut *intf, cmd)
    }

    /// Get the unit of the y-axis.
    pub fn get_y_unit(&mut self) -> Result<YUnit, InstrumentError> {
        YUnit::from_cmd_str(&self.query(":UNIT:POWer?")?)
    }

    /// Set the unit of the y-axis.
    pub fn set_y_unit(&mut self, unit: YUnit) -> Result<(), InstrumentError> {
        self.write(&format!(":UNIT:POWer {unit}"))
    }

    /// Get the resolution bandwidth.
    pub fn get_rbw(&mut self) -> Result<Frequency, InstrumentError> {
        let resp = self.query(":BANDwidth:RESolution?")?;
        Ok(Frequency::from_hertz(to_float(&resp)?))
    }

    /// Set the resolution bandwidth.
    pub fn set_rbw(&mut self, rbw: Frequency) -> Result<(), InstrumentError> {
        self.write(&format!(":BANDwidth:RESolution {}", rbw.as_hertz()))
    }

    /// Is the analyzer measuring continuously?
    pub fn get_continuous_measurement(&mut self) -> Result<bool, InstrumentError> {
        to_bool(&self.query(":INITiate:CONTinuous?")?)
    }

    /// Switch between continuous (`true`) and single (`false`) measurement mode.
    pub fn set_continuous_measurement(&mut self, continuous: bool) -> Result<(), InstrumentError> {
        self.write(&format!(":INITiate:CONTinuous {}", u8::from(continuous)))
    }

    /// Get the acquisition time in seconds (real-time mode only).
    pub fn get_acquisition_time(&mut self) -> Result<f64, InstrumentError> {
        to_float(&self.query(":ACQuisition:TIME?")?)
    }

    /// Set the acquisition time in seconds (real-time mode only).
    pub fn set_acquisition_time(&mut self, time: f64) -> Result<(), InstrumentError> {
        self.write(&format!(":ACQuisition:TIME {time}"))
    }

    /// Get the number of sweep points.
    pub fn get_sweep_points(&mut self) -> Result<usize, InstrumentError> {
        let mut intf = self.interface.lock().expect("Mutex should not be poisoned");
        sweep_points(&mut *intf)
    }

    /// Set the number of sweep points.
    pub fn set_sweep_points(&mut self, num_points: usize) -> Result<(), InstrumentError> {
        self.write(&format!(":SWEEp:POINts {num_points}"))
    }

    /// Get the sweep time in seconds.
    pub fn get_sweep_time(&mut self) -> Result<f64, InstrumentError> {
        to_float(&self.query(":SWEEp:TIME?")?)
    }

    /// Set the sweep time in seconds.
    pub fn set_sweep_time(&mut self, time: f64) -> Result<(), InstrumentError> {
        self.write(&format!(":SWEEp:TIME {time}"))
    }

    /// Is the sweep time set automatically?
    pub fn get_sweep_time_auto(&mut self) -> Result<bool, InstrumentError> {
        to_bool(&self.query(":SWEEp:TIME:AUTO?")?)
    }

    /// Enable or disable the automatic sweep time.
    pub fn set_sweep_time_auto(&mut self, auto: bool) -> Result<(), InstrumentError> {
        self.write(&format!(":SWEEp:TIME:AUTO {}", u8::from(auto)))
    }

    /// Is the tracking generator output on?
    pub fn get_tg_output(&mut self) -> Result<bool, InstrumentError> {
        to_bool(&self.query(":OUTPut:EXTernal:STATe?")?)
    }

    /// Switch the tracking generator output on or off.
    pub fn set_tg_output(&mut self, state: bool) -> Result<(), InstrumentError> {
        self.write(&format!(":OUTPut:EXTernal:STATe {}", u8::from(state)))
    }

    /// Get the output amplitude of the tracking generator in dBm.
    pub fn get_tg_output_amplitude(&mut self) -> Result<f64, InstrumentError> {
        to_float(&self.query(":SOURce:EXTernal:POWer:LEVel:IMMediate:AMPLitude?")?)
    }

    /// Set the output amplitude of the tracking generator in dBm.
    pub fn set_tg_output_amplitude(&mut self, amplitude: f64) -> Result<(), InstrumentError> {
        self.write(&format!(
            ":SOURce:EXTernal:POWer:LEVel:IMMediate:AMPLitude {amplitude}"
        ))
    }

    /// Get the format in which trace data is transferred.
    pub fn get_trace_data_format(&mut self) -> Result<TraceDataFormat, InstrumentError> {
        TraceDataFormat::from_cmd_str(&self.query(":FORMat:TRACe:DATA?")?)
    }

    /// Set the format in which trace data is transferred.
    pub fn set_trace_data_format(
        &mut self,
        data_format: TraceDataFormat,
    ) -> Result<(), InstrumentError> {
        self.write(&format!(":FORMat:TRACe:DATA {data_format}"))
    }

    /// Start a sweep in single mode or trigger a measurement.
    pub fn sweep(&mut self) -> Result<(), InstrumentError> {
        self.write(":INITiate:IMMediate")
    }

    /// Close the connection to the analyzer.
    pub fn close(self) {
        info!("{}: Connection closed", self.name);
    }
}

impl<T: InstrumentInterface> Clone for Rsa3000<T> {
    fn clone(&self) -> Self {
        Self {
            interface: self.interface.clone(),
            name: self.name.clone(),
        }
    }
}

impl<R: InstrumentInterface> Rsa3000<VisaInterface<R>> {
    /// Connect to the analyzer at the VISA resource named in the configuration.
    pub fn connect<M>(rm: &mut M, config: &DeviceConfig) -> Result<Self, InstrumentError>
    where
        M: VisaResourceManager<Resource = R>,
    {
        let interface = VisaInterface::init(rm, config)?;
        Ok(Self::try_new(interface)?.with_name(&config.device))
    }
}

/// Handle to the frequency axis of the analyzer.
pub struct FrequencyAxis<T: InstrumentInterface> {
    interface: Arc<Mutex<T>>,
}

impl<T: InstrumentInterface> FrequencyAxis<T> {
    fn get(&mut self, param: &str) -> Result<Frequency, InstrumentError> {
        let mut intf = self.interface.lock().expect("Mutex should not be poisoned");
        let resp = query(&mut *intf, &format!(":FREQuency:{param}?"))?;
        Ok(Frequency::from_hertz(to_float(&resp)?))
    }

    fn set(&mut self, param: &str, freq: Frequency) -> Result<(), InstrumentError> {
        let mut intf = self.interface.lock().expect("Mutex should not be poisoned");
        intf.sendcmd(&format!(":FREQuency:{param} {}", freq.as_hertz()))
    }

    /// Get the center frequency.
    pub fn get_center(&mut self) -> Result<Frequency, InstrumentError> {
        self.get("CENTer")
    }

    /// Set the center frequency.
    pub fn set_center(&mut self, freq: Frequency) -> Result<(), InstrumentError> {
        self.set("CENTer", freq)
    }

    /// Get the frequency span.
    pub fn get_span(&mut self) -> Result<Frequency, InstrumentError> {
        self.get("SPAN")
    }

    /// Set the frequency span.
    pub fn set_span(&mut self, freq: Frequency) -> Result<(), InstrumentError> {
        self.set("SPAN", freq)
    }

    /// Get the start frequency.
    pub fn get_start(&mut self) -> Result<Frequency, InstrumentError> {
        self.get("STARt")
    }

    /// Set the start frequency.
    pub fn set_start(&mut self, freq: Frequency) -> Result<(), InstrumentError> {
        self.set("STARt", freq)
    }

    /// Get the stop frequency.
    pub fn get_stop(&mut self) -> Result<Frequency, InstrumentError> {
        self.get("STOP")
    }

    /// Set the stop frequency.
    pub fn set_stop(&mut self, freq: Frequency) -> Result<(), InstrumentError> {
        self.set("STOP", freq)
    }

    /// Frequencies of all sweep points, evenly spaced from start to stop frequency.
    pub fn values(&mut self) -> Result<Vec<Frequency>, InstrumentError> {
        let mut intf = self.interface.lock().expect("Mutex should not be poisoned");
        let start = to_float(&query(&mut *intf, ":FREQuency:STARt?")?)?;
        let stop = to_float(&query(&mut *intf, ":FREQuency:STOP?")?)?;
        let num = sweep_points(&mut *intf)?;
        let step = if num > 1 {
            (stop - start) / (num - 1) as f64
        } else {
            0.0
        };
        Ok((0..num)
            .map(|i| Frequency::from_hertz(start + step * i as f64))
            .collect())
    }
}

/// Handle to one trace of the analyzer.
pub struct Trace<T: InstrumentInterface> {
    interface: Arc<Mutex<T>>,
    trace_id: u8,
}

impl<T: InstrumentInterface> Trace<T> {
    /// Number of the trace.
    pub fn trace_id(&self) -> u8 {
        self.trace_id
    }

    /// Get the detector type of the trace.
    pub fn get_detector(&mut self) -> Result<Detector, InstrumentError> {
        let mut intf = self.interface.lock().expect("Mutex should not be poisoned");
        let resp = query(&mut *intf, &format!(":DETector:TRACe{}?", self.trace_id))?;
        Detector::from_cmd_str(&resp)
    }

    /// Set the detector type of the trace.
    pub fn set_detector(&mut self, detector: Detector) -> Result<(), InstrumentError> {
        let mut intf = self.interface.lock().expect("Mutex should not be poisoned");
        intf.sendcmd(&format!(":DETector:TRACe{} {detector}", self.trace_id))
    }

    /// Read the y-axis data of the trace, in the unit the analyzer is set to.
    pub fn data(&mut self) -> Result<Vec<f64>, InstrumentError> {
        let mut intf = self.interface.lock().expect("Mutex should not be poisoned");
        let resp = query(&mut *intf, &format!(":TRAC:DATA? TRACE{}", self.trace_id))?;
        parse_float_list(&resp)
    }
}

fn query<T: InstrumentInterface>(intf: &mut T, cmd: &str) -> Result<String, InstrumentError> {
    let resp = intf.query(cmd)?;
    if resp.is_empty() {
        return Err(InstrumentError::EmptyResponse);
    }
    Ok(resp)
}

fn sweep_points<T: InstrumentInterface>(intf: &mut T) -> Result<usize, InstrumentError> {
    let resp = query(intf, ":SWEEp:POINts?")?;
    usize::try_from(to_int(&resp)?).map_err(|_| InstrumentError::ResponseParseError(resp))
}
