//! A rust driver for the Siglent SSA3000X Plus series spectrum analyzers, controlled through VISA.
//!
//! The frequency axis and the traces of the analyzer are accessed via handles, see
//! [`Ssa3000xPlus::freq`] and [`Ssa3000xPlus::trace`]. The trace data format is set to ASCII
//! when the driver is created, since this is the only format the driver parses.
//!
//! # Example
//!
//! ```no_run
//! use amodevices::{DeviceConfig, InstrumentError, VisaResourceManager};
//! use measurements::Frequency;
//! use siglent_ssa3000xplus::{Detector, Ssa3000xPlus, YUnit};
//!
//! fn run<M: VisaResourceManager>(rm: &mut M) -> Result<(), InstrumentError> {
//!     let config = DeviceConfig::new("Spectrum analyzer", "TCPIP0::192.168.1.50::INSTR");
//!     let mut inst = Ssa3000xPlus::connect(rm, &config)?;
//!
//!     let mut freq = inst.freq();
//!     freq.set_center(Frequency::from_megahertz(80.0))?;
//!     freq.set_span(Frequency::from_kilohertz(200.0))?;
//!     inst.set_y_unit(YUnit::Dbm)?;
//!
//!     let mut trace = inst.trace(1)?;
//!     trace.set_detector(Detector::Positive)?;
//!     let x = freq.values()?;
//!     let y = trace.data()?;
//!     println!("{} points, first at {}: {} dBm", y.len(), x[0], y[0]);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

mod settings;

use std::sync::{Arc, Mutex};

use measurements::Frequency;
use tracing::info;

use amodevices::{
    DeviceConfig, InstrumentError, InstrumentInterface, VisaInterface, VisaResourceManager,
    convert::{parse_float_list, to_bool, to_float, to_int},
};

pub use settings::{Detector, TraceDataFormat, YUnit};

/// Traces of the analyzer.
const TRACES: std::ops::RangeInclusive<u8> = 1..=4;

/// A rust driver for the SSA3000X Plus.
pub struct Ssa3000xPlus<T: InstrumentInterface> {
    interface: Arc<Mutex<T>>,
    name: String,
}

impl<T: InstrumentInterface> Ssa3000xPlus<T> {
    /// Create a new analyzer instance with an already opened interface.
    ///
    /// The terminator is set to `"\n"` and the trace data format to ASCII.
    pub fn try_new(interface: T) -> Result<Self, InstrumentError> {
        let mut intf = interface;
        intf.set_terminator("\n");
        let mut inst = Ssa3000xPlus {
            interface: Arc::new(Mutex::new(intf)),
            name: "Siglent SSA3000X Plus".to_string(),
        };
        inst.set_trace_data_format(TraceDataFormat::Ascii)?;
        Ok(inst)
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

    /// Get a handle to the trace with the given number (1-4).
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
        write(&self.interface, cmd)
    }

    /// Send a query and return the response.
    pub fn query(&mut self, cmd: &str) -> Result<String, InstrumentError> {
        query(&self.interface, cmd)
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

    /// Is the analyzer measuring continuously (`true`) or in single mode (`false`)?
    pub fn get_continuous_measurement(&mut self) -> Result<bool, InstrumentError> {
        to_bool(&self.query(":INITiate:CONTinuous?")?)
    }

    /// Switch between continuous (`true`) and single (`false`) measurement mode.
    pub fn set_continuous_measurement(&mut self, continuous: bool) -> Result<(), InstrumentError> {
        self.write(&format!(":INITiate:CONTinuous {}", u8::from(continuous)))
    }

    /// Get the acquisition time in seconds. Only available in real-time mode.
    pub fn get_acquisition_time(&mut self) -> Result<f64, InstrumentError> {
        to_float(&self.query(":ACQuisition:TIME?")?)
    }

    /// Set the acquisition time in seconds. Only available in real-time mode.
    pub fn set_acquisition_time(&mut self, time: f64) -> Result<(), InstrumentError> {
        self.write(&format!(":ACQuisition:TIME {time}"))
    }

    /// Get the number of sweep points.
    pub fn get_sweep_points(&mut self) -> Result<usize, InstrumentError> {
        sweep_points(&mut *self.interface.lock().expect("Mutex should not be poisoned"))
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
        to_bool(&self.query(":OUTPut:STATe?")?)
    }

    /// Switch the tracking generator output on or off.
    pub fn set_tg_output(&mut self, state: bool) -> Result<(), InstrumentError> {
        self.write(&format!(":OUTPut:STATe {}", u8::from(state)))
    }

    /// Get the output amplitude of the tracking generator in dBm.
    pub fn get_tg_output_amplitude(&mut self) -> Result<f64, InstrumentError> {
        to_float(&self.query(":SOURce:POWer:LEVel:IMMediate:AMPLitude?")?)
    }

    /// Set the output amplitude of the tracking generator in dBm.
    pub fn set_tg_output_amplitude(&mut self, amplitude: f64) -> Result<(), InstrumentError> {
        self.write(&format!(
            ":SOURce:POWer:LEVel:IMMediate:AMPLitude {amplitude}"
        ))
    }

    /// Get the format in which trace data is transferred.
    pub fn get_trace_data_format(&mut self) -> Result<TraceDataFormat, InstrumentError> {
        TraceDataFormat::from_cmd_str(&self.query(":FORMat:TRACe:DATA?")?)
    }

    /// Set the format in which trace data is transferred.
    ///
    /// [`Trace::data`] can only parse [`TraceDataFormat::Ascii`].
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

impl<T: InstrumentInterface> Clone for Ssa3000xPlus<T> {
    fn clone(&self) -> Self {
        Self {
            interface: self.interface.clone(),
            name: self.name.clone(),
        }
    }
}

impl<R: InstrumentInterface> Ssa3000xPlus<VisaInterface<R>> {
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
        let resp = query(&self.interface, &format!(":FREQuency:{param}?"))?;
        Ok(Frequency::from_hertz(to_float(&resp)?))
    }

    fn set(&mut self, param: &str, freq: Frequency) -> Result<(), InstrumentError> {
        write(
            &self.interface,
            &format!(":FREQuency:{param} {}", freq.as_hertz()),
        )
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
        let start = to_float(&intf.query(":FREQuency:STARt?")?)?;
        let stop = to_float(&intf.query(":FREQuency:STOP?")?)?;
        let num_points = sweep_points(&mut *intf)?;
        Ok(linspace(start, stop, num_points)
            .into_iter()
            .map(Frequency::from_hertz)
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
        let resp = query(&self.interface, &format!(":DETector:TRACe{}?", self.trace_id))?;
        Detector::from_cmd_str(&resp)
    }

    /// Set the detector type of the trace.
    pub fn set_detector(&mut self, detector: Detector) -> Result<(), InstrumentError> {
        write(
            &self.interface,
            &format!(":DETector:TRACe{} {detector}", self.trace_id),
        )
    }

    /// Read the y-axis data of the trace, in the unit the analyzer is set to.
    pub fn data(&mut self) -> Result<Vec<f64>, InstrumentError> {
        let resp = query(&self.interface, &format!(":TRAC:DATA? TRACE{}", self.trace_id))?;
        parse_float_list(&resp)
    }

    /// Write y-axis data to the trace, in the unit the analyzer is set to.
    pub fn set_data(&mut self, data: &[f64]) -> Result<(), InstrumentError> {
        let data_str = data
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",");
        write(
            &self.interface,
            &format!(":TRAC:DATA TRACE{}, {data_str}", self.trace_id),
        )
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

fn sweep_points<T: InstrumentInterface>(intf: &mut T) -> Result<usize, InstrumentError> {
    let resp = intf.query(":SWEEp:POINts?")?;
    usize::try_from(to_int(&resp)?).map_err(|_| InstrumentError::ResponseParseError(resp))
}

/// `num` evenly spaced values from `start` to `stop`, both included.
fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    match num {
        0 => vec![],
        1 => vec![start],
        _ => {
            let step = (stop - start) / (num - 1) as f64;
            (0..num).map(|i| start + step * i as f64).collect()
        }
    }
}
