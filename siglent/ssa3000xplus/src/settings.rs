//! Enumerated settings of the spectrum analyzer.

use std::fmt::Display;

use amodevices::InstrumentError;

/// Unit of the y-axis, i.e., of the trace data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum YUnit {
    /// dBm
    Dbm,
    /// dBmV
    Dbmv,
    /// dBµV
    Dbuv,
    /// dBµA
    Dbua,
    /// Volt
    Volt,
    /// Watt
    Watt,
}

impl YUnit {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            YUnit::Dbm => "DBM",
            YUnit::Dbmv => "DBMV",
            YUnit::Dbuv => "DBUV",
            YUnit::Dbua => "DBUA",
            YUnit::Volt => "V",
            YUnit::Watt => "W",
        }
    }

    pub(crate) fn from_cmd_str(resp: &str) -> Result<Self, InstrumentError> {
        match resp.to_uppercase().as_str() {
            "DBM" => Ok(YUnit::Dbm),
            "DBMV" => Ok(YUnit::Dbmv),
            "DBUV" => Ok(YUnit::Dbuv),
            "DBUA" => Ok(YUnit::Dbua),
            "V" => Ok(YUnit::Volt),
            "W" => Ok(YUnit::Watt),
            _ => Err(InstrumentError::ResponseParseError(resp.to_string())),
        }
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
    /// Normal (rosenfell) detector.
    Normal,
    /// Positive peak.
    Positive,
    /// Negative peak.
    Negative,
    /// Sample.
    Sample,
    /// Average.
    Average,
    /// Quasi peak.
    Quasi,
}

impl Detector {
    const ALL: [Detector; 6] = [
        Detector::Normal,
        Detector::Positive,
        Detector::Negative,
        Detector::Sample,
        Detector::Average,
        Detector::Quasi,
    ];

    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Detector::Normal => "NORM",
            Detector::Positive => "POS",
            Detector::Negative => "NEG",
            Detector::Sample => "SAMP",
            Detector::Average => "AVER",
            Detector::Quasi => "QUAS",
        }
    }

    /// The analyzer answers with either the short or the long SCPI form, e.g., `POS` or
    /// `POSitive`.
    pub(crate) fn from_cmd_str(resp: &str) -> Result<Self, InstrumentError> {
        let resp_upper = resp.to_uppercase();
        Self::ALL
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
    /// Comma-separated ASCII values. The driver can only parse this format.
    Ascii,
    /// 32 bit binary floats.
    Real32,
    /// 64 bit binary floats.
    Real64,
}

impl TraceDataFormat {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            TraceDataFormat::Ascii => "ASCii",
            TraceDataFormat::Real32 => "REAL,32",
            TraceDataFormat::Real64 => "REAL,64",
        }
    }

    pub(crate) fn from_cmd_str(resp: &str) -> Result<Self, InstrumentError> {
        let resp_upper = resp.to_uppercase().replace(' ', "");
        if resp_upper.starts_with("ASC") {
            Ok(TraceDataFormat::Ascii)
        } else if resp_upper == "REAL,32" {
            Ok(TraceDataFormat::Real32)
        } else if resp_upper == "REAL,64" {
            Ok(TraceDataFormat::Real64)
        } else {
            Err(InstrumentError::ResponseParseError(resp.to_string()))
        }
    }
}

impl Display for TraceDataFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detector_long_and_short_form() {
        assert_eq!(Detector::from_cmd_str("POSitive").unwrap(), Detector::Positive);
        assert_eq!(Detector::from_cmd_str("NORM").unwrap(), Detector::Normal);
        assert_eq!(Detector::from_cmd_str("quasi").unwrap(), Detector::Quasi);
        assert!(Detector::from_cmd_str("RMS").is_err());
    }

    #[test]
    fn trace_data_format() {
        assert_eq!(
            TraceDataFormat::from_cmd_str("ASCii").unwrap(),
            TraceDataFormat::Ascii
        );
        assert_eq!(
            TraceDataFormat::from_cmd_str("REAL, 32").unwrap(),
            TraceDataFormat::Real32
        );
        assert!(TraceDataFormat::from_cmd_str("INT,32").is_err());
    }

    #[test]
    fn y_unit() {
        assert_eq!(YUnit::from_cmd_str("dBuA").unwrap(), YUnit::Dbua);
        assert_eq!(YUnit::Volt.to_string(), "V");
        assert!(YUnit::from_cmd_str("A").is_err());
    }
}
