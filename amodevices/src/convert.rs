//! Coercion of device responses into typed values.
//!
//! All functions fail with [`InstrumentError::TypeConversion`] instead of falling back to a
//! default value.

use crate::InstrumentError;

/// Convert a response to a float.
pub fn to_float(value: &str) -> Result<f64, InstrumentError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| InstrumentError::TypeConversion {
            value: value.to_string(),
            expected: "float",
        })
}

/// Convert a response to an integer.
///
/// The response may be formatted as a float (e.g., `"4.000E+00"`) as long as its value is
/// integral.
pub fn to_int(value: &str) -> Result<i64, InstrumentError> {
    let err = || InstrumentError::TypeConversion {
        value: value.to_string(),
        expected: "int",
    };
    let trimmed = value.trim();
    if let Ok(val) = trimmed.parse::<i64>() {
        return Ok(val);
    }
    let val = trimmed.parse::<f64>().map_err(|_| err())?;
    if val.fract() != 0.0 || !val.is_finite() || val.abs() > i64::MAX as f64 {
        return Err(err());
    }
    Ok(val as i64)
}

/// Convert a response to a boolean.
///
/// Accepts integer states (`"0"`, `"1"`) as well as `"ON"` and `"OFF"`.
pub fn to_bool(value: &str) -> Result<bool, InstrumentError> {
    match value.trim().to_ascii_uppercase().as_str() {
        "ON" => Ok(true),
        "OFF" => Ok(false),
        other => match to_int(other) {
            Ok(0) => Ok(false),
            Ok(1) => Ok(true),
            _ => Err(InstrumentError::TypeConversion {
                value: value.to_string(),
                expected: "bool",
            }),
        },
    }
}

/// Convert a comma-separated response to a vector of floats.
pub fn parse_float_list(value: &str) -> Result<Vec<f64>, InstrumentError> {
    value
        .trim()
        .trim_end_matches(',')
        .split(',')
        .map(to_float)
        .collect()
}
