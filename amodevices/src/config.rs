//! Device configuration records.
//!
//! The keys follow the configuration files used in the lab, e.g.:
//!
//! ```json
//! {
//!     "Device": "SRS SIM922",
//!     "Address": "COM19",
//!     "Timeout": 1.0,
//!     "SerialConnectionParams": {"baudrate": 9600, "bytesize": 8, "stopbits": 1, "parity": "N"}
//! }
//! ```

use std::{collections::BTreeMap, time::Duration};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::InstrumentError;

/// Default timeout if none is configured.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Configuration of a single device.
///
/// Only `Device` is mandatory. Everything a specific driver needs beyond the common keys goes
/// into `DeviceSpecificParams` and is deserialized by the driver itself with
/// [`DeviceConfig::device_specific_params`].
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct DeviceConfig {
    /// Human-readable device name, used in all log and error messages.
    #[serde(rename = "Device")]
    pub device: String,
    /// Serial port name, VISA resource name, or host name.
    #[serde(rename = "Address", default)]
    pub address: String,
    /// Timeout in seconds.
    #[serde(rename = "Timeout", default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<f64>,
    /// Serial port framing.
    #[serde(
        rename = "SerialConnectionParams",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub serial: Option<SerialConnectionParams>,
    /// Expected answer of the device to `*IDN?`.
    #[serde(rename = "VISAIDN", default, skip_serializing_if = "Option::is_none")]
    pub visa_idn: Option<String>,
    /// Command that is sent once after a VISA connection was opened.
    #[serde(rename = "CmdOnInit", default, skip_serializing_if = "Option::is_none")]
    pub cmd_on_init: Option<String>,
    /// Driver specific parameters.
    #[serde(rename = "DeviceSpecificParams", default = "empty_object")]
    pub device_specific: Value,
    /// Logical channels of the device, by channel ID.
    #[serde(rename = "Channels", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub channels: BTreeMap<String, ChannelConfig>,
}

/// Configuration of a logical channel of a device.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ChannelConfig {
    /// Type of the channel, e.g., `"Pressure"` or `"Temperature"`.
    #[serde(rename = "Type")]
    pub channel_type: String,
    /// Any further parameters of the channel.
    #[serde(flatten)]
    pub params: BTreeMap<String, Value>,
}

impl ChannelConfig {
    /// Create a channel of the given type without further parameters.
    pub fn new(channel_type: &str) -> Self {
        Self {
            channel_type: channel_type.to_string(),
            params: BTreeMap::new(),
        }
    }
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

impl DeviceConfig {
    /// Create a new configuration with the given device name and address.
    pub fn new(device: &str, address: &str) -> Self {
        Self {
            device: device.to_string(),
            address: address.to_string(),
            timeout_secs: None,
            serial: None,
            visa_idn: None,
            cmd_on_init: None,
            device_specific: empty_object(),
            channels: BTreeMap::new(),
        }
    }

    /// Parse a configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, InstrumentError> {
        serde_json::from_str(json)
            .map_err(|err| InstrumentError::InvalidArgument(format!("Invalid configuration: {err}")))
    }

    /// Set the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = Some(timeout.as_secs_f64());
        self
    }

    /// Set the serial port framing.
    pub fn with_serial(mut self, params: SerialConnectionParams) -> Self {
        self.serial = Some(params);
        self
    }

    /// Set the expected identity string.
    pub fn with_visa_idn(mut self, idn: &str) -> Self {
        self.visa_idn = Some(idn.to_string());
        self
    }

    /// Set the command that is sent once after connecting.
    pub fn with_cmd_on_init(mut self, cmd: &str) -> Self {
        self.cmd_on_init = Some(cmd.to_string());
        self
    }

    /// Set the driver specific parameters.
    pub fn with_device_specific(mut self, params: Value) -> Self {
        self.device_specific = params;
        self
    }

    /// Add a logical channel.
    pub fn with_channel(mut self, id: &str, channel: ChannelConfig) -> Self {
        self.channels.insert(id.to_string(), channel);
        self
    }

    /// Get the configured timeout, or three seconds if none (or an invalid one) is configured.
    pub fn timeout(&self) -> Duration {
        self.timeout_secs
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .unwrap_or(DEFAULT_TIMEOUT)
    }

    /// Deserialize the driver specific parameters into the driver's own parameter type.
    pub fn device_specific_params<P: DeserializeOwned>(&self) -> Result<P, InstrumentError> {
        serde_json::from_value(self.device_specific.clone()).map_err(|err| {
            InstrumentError::InvalidArgument(format!(
                "{}: Invalid device specific parameters: {err}",
                self.device
            ))
        })
    }
}

/// Parity of a serial connection.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum Parity {
    /// No parity bit.
    #[default]
    #[serde(rename = "N")]
    None,
    /// Even parity.
    #[serde(rename = "E")]
    Even,
    /// Odd parity.
    #[serde(rename = "O")]
    Odd,
}

/// Framing of a serial connection.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct SerialConnectionParams {
    /// Baud rate.
    #[serde(default = "default_baudrate")]
    pub baudrate: u32,
    /// Number of data bits (5-8).
    #[serde(default = "default_bytesize")]
    pub bytesize: u8,
    /// Number of stop bits (1 or 2).
    #[serde(default = "default_stopbits")]
    pub stopbits: u8,
    /// Parity.
    #[serde(default)]
    pub parity: Parity,
}

fn default_baudrate() -> u32 {
    9600
}

fn default_bytesize() -> u8 {
    8
}

fn default_stopbits() -> u8 {
    1
}

impl Default for SerialConnectionParams {
    fn default() -> Self {
        Self {
            baudrate: default_baudrate(),
            bytesize: default_bytesize(),
            stopbits: default_stopbits(),
            parity: Parity::None,
        }
    }
}

#[cfg(feature = "serial")]
impl SerialConnectionParams {
    pub(crate) fn data_bits(&self) -> Result<serialport::DataBits, InstrumentError> {
        match self.bytesize {
            5 => Ok(serialport::DataBits::Five),
            6 => Ok(serialport::DataBits::Six),
            7 => Ok(serialport::DataBits::Seven),
            8 => Ok(serialport::DataBits::Eight),
            value => Err(InstrumentError::IntValueOutOfRange {
                value: value.into(),
                min: 5,
                max: 8,
            }),
        }
    }

    pub(crate) fn stop_bits(&self) -> Result<serialport::StopBits, InstrumentError> {
        match self.stopbits {
            1 => Ok(serialport::StopBits::One),
            2 => Ok(serialport::StopBits::Two),
            value => Err(InstrumentError::IntValueOutOfRange {
                value: value.into(),
                min: 1,
                max: 2,
            }),
        }
    }
}

#[cfg(feature = "serial")]
impl From<Parity> for serialport::Parity {
    fn from(value: Parity) -> Self {
        match value {
            Parity::None => serialport::Parity::None,
            Parity::Even => serialport::Parity::Even,
            Parity::Odd => serialport::Parity::Odd,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_full() {
        let cfg = DeviceConfig::from_json(
            r#"{
                "Device": "SRS SIM922",
                "Address": "COM19",
                "Timeout": 1.5,
                "SerialConnectionParams": {"baudrate": 9600, "bytesize": 8, "stopbits": 1, "parity": "O"},
                "VISAIDN": "ACME",
                "CmdOnInit": "*CLS",
                "DeviceSpecificParams": {"InternalAddress": 1},
                "Channels": {"P1": {"Type": "Pressure", "Unit": "Torr"}}
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.device, "SRS SIM922");
        assert_eq!(cfg.address, "COM19");
        assert_eq!(cfg.timeout(), Duration::from_millis(1500));
        let serial = cfg.serial.unwrap();
        assert_eq!(serial.parity, Parity::Odd);
        assert_eq!(serial.baudrate, 9600);
        assert_eq!(cfg.visa_idn.as_deref(), Some("ACME"));
        assert_eq!(cfg.cmd_on_init.as_deref(), Some("*CLS"));
        assert_eq!(cfg.device_specific["InternalAddress"], 1);
        let chan = &cfg.channels["P1"];
        assert_eq!(chan.channel_type, "Pressure");
        assert_eq!(chan.params["Unit"], "Torr");
    }

    #[test]
    fn test_from_json_defaults() {
        let cfg = DeviceConfig::from_json(r#"{"Device": "Gauge"}"#).unwrap();
        assert_eq!(cfg.address, "");
        assert_eq!(cfg.timeout(), DEFAULT_TIMEOUT);
        assert!(cfg.device_specific.as_object().unwrap().is_empty());
        assert!(cfg.channels.is_empty());
    }

    #[test]
    fn test_from_json_missing_device() {
        assert!(DeviceConfig::from_json(r#"{"Address": "COM1"}"#).is_err());
    }

    #[test]
    fn test_negative_timeout_falls_back_to_default() {
        let mut cfg = DeviceConfig::new("Gauge", "COM1");
        cfg.timeout_secs = Some(-1.0);
        assert_eq!(cfg.timeout(), DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_device_specific_params() {
        #[derive(Deserialize)]
        struct Params {
            #[serde(rename = "InternalAddress")]
            internal_address: u8,
        }

        let cfg = DeviceConfig::new("Gauge", "COM1")
            .with_device_specific(serde_json::json!({"InternalAddress": 3}));
        let params: Params = cfg.device_specific_params().unwrap();
        assert_eq!(params.internal_address, 3);

        let cfg = DeviceConfig::new("Gauge", "COM1");
        assert!(cfg.device_specific_params::<Params>().is_err());
    }
}
