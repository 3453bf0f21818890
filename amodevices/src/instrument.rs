//! Generic port wrapper and the error type shared by all drivers.
//!
//! [`Instrument`] turns any byte stream, e.g., a [`std::net::TcpStream`] or a boxed
//! [`serialport::SerialPort`], into an [`InstrumentInterface`].

use std::{io, time::Duration};

use thiserror::Error;

use crate::InstrumentInterface;

/// Line-oriented interface on top of any port that implements [`std::io::Read`] and
/// [`std::io::Write`].
///
/// # Example
///
/// ```no_run
/// use std::{net::TcpStream, time::Duration};
///
/// use amodevices::Instrument;
///
/// let my_interface = TcpStream::connect("192.168.10.1:5000").unwrap();
/// let inst_interface = Instrument::new(my_interface, Duration::from_secs(3));
/// ```
pub struct Instrument<P: io::Read + io::Write> {
    port: P,
    terminator: String,
    timeout: Duration,
}

impl<P: io::Read + io::Write> Instrument<P> {
    /// Create a new instance of [`Instrument`] with a given port and read timeout.
    ///
    /// The terminator is `"\n"` until it is changed with `set_terminator`.
    pub fn new(port: P, timeout: Duration) -> Self {
        Self {
            port,
            terminator: "\n".to_string(),
            timeout,
        }
    }
}

impl<P: io::Read + io::Write> InstrumentInterface for Instrument<P> {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), InstrumentError> {
        self.port.read_exact(buf).map_err(|err| match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
                InstrumentError::Timeout(self.timeout)
            }
            _ => InstrumentError::Io(err),
        })
    }

    fn get_terminator(&self) -> &str {
        self.terminator.as_str()
    }

    fn set_terminator(&mut self, terminator: &str) {
        self.terminator = terminator.to_string();
    }

    fn get_timeout(&self) -> Duration {
        self.timeout
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<(), InstrumentError> {
        let written = self.port.write(data)?;
        if written != data.len() {
            return Err(InstrumentError::WriteLengthMismatch {
                expected: data.len(),
                written,
            });
        }
        self.port.flush()?;
        Ok(())
    }
}

/// The error enum for all devices.
///
/// Every fallible operation of every driver returns this error, such that callers only have to
/// deal with one type. All variants carry a message that is intended to be shown to the user.
/// None of these errors are retried internally.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InstrumentError {
    /// A channel, trace, output or axis number outside of what the device has.
    #[error("Channel {idx} does not exist, the device has {nof_channels} channel(s)")]
    ChannelIndexOutOfRange {
        /// Requested channel number.
        idx: usize,
        /// Number of channels of the device.
        nof_channels: usize,
    },
    /// Error from the communication layer of an open VISA resource. Contains the device name,
    /// the resource address and the description of the underlying fault.
    #[error(
        "Error in VISA communication with device '{device}' (VISA resource name '{address}'): {description}"
    )]
    Communication {
        /// Name of the device.
        device: String,
        /// VISA resource name.
        address: String,
        /// Description of the underlying fault.
        description: String,
    },
    /// The connection to a device could not be opened.
    #[error("{device}: Connection couldn't be opened: {reason}")]
    ConnectionFailed {
        /// Name of the device.
        device: String,
        /// Why the connection failed.
        reason: String,
    },
    /// A response could not be decoded. Contains the (lossily decoded) raw response.
    #[error("Error in decoding response ('{0}') received")]
    Decode(String),
    /// The requested device could not be found when enumerating the available devices.
    #[error("{0}")]
    DeviceNotFound(String),
    /// The device did not send any response.
    #[error("No response received")]
    EmptyResponse,
    /// The device answered with an error response. Contains the raw response.
    #[error("Received an error response: '{0}'")]
    ErrorResponse(String),
    /// A set value outside of the range the device accepts.
    #[error("Value {value} outside of the allowed range [{min}, {max}]")]
    FloatValueOutOfRange {
        /// Rejected value.
        value: f64,
        /// Lower limit.
        min: f64,
        /// Upper limit.
        max: f64,
    },
    /// An integer setting outside of the range the device accepts.
    #[error("Value {value} outside of the allowed range [{min}, {max}]")]
    IntValueOutOfRange {
        /// Rejected value.
        value: i64,
        /// Lower limit.
        min: i64,
        /// Upper limit.
        max: i64,
    },
    /// An argument was rejected before anything was sent to the device, e.g., an unknown channel
    /// name or an invalid configuration.
    #[error("{0}")]
    InvalidArgument(String),
    /// I/O error of the underlying port.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// A measurement could not be completed, e.g., because the number of samples read does not
    /// match the number of samples requested.
    #[error("Measurement failed: {0}")]
    Measurement(String),
    /// The acknowledgement of the device did not match. Contains what was received instead.
    #[error("Device did not acknowledge the command sent, but responded with: '{0}'")]
    NotAcknowledged(String),
    /// An operation was attempted on a device whose connection is not open.
    #[error("{0}")]
    NotConnected(String),
    /// A response that does not have the expected format. Contains the response.
    #[error("Unexpected response from device: '{0}'")]
    ResponseParseError(String),
    #[cfg(feature = "serial")]
    /// Error of the serial port driver, e.g., when the port is opened.
    #[error(transparent)]
    Serialport(#[from] serialport::Error),
    /// No complete response arrived within the timeout of the interface.
    #[error("No response from device within {0:?}")]
    Timeout(Duration),
    /// No complete response to `query` arrived within `timeout`.
    #[error("No response to query '{query}' within {timeout:?}")]
    TimeoutQuery {
        /// Query that was sent.
        query: String,
        /// Timeout of the interface.
        timeout: Duration,
    },
    /// A value could not be converted to the expected type.
    #[error("Value '{value}' is not of expected type '{expected}'.")]
    TypeConversion {
        /// The value that could not be converted.
        value: String,
        /// Name of the expected type.
        expected: &'static str,
    },
    /// A vendor SDK reported an error code.
    #[error("Error {code}: {message}")]
    Vendor {
        /// The error code returned by the SDK.
        code: i64,
        /// The message that belongs to the error code.
        message: String,
    },
    /// The write did not transfer all bytes of the command.
    #[error("Write failed: {written} of {expected} bytes written")]
    WriteLengthMismatch {
        /// Number of bytes that should have been written.
        expected: usize,
        /// Number of bytes that were actually written.
        written: usize,
    },
}
