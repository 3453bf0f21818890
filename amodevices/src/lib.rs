//! amodevices: Drivers for atomic, molecular, and optical physics laboratory devices
//!
//! This crate provides the shared layer that all `amodevices` drivers are built on: the
//! [`InstrumentInterface`] trait and its implementations for serial ports, TCP/IP sockets and
//! VISA resources, the uniform [`InstrumentError`] type, the [`DeviceConfig`] configuration
//! record, a time-to-live [`CachedReading`], numeric coercion helpers in [`convert`], and a
//! small [`daq`] abstraction for analog input/output tasks.
//!
//! The drivers themselves live in their own crates (one per device), grouped by vendor.
//!
//! # Currently implemented interfaces are:
//! - Serial (blocking) using the [`serialport`] crate, behind the `serial` feature.
//! - TCP/IP (blocking) using [`std::net::TcpStream`].
//! - VISA resources through the [`VisaResourceManager`] trait. A backend based on the
//!   `visa-rs` crate is available behind the `visa` feature.
//!
//! # Writing a driver
//!
//! A driver takes any interface that implements [`InstrumentInterface`], wraps it into an
//! `Arc<Mutex<T>>`, and holds the lock for every complete command/response transaction. This way,
//! the driver and any channel handles that it hands out can be shared between threads without
//! interleaving frames on the wire. Drivers are tested against the loopback interfaces in this
//! crate, e.g., [`LoopbackInterfaceString`], which script the exact traffic between host and
//! device.
//!
//! ```
//! use std::sync::{Arc, Mutex};
//!
//! use amodevices::{InstrumentError, InstrumentInterface, LoopbackInterfaceString};
//!
//! struct MyDevice<T: InstrumentInterface> {
//!     interface: Arc<Mutex<T>>,
//! }
//!
//! impl<T: InstrumentInterface> MyDevice<T> {
//!     fn get_name(&mut self) -> Result<String, InstrumentError> {
//!         let mut intf = self.interface.lock().expect("Mutex should not be poisoned");
//!         intf.query("*IDN?")
//!     }
//! }
//!
//! let loopback = LoopbackInterfaceString::new(
//!     vec!["*IDN?".to_string()],
//!     vec!["ACME,1,2,3".to_string()],
//!     "\n",
//! );
//! let mut dev = MyDevice { interface: Arc::new(Mutex::new(loopback)) };
//! assert_eq!(dev.get_name().unwrap(), "ACME,1,2,3");
//! ```
//!
//! # License
//!
//! Licensed under either of
//!
//! - Apache License, Version 2.0 ([LICENSE-APACHE](http://www.apache.org/licenses/LICENSE-2.0))
//! - MIT license ([LICENSE-MIT](http://opensource.org/licenses/MIT))
//!
//! at your option.

#![warn(missing_docs)]

mod cache;
mod config;
pub mod convert;
pub mod daq;
mod instrument;
mod loopback;
#[cfg(feature = "serial")]
mod serial;
mod tcp_ip;
mod visa;

use std::time::{Duration, Instant};

use tracing::debug;

pub use cache::CachedReading;
pub use config::{ChannelConfig, DeviceConfig, Parity, SerialConnectionParams};
pub use instrument::{Instrument, InstrumentError};
pub use loopback::*;
#[cfg(feature = "serial")]
pub use serial::{SerialInstrument, SerialInterface};
pub use tcp_ip::TcpIpInterface;
#[cfg(feature = "visa")]
pub use visa::VisaRsResourceManager;
pub use visa::{VisaInterface, VisaResourceManager};

/// The `InstrumentInterface` trait defines how drivers talk to their devices.
///
/// Only [`InstrumentInterface::read_exact`] and [`InstrumentInterface::write_raw`] must be
/// provided by an implementation. All other methods have default implementations that build
/// the line-based command/response protocol on top of these two.
pub trait InstrumentInterface {
    /// Read exactly `buf.len()` bytes from the interface.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), InstrumentError>;

    /// Write the given bytes to the interface without appending anything.
    ///
    /// Implementations must fail with [`InstrumentError::WriteLengthMismatch`] if not all bytes
    /// could be written.
    fn write_raw(&mut self, data: &[u8]) -> Result<(), InstrumentError>;

    /// Get the terminator of the interface. Defaults to `"\n"`.
    fn get_terminator(&self) -> &str {
        "\n"
    }

    /// Set the terminator of an interface from a `&str`.
    ///
    /// The default implementation ignores the new terminator.
    fn set_terminator(&mut self, _terminator: &str) {}

    /// Get the timeout that bounds a single line read. Defaults to three seconds.
    fn get_timeout(&self) -> Duration {
        Duration::from_secs(3)
    }

    /// Write a string to the interface as is, i.e., without appending the terminator.
    fn write(&mut self, data: &str) -> Result<(), InstrumentError> {
        debug!(tx = %data.escape_debug(), "write");
        self.write_raw(data.as_bytes())
    }

    /// Send a command to the instrument.
    ///
    /// This appends the terminator to the command and writes it to the interface.
    fn sendcmd(&mut self, cmd: &str) -> Result<(), InstrumentError> {
        let data = format!("{cmd}{}", self.get_terminator());
        self.write(&data)
    }

    /// Read a single byte from the interface.
    fn read_byte(&mut self) -> Result<u8, InstrumentError> {
        let mut buf = [0u8];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    /// Read from the interface until the terminator is found.
    ///
    /// The terminator is stripped and surrounding whitespace is trimmed from the returned
    /// response. If the terminator is not seen within [`InstrumentInterface::get_timeout`], an
    /// [`InstrumentError::Timeout`] is returned. A response that is not valid UTF-8 fails with
    /// [`InstrumentError::Decode`].
    fn read_until_terminator(&mut self) -> Result<String, InstrumentError> {
        let terminator = self.get_terminator().as_bytes().to_vec();
        let timeout = self.get_timeout();
        let tic = Instant::now();
        let mut response: Vec<u8> = Vec::new();

        while tic.elapsed() < timeout {
            response.push(self.read_byte()?);
            if response.ends_with(&terminator) {
                response.truncate(response.len() - terminator.len());
                let resp = String::from_utf8(response).map_err(|err| {
                    InstrumentError::Decode(String::from_utf8_lossy(err.as_bytes()).into_owned())
                })?;
                debug!(rx = %resp.escape_debug(), "read");
                return Ok(resp.trim().to_string());
            }
        }
        Err(InstrumentError::Timeout(timeout))
    }

    /// Query the instrument with a command and return the response as a String.
    ///
    /// A timeout while waiting for the response is reported as
    /// [`InstrumentError::TimeoutQuery`], which contains the query that was sent.
    fn query(&mut self, cmd: &str) -> Result<String, InstrumentError> {
        self.sendcmd(cmd)?;
        self.read_until_terminator().map_err(|err| match err {
            InstrumentError::Timeout(timeout) => InstrumentError::TimeoutQuery {
                query: cmd.to_string(),
                timeout,
            },
            err => err,
        })
    }

    /// Read one line and check that it equals the expected acknowledgment.
    ///
    /// Fails with [`InstrumentError::NotAcknowledged`] containing the line that was received
    /// otherwise.
    fn check_acknowledgment(&mut self, ack: &str) -> Result<(), InstrumentError> {
        let resp = self.read_until_terminator()?;
        if resp == ack {
            Ok(())
        } else {
            Err(InstrumentError::NotAcknowledged(resp))
        }
    }
}
