//! A Rust driver for the Thorlabs K10CR1 motorized rotation mount.
//!
//! The K10CR1 is controlled through the Thorlabs Kinesis SDK. The SDK itself is hidden behind
//! the [`KinesisBackend`] trait, such that the driver logic (device enumeration, unit
//! conversion, status decoding, and the wait loops) does not depend on the vendor library.
//!
//! All positions are handled as [`Angle`]s from the `measurements` crate or, where the name of
//! the function says so, in device units (steps).
//!
//! # Example
//!
//! ```no_run
//! use measurements::Angle;
//! use thorlabs_k10cr1::{K10cr1, KinesisBackend};
//!
//! fn run<B: KinesisBackend>(backend: B) -> Result<(), amodevices::InstrumentError> {
//!     let mount = K10cr1::new(backend, 55193694)?;
//!     mount.connect()?;
//!     mount.move_to(Angle::from_degrees(45.0))?;
//!     let pos = mount.wait_until_position_reached(Angle::from_degrees(45.0))?;
//!     println!("Position: {:.3} deg", pos.as_degrees());
//!     mount.close()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

mod backend;
mod status;
pub mod units;

use std::{
    sync::{Arc, Mutex},
    thread,
    time::{Duration, Instant},
};

use measurements::Angle;
use serde::Deserialize;
use tracing::{debug, error, info};

use amodevices::{DeviceConfig, InstrumentError};

pub use backend::KinesisBackend;
pub use status::{Status, StatusFlag};

/// Kinesis device type ID of cage rotators, including the K10CR1.
pub const DEVICE_TYPE_ID: u32 = 55;

/// Polling interval of the Kinesis library for position and status, in ms.
const POLLING_INTERVAL_MS: u32 = 200;

/// Device specific configuration parameters of the K10CR1.
#[derive(Clone, Debug, Deserialize)]
pub struct K10cr1Params {
    /// Serial number of the rotation mount.
    #[serde(rename = "SerialNumber")]
    pub serial_number: u32,
}

/// Timing of the wait loops.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WaitSettings {
    /// Timeout for moves to a position.
    pub timeout: Duration,
    /// Timeout for homing.
    pub timeout_homing: Duration,
    /// Time between position checks while moving.
    pub loop_sleep: Duration,
    /// Time that the position must stay within the tolerance before a move counts as done.
    pub final_wait: Duration,
    /// Time between status checks while homing.
    pub loop_sleep_home: Duration,
    /// Delay before the first status check after homing was started.
    pub home_initial_delay: Duration,
    /// Tolerance, in steps, within which the target position counts as reached.
    pub step_tolerance: u32,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            timeout_homing: Duration::from_secs(30),
            loop_sleep: Duration::from_millis(10),
            final_wait: Duration::from_millis(500),
            loop_sleep_home: Duration::from_millis(100),
            home_initial_delay: Duration::from_secs(1),
            step_tolerance: 0,
        }
    }
}

struct Inner<B: KinesisBackend> {
    backend: B,
    open: bool,
}

/// Driver for the Thorlabs K10CR1 rotation mount.
///
/// The driver can be cloned and shared between threads. Every call into the backend holds the
/// lock only for the backend calls it needs, such that, e.g., [`K10cr1::stop`] can be called
/// from another thread while a wait loop is running.
pub struct K10cr1<B: KinesisBackend> {
    inner: Arc<Mutex<Inner<B>>>,
    serial_number: u32,
    serial_str: String,
    name: String,
    wait: WaitSettings,
}

impl<B: KinesisBackend> K10cr1<B> {
    /// Create a new driver for the rotation mount with the given serial number.
    ///
    /// The device list of the Kinesis library is built and the serial number must be among the
    /// devices of type [`DEVICE_TYPE_ID`]. Otherwise, an [`InstrumentError::DeviceNotFound`]
    /// error is returned. The connection is not opened, see [`K10cr1::connect`].
    pub fn new(mut backend: B, serial_number: u32) -> Result<Self, InstrumentError> {
        let status = backend.build_device_list();
        if status != 0 {
            return Err(vendor_error(
                status,
                "Thorlabs Kinesis: Could not build device list",
            ));
        }
        let device_list = backend.device_list_by_type(DEVICE_TYPE_ID);
        debug!(device_list = %device_list, "Kinesis devices of type {DEVICE_TYPE_ID}");
        let serial_numbers = parse_device_list(&device_list)?;

        if !serial_numbers.contains(&serial_number) {
            let msg = format!(
                "Thorlabs Kinesis: Cannot find device with serial number {serial_number} and device type ID {DEVICE_TYPE_ID} in system"
            );
            error!("{msg}");
            return Err(InstrumentError::DeviceNotFound(msg));
        }

        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                backend,
                open: false,
            })),
            serial_number,
            serial_str: serial_number.to_string(),
            name: format!("Thorlabs K10CR1 {serial_number}"),
            wait: WaitSettings::default(),
        })
    }

    /// Create a new driver from a device configuration.
    ///
    /// The serial number is read from `DeviceSpecificParams.SerialNumber` and the device name
    /// is used in all log messages.
    pub fn from_config(backend: B, config: &DeviceConfig) -> Result<Self, InstrumentError> {
        let params: K10cr1Params = config.device_specific_params()?;
        Ok(Self::new(backend, params.serial_number)?.with_name(&config.device))
    }

    /// Set the name of the device, which is used in log messages.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Replace the timing of the wait loops.
    pub fn with_wait_settings(mut self, wait: WaitSettings) -> Self {
        self.wait = wait;
        self
    }

    /// Serial number of the rotation mount.
    pub fn serial_number(&self) -> u32 {
        self.serial_number
    }

    /// Is the connection to the device open?
    pub fn is_open(&self) -> bool {
        self.inner.lock().expect("Mutex should not be poisoned").open
    }

    /// Open the connection to the device.
    ///
    /// After opening, the message queue is cleared and the Kinesis library starts polling the
    /// device every 200 ms.
    pub fn connect(&self) -> Result<(), InstrumentError> {
        let mut inner = self.inner.lock().expect("Mutex should not be poisoned");
        let status = inner.backend.open(&self.serial_str);
        if status != 0 {
            let reason = format!(
                "Thorlabs Kinesis: Could not connect to device with serial number {} (is it open in another instance?)",
                self.serial_number
            );
            error!("{reason}");
            return Err(InstrumentError::ConnectionFailed {
                device: self.name.clone(),
                reason,
            });
        }
        inner.open = true;
        inner.backend.clear_message_queue(&self.serial_str);
        inner
            .backend
            .start_polling(&self.serial_str, POLLING_INTERVAL_MS);
        info!("{}: Connection opened", self.name);
        Ok(())
    }

    /// Close the connection to the device. Closing a connection that is not open does nothing.
    ///
    /// The connection counts as closed afterwards, even if the library reports an error.
    pub fn close(&self) -> Result<(), InstrumentError> {
        let mut inner = self.inner.lock().expect("Mutex should not be poisoned");
        if !inner.open {
            return Ok(());
        }
        inner.backend.stop_polling(&self.serial_str);
        let status = inner.backend.close(&self.serial_str);
        inner.open = false;
        info!("{}: Connection closed", self.name);
        check_status(status, &self.name, "Closing connection")
    }

    /// Check that the connection to the device is open.
    pub fn check_connection(&self) -> Result<(), InstrumentError> {
        let inner = self.inner.lock().expect("Mutex should not be poisoned");
        self.check_open(&inner)
    }

    fn check_open(&self, inner: &Inner<B>) -> Result<(), InstrumentError> {
        if inner.open {
            Ok(())
        } else {
            let msg = format!(
                "Thorlabs Kinesis: Connection to device with serial number {} not open",
                self.serial_number
            );
            error!("{msg}");
            Err(InstrumentError::NotConnected(msg))
        }
    }

    /// Get the current position in device units.
    pub fn get_position_device_units(&self) -> Result<i32, InstrumentError> {
        let mut inner = self.inner.lock().expect("Mutex should not be poisoned");
        self.check_open(&inner)?;
        let status = inner.backend.request_position(&self.serial_str);
        check_status(status, &self.name, "Requesting position")?;
        Ok(inner.backend.get_position(&self.serial_str))
    }

    /// Get the current position.
    pub fn get_position(&self) -> Result<Angle, InstrumentError> {
        let steps = self.get_position_device_units()?;
        Ok(Angle::from_degrees(units::steps_to_degrees(steps)))
    }

    /// Get the current status of the device.
    pub fn get_status(&self) -> Result<Status, InstrumentError> {
        let mut inner = self.inner.lock().expect("Mutex should not be poisoned");
        self.check_open(&inner)?;
        let status = inner.backend.request_status_bits(&self.serial_str);
        check_status(status, &self.name, "Requesting status bits")?;
        Ok(Status::from_bits(
            inner.backend.get_status_bits(&self.serial_str),
        ))
    }

    /// Start a move to the given position in device units.
    ///
    /// This returns as soon as the move was started, see
    /// [`K10cr1::wait_until_position_reached_device_units`].
    pub fn move_to_device_units(&self, position: i32) -> Result<(), InstrumentError> {
        let mut inner = self.inner.lock().expect("Mutex should not be poisoned");
        self.check_open(&inner)?;
        debug!("{}: Moving to {position} steps", self.name);
        let status = inner.backend.move_to_position(&self.serial_str, position);
        check_status(status, &self.name, "Moving to position")
    }

    /// Start a move to the given position.
    ///
    /// The position is rounded to the nearest step.
    pub fn move_to(&self, position: Angle) -> Result<(), InstrumentError> {
        self.move_to_device_units(units::degrees_to_steps(position.as_degrees()))
    }

    /// Wait until the device has reached the given position in device units.
    ///
    /// The position must be within the step tolerance for the final wait time. If this does
    /// not happen within the timeout, the motor is stopped and an [`InstrumentError::Timeout`]
    /// is returned. Returns the position that was reached.
    pub fn wait_until_position_reached_device_units(
        &self,
        position: i32,
    ) -> Result<i32, InstrumentError> {
        let tolerance = i64::from(self.wait.step_tolerance);
        let settle_loops = self.wait.final_wait.as_secs_f64() / self.wait.loop_sleep.as_secs_f64();
        let tic = Instant::now();
        let mut n_loops: u64 = 0;
        let mut reached_at: Option<u64> = None;

        loop {
            let current = self.get_position_device_units()?;
            if (i64::from(current) - i64::from(position)).abs() <= tolerance {
                let reached = *reached_at.get_or_insert(n_loops);
                if (n_loops - reached) as f64 > settle_loops {
                    info!(
                        "{}: Reached position {current} steps ({:.5} deg) after {:.2} s",
                        self.name,
                        units::steps_to_degrees(current),
                        tic.elapsed().as_secs_f64()
                    );
                    return Ok(current);
                }
            } else {
                reached_at = None;
            }

            thread::sleep(self.wait.loop_sleep);
            if tic.elapsed() > self.wait.timeout {
                self.stop()?;
                error!(
                    "{}: Timeout while waiting to reach position {position} steps ({:.5} deg), motor stopped",
                    self.name,
                    units::steps_to_degrees(position)
                );
                return Err(InstrumentError::Timeout(self.wait.timeout));
            }
            n_loops += 1;
        }
    }

    /// Wait until the device has reached the given position.
    ///
    /// See [`K10cr1::wait_until_position_reached_device_units`].
    pub fn wait_until_position_reached(&self, position: Angle) -> Result<Angle, InstrumentError> {
        let steps = units::degrees_to_steps(position.as_degrees());
        let reached = self.wait_until_position_reached_device_units(steps)?;
        Ok(Angle::from_degrees(units::steps_to_degrees(reached)))
    }

    /// Start homing the device.
    pub fn home(&self) -> Result<(), InstrumentError> {
        let mut inner = self.inner.lock().expect("Mutex should not be poisoned");
        self.check_open(&inner)?;
        info!("{}: Homing", self.name);
        let status = inner.backend.home(&self.serial_str);
        check_status(status, &self.name, "Homing")
    }

    /// Wait until the device reports that it is homed.
    ///
    /// Returns an [`InstrumentError::Timeout`] if the device is not homed within the homing
    /// timeout.
    pub fn wait_until_homed(&self) -> Result<(), InstrumentError> {
        let tic = Instant::now();
        thread::sleep(self.wait.home_initial_delay);
        loop {
            if self.get_status()?.is_homed() {
                info!(
                    "{}: Homed after {:.2} s",
                    self.name,
                    tic.elapsed().as_secs_f64()
                );
                return Ok(());
            }
            thread::sleep(self.wait.loop_sleep_home);
            if tic.elapsed() > self.wait.timeout_homing {
                error!("{}: Timeout while waiting for homing", self.name);
                return Err(InstrumentError::Timeout(self.wait.timeout_homing));
            }
        }
    }

    /// Stop the current move, using the velocity profile of the device.
    pub fn stop(&self) -> Result<(), InstrumentError> {
        let mut inner = self.inner.lock().expect("Mutex should not be poisoned");
        self.check_open(&inner)?;
        let status = inner.backend.stop_profiled(&self.serial_str);
        check_status(status, &self.name, "Stopping")
    }
}

impl<B: KinesisBackend> Clone for K10cr1<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            serial_number: self.serial_number,
            serial_str: self.serial_str.clone(),
            name: self.name.clone(),
            wait: self.wait,
        }
    }
}

fn parse_device_list(device_list: &str) -> Result<Vec<u32>, InstrumentError> {
    device_list
        .split(',')
        .map(str::trim)
        .filter(|sn| !sn.is_empty())
        .map(|sn| {
            sn.parse::<u32>()
                .map_err(|_| InstrumentError::ResponseParseError(device_list.to_string()))
        })
        .collect()
}

fn check_status(status: i16, name: &str, action: &str) -> Result<(), InstrumentError> {
    if status == 0 {
        Ok(())
    } else {
        Err(vendor_error(status, &format!("{name}: {action} failed")))
    }
}

fn vendor_error(status: i16, msg: &str) -> InstrumentError {
    error!("{msg} (error code {status})");
    InstrumentError::Vendor {
        code: i64::from(status),
        message: msg.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_list_parsing() {
        assert_eq!(
            parse_device_list("55193694,55000001,").unwrap(),
            vec![55193694, 55000001]
        );
        assert!(parse_device_list("").unwrap().is_empty());
        assert!(matches!(
            parse_device_list("55193694,abc"),
            Err(InstrumentError::ResponseParseError(_))
        ));
    }
}
