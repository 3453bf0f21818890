//! A Rust driver for Thorlabs BC207 and BC210 beam profiler cameras.
//!
//! The cameras are controlled through the Thorlabs TLBC2 library, which is hidden behind the
//! [`BeamCameraBackend`] trait. Every error code returned by the library is turned into an
//! [`InstrumentError::Vendor`] error, after fetching the message that belongs to the code and
//! closing the session.
//!
//! # Example
//!
//! ```no_run
//! use thorlabs_bc::{BeamCameraBackend, BeamProfiler};
//!
//! fn run<B: BeamCameraBackend>(backend: B) -> Result<(), amodevices::InstrumentError> {
//!     let camera = BeamProfiler::new(backend, 12345);
//!     camera.connect()?;
//!     camera.set_exposure_time(0.5)?;
//!     let frame = camera.read_frame()?;
//!     if frame.image.is_some() {
//!         let profile = camera.convert_scan_data(&frame.scan_data)?;
//!         println!("Centroid: ({:.1}, {:.1}) µm", profile.centroid_x, profile.centroid_y);
//!     }
//!     camera.close();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

mod backend;
mod profile;

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use amodevices::{DeviceConfig, InstrumentError};

pub use backend::{
    BeamCameraBackend, DeviceListEntry, Roi, ScanData, SdkResult, SensorInformation,
    UserCalculationArea,
};
pub use profile::{
    Axis, BeamProfile, CalculationAreaMode, CalculationAreaShape, CameraSettings, px_to_um,
};

/// Clip level that is set when the session is opened, approximately 1/e^2.
pub const DEFAULT_CLIP_LEVEL: f64 = 0.135;

/// Pixel binnings supported by the cameras.
pub const BINNINGS: [u8; 5] = [1, 2, 4, 8, 16];

/// Device specific configuration parameters of the beam profiler.
#[derive(Clone, Debug, Deserialize)]
pub struct BcParams {
    /// Serial number of the camera.
    #[serde(rename = "SerialNumber")]
    pub serial_number: u32,
}

/// Information about an opened camera.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DeviceInfo {
    /// Index of the camera in the device list.
    pub index: u32,
    /// Entry of the device list.
    pub entry: DeviceListEntry,
    /// Revision of the library.
    pub driver_revision: String,
    /// Revision of the camera firmware.
    pub firmware_revision: String,
    /// Sensor dimensions.
    pub sensor: SensorInformation,
}

/// A frame read from the camera.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    /// Analysis results of the frame.
    pub scan_data: ScanData,
    /// The image, if the analysis results are valid.
    pub image: Option<Image>,
}

/// A 16 bit image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Image {
    /// Width in pixels.
    pub width: u16,
    /// Height in pixels.
    pub height: u16,
    /// Intensity counts, row by row.
    pub data: Vec<u16>,
}

impl Image {
    /// Intensity counts of the pixel in the given row and column.
    pub fn pixel(&self, row: u16, col: u16) -> Option<u16> {
        if row >= self.height || col >= self.width {
            return None;
        }
        self.data
            .get(usize::from(row) * usize::from(self.width) + usize::from(col))
            .copied()
    }
}

struct Inner<B: BeamCameraBackend> {
    backend: B,
    info: Option<DeviceInfo>,
}

/// Driver for a Thorlabs BC207 or BC210 beam profiler.
pub struct BeamProfiler<B: BeamCameraBackend> {
    inner: Arc<Mutex<Inner<B>>>,
    serial_number: u32,
    name: String,
}

impl<B: BeamCameraBackend> BeamProfiler<B> {
    /// Create a new driver for the camera with the given serial number.
    ///
    /// The session is not opened, see [`BeamProfiler::connect`].
    pub fn new(backend: B, serial_number: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                backend,
                info: None,
            })),
            serial_number,
            name: format!("Thorlabs BC {serial_number}"),
        }
    }

    /// Create a new driver from a device configuration with the serial number in
    /// `DeviceSpecificParams.SerialNumber`.
    pub fn from_config(backend: B, config: &DeviceConfig) -> Result<Self, InstrumentError> {
        let params: BcParams = config.device_specific_params()?;
        Ok(Self::new(backend, params.serial_number).with_name(&config.device))
    }

    /// Set the name of the device, which is used in log messages.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Is a session to the camera open?
    pub fn is_connected(&self) -> bool {
        self.lock().info.is_some()
    }

    /// Find the camera in the device list and open a session to it.
    ///
    /// The driver and firmware revisions and the sensor information are read, and the clip
    /// level is set to [`DEFAULT_CLIP_LEVEL`].
    pub fn connect(&self) -> Result<(), InstrumentError> {
        let mut inner = self.lock();
        let nof_devices = self.sdk(&mut inner, |b| b.device_count())?;

        let mut found = None;
        for index in 0..nof_devices {
            let entry = self.sdk(&mut inner, |b| b.device_information(index))?;
            match entry.serial_number.trim().parse::<u32>() {
                Ok(sn) if sn == self.serial_number => {
                    found = Some((index, entry));
                    break;
                }
                Ok(_) => {}
                Err(_) => warn!(
                    "{}: Ignoring device with serial number '{}'",
                    self.name, entry.serial_number
                ),
            }
        }
        let Some((index, entry)) = found else {
            let msg = format!(
                "Cannot find device with serial number {} in system",
                self.serial_number
            );
            error!("{msg}");
            return Err(InstrumentError::DeviceNotFound(msg));
        };

        let description = format!(
            "{} from {} with serial number {}",
            entry.model, entry.manufacturer, self.serial_number
        );
        if !entry.available {
            let reason = format!(
                "Found requested device ({description}) in system, but it is not available; make sure it's not open elsewhere"
            );
            error!("{reason}");
            return Err(InstrumentError::ConnectionFailed {
                device: self.name.clone(),
                reason,
            });
        }
        info!("{}: Found requested device ({description}) in system", self.name);

        let resource_name = entry.resource_name.clone();
        self.sdk(&mut inner, |b| b.open(&resource_name))?;
        let (driver_revision, firmware_revision) = self.sdk(&mut inner, |b| b.revision_query())?;
        let sensor = self.sdk(&mut inner, |b| b.sensor_information())?;
        self.sdk(&mut inner, |b| b.set_clip_level(DEFAULT_CLIP_LEVEL))?;

        debug!(
            "{}: Driver revision {driver_revision}, firmware revision {firmware_revision}, sensor {sensor:?}",
            self.name
        );
        inner.info = Some(DeviceInfo {
            index,
            entry,
            driver_revision,
            firmware_revision,
            sensor,
        });
        info!("{}: Connection opened", self.name);
        Ok(())
    }

    /// Close the session. Closing a session that is not open does nothing.
    pub fn close(&self) {
        let mut inner = self.lock();
        if inner.info.take().is_some() {
            if let Err(code) = inner.backend.close() {
                warn!("{}: Closing session returned error code {code}", self.name);
            }
            info!("{}: Connection closed", self.name);
        }
    }

    /// Information about the opened camera.
    pub fn device_info(&self) -> Result<DeviceInfo, InstrumentError> {
        self.lock()
            .info
            .clone()
            .ok_or_else(|| self.not_connected())
    }

    /// Convert a value in pixels to µm along the given sensor axis.
    pub fn convert_px_to_um(&self, value: f64, axis: Axis) -> Result<f64, InstrumentError> {
        Ok(px_to_um(&self.device_info()?.sensor, value, axis))
    }

    /// Get the exposure time in ms.
    pub fn get_exposure_time(&self) -> Result<f64, InstrumentError> {
        self.call(|b| b.get_exposure_time())
    }

    /// Set the exposure time in ms.
    pub fn set_exposure_time(&self, exposure_time_ms: f64) -> Result<(), InstrumentError> {
        self.call(|b| b.set_exposure_time(exposure_time_ms))
    }

    /// Get the auto exposure state.
    pub fn get_auto_exposure(&self) -> Result<bool, InstrumentError> {
        self.call(|b| b.get_auto_exposure())
    }

    /// Set the auto exposure state.
    pub fn set_auto_exposure(&self, on: bool) -> Result<(), InstrumentError> {
        self.call(|b| b.set_auto_exposure(on))
    }

    /// Get the gain in dB.
    pub fn get_gain(&self) -> Result<f64, InstrumentError> {
        self.call(|b| b.get_gain())
    }

    /// Set the gain in dB.
    pub fn set_gain(&self, gain_db: f64) -> Result<(), InstrumentError> {
        self.call(|b| b.set_gain(gain_db))
    }

    /// Get the pixel binning, i.e., N for binning of N x N pixels.
    pub fn get_binning(&self) -> Result<u8, InstrumentError> {
        self.call(|b| b.get_binning())
    }

    /// Set the pixel binning. Must be one of [`BINNINGS`].
    pub fn set_binning(&self, binning: u8) -> Result<(), InstrumentError> {
        if !BINNINGS.contains(&binning) {
            return Err(InstrumentError::InvalidArgument(format!(
                "Invalid pixel binning of {binning} requested (must be 1, 2, 4, 8, or 16)"
            )));
        }
        self.call(|b| b.set_binning(binning))
    }

    /// Get the region of interest.
    pub fn get_roi(&self) -> Result<Roi, InstrumentError> {
        self.call(|b| b.get_roi())
    }

    /// Set the region of interest.
    pub fn set_roi(&self, roi: Roi) -> Result<(), InstrumentError> {
        self.call(|b| b.set_roi(roi))
    }

    /// Get how the calculation area is determined.
    pub fn get_calculation_area_mode(&self) -> Result<CalculationAreaMode, InstrumentError> {
        let (automatic, form) = self.call(|b| b.get_calculation_area_mode())?;
        Ok(CalculationAreaMode {
            automatic,
            shape: CalculationAreaShape::from_form(form)?,
        })
    }

    /// Set how the calculation area is determined.
    pub fn set_calculation_area_mode(
        &self,
        mode: CalculationAreaMode,
    ) -> Result<(), InstrumentError> {
        self.call(|b| b.set_calculation_area_mode(mode.automatic, mode.shape.form()))
    }

    /// Get the user calculation area, in pixels.
    pub fn get_user_calculation_area(&self) -> Result<UserCalculationArea, InstrumentError> {
        self.call(|b| b.get_user_calculation_area())
    }

    /// Set the user calculation area, in pixels.
    pub fn set_user_calculation_area(
        &self,
        area: UserCalculationArea,
    ) -> Result<(), InstrumentError> {
        self.call(|b| b.set_user_calculation_area(area))
    }

    /// Get the clip level.
    pub fn get_clip_level(&self) -> Result<f64, InstrumentError> {
        self.call(|b| b.get_clip_level())
    }

    /// Set the clip level.
    pub fn set_clip_level(&self, clip_level: f64) -> Result<(), InstrumentError> {
        self.call(|b| b.set_clip_level(clip_level))
    }

    /// Drop all queued frames, such that the next frame read is newly acquired.
    pub fn clear_frame_queue(&self) -> Result<(), InstrumentError> {
        self.call(|b| b.clear_frame_queue())
    }

    /// Read the analysis results of the latest frame and, if they are valid, its image.
    pub fn read_frame(&self) -> Result<Frame, InstrumentError> {
        let mut inner = self.lock();
        self.check_connected(&inner)?;
        let scan_data = self.sdk(&mut inner, |b| b.get_scan_data())?;
        if !scan_data.is_valid {
            debug!("{}: Frame is not valid", self.name);
            return Ok(Frame {
                scan_data,
                image: None,
            });
        }

        let (width, height) = (scan_data.image_width, scan_data.image_height);
        let data = self.sdk(&mut inner, |b| b.get_image(width, height))?;
        let expected = usize::from(width) * usize::from(height);
        if data.len() != expected {
            return Err(InstrumentError::Measurement(format!(
                "{}: Image has {} pixels, expected {width} x {height} = {expected}",
                self.name,
                data.len()
            )));
        }
        Ok(Frame {
            scan_data,
            image: Some(Image {
                width,
                height,
                data,
            }),
        })
    }

    /// Read all camera settings that a beam profile depends on.
    pub fn settings(&self) -> Result<CameraSettings, InstrumentError> {
        Ok(CameraSettings {
            exposure_time_ms: self.get_exposure_time()?,
            auto_exposure: self.get_auto_exposure()?,
            gain_db: self.get_gain()?,
            binning: self.get_binning()?,
            roi: self.get_roi()?,
            calculation_area_mode: self.get_calculation_area_mode()?,
            clip_level: self.get_clip_level()?,
        })
    }

    /// Convert analysis results from pixels of the binned sensor to µm from the sensor center,
    /// using the current camera settings.
    pub fn convert_scan_data(&self, scan_data: &ScanData) -> Result<BeamProfile, InstrumentError> {
        let sensor = self.device_info()?.sensor;
        let settings = self.settings()?;
        Ok(BeamProfile::new(scan_data, settings, &sensor))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<B>> {
        self.inner.lock().expect("Mutex should not be poisoned")
    }

    fn not_connected(&self) -> InstrumentError {
        let msg = format!(
            "{}: Connection to device with serial number {} not open",
            self.name, self.serial_number
        );
        error!("{msg}");
        InstrumentError::NotConnected(msg)
    }

    fn check_connected(&self, inner: &Inner<B>) -> Result<(), InstrumentError> {
        if inner.info.is_some() {
            Ok(())
        } else {
            Err(self.not_connected())
        }
    }

    /// Call the library on an open session.
    fn call<T>(&self, f: impl FnOnce(&mut B) -> SdkResult<T>) -> Result<T, InstrumentError> {
        let mut inner = self.lock();
        self.check_connected(&inner)?;
        self.sdk(&mut inner, f)
    }

    /// Call the library. On error, the error message is fetched and the session is closed.
    fn sdk<T>(
        &self,
        inner: &mut Inner<B>,
        f: impl FnOnce(&mut B) -> SdkResult<T>,
    ) -> Result<T, InstrumentError> {
        f(&mut inner.backend).map_err(|code| {
            let message = inner.backend.error_message(code);
            let _ = inner.backend.close();
            inner.info = None;
            error!("{}: Error {code}: {message}", self.name);
            InstrumentError::Vendor {
                code: i64::from(code),
                message,
            }
        })
    }
}

impl<B: BeamCameraBackend> Clone for BeamProfiler<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            serial_number: self.serial_number,
            name: self.name.clone(),
        }
    }
}
