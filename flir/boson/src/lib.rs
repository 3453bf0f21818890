//! A rust driver for FLIR Boson thermal cameras.
//!
//! The camera is configured through the command channel of the Boson SDK ([`BosonControl`])
//! and streams its frames as USB video, which is read with a [`FrameGrabber`]. On connecting,
//! the camera is set to high gain and temperature linear (TLinear) output with the radiometry
//! parameters from the configuration, so that every pixel of a frame is a temperature in units
//! of 0.01 K.
//!
//! # Example
//!
//! ```no_run
//! use amodevices::{DeviceConfig, InstrumentError};
//! use flir_boson::{BosonControl, FlirBoson, FrameGrabber, convert_frame_to_celsius};
//!
//! fn run<C: BosonControl, G: FrameGrabber>(
//!     control: C,
//!     grabber: G,
//!     config: &DeviceConfig,
//! ) -> Result<(), InstrumentError> {
//!     let cam = FlirBoson::from_config(control, grabber, config)?;
//!     cam.connect()?;
//!     let frame = cam.read_frame()?;
//!     let celsius = convert_frame_to_celsius(&frame);
//!     println!("Maximum: {:.2} °C", celsius.iter().cloned().fold(f64::MIN, f64::max));
//!     cam.close()
//! }
//! ```

#![warn(missing_docs)]

mod backend;

use std::sync::{Arc, Mutex};

use measurements::Temperature;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use amodevices::{DeviceConfig, InstrumentError};

pub use backend::{
    BosonControl, FOURCC_Y16, FlrResult, FrameGrabber, GainMode, UsbVideoIr16Mode,
};

/// Offset between kelvin and degree Celsius.
const ZERO_CELSIUS_IN_KELVIN: f64 = 273.15;

/// Radiometry parameters, read from `Radiometry` in the device specific parameters.
/// Percentages are in percent, temperatures in K.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Radiometry {
    /// Emissivity of the target.
    pub emissivity_target: u16,
    /// Temperature of the window.
    pub temp_window: u16,
    /// Transmission of the window.
    pub transmission_window: u16,
    /// Reflectivity of the window.
    pub reflectivity_window: u16,
    /// Temperature of what the window reflects.
    pub temp_window_reflection: u16,
    /// Transmission of the atmosphere.
    pub transmission_atmosphere: u16,
    /// Temperature of the atmosphere.
    pub temp_atmosphere: u16,
    /// Temperature of the background.
    pub temp_background: u16,
}

impl Default for Radiometry {
    fn default() -> Self {
        Self {
            emissivity_target: 100,
            temp_window: 295,
            transmission_window: 100,
            reflectivity_window: 0,
            temp_window_reflection: 295,
            transmission_atmosphere: 100,
            temp_atmosphere: 295,
            temp_background: 295,
        }
    }
}

/// Video capture settings, read from `CV2Config` in the device specific parameters.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct GrabberConfig {
    /// Index of the capture device.
    pub device_index: u32,
    /// Frame size as `[width, height]` in pixels.
    pub resolution: [u32; 2],
}

impl Default for GrabberConfig {
    fn default() -> Self {
        Self {
            device_index: 1,
            resolution: [320, 256],
        }
    }
}

/// Device specific parameters of the camera.
///
/// ```json
/// {"Radiometry": {"EmissivityTarget": 95}, "CV2Config": {"DeviceIndex": 0}}
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct BosonParams {
    /// Radiometry parameters.
    #[serde(rename = "Radiometry", default)]
    pub radiometry: Radiometry,
    /// Video capture settings.
    #[serde(rename = "CV2Config", default)]
    pub grabber: GrabberConfig,
}

/// A frame of the camera in TLinear output, i.e., in units of 0.01 K.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel values, row by row.
    pub data: Vec<u16>,
}

impl Frame {
    /// Raw value of the pixel in the given row and column.
    pub fn pixel(&self, row: u32, col: u32) -> Option<u16> {
        if row >= self.height || col >= self.width {
            return None;
        }
        self.data.get((row * self.width + col) as usize).copied()
    }

    /// Temperature of the pixel in the given row and column.
    pub fn temperature(&self, row: u32, col: u32) -> Option<Temperature> {
        self.pixel(row, col)
            .map(|v| Temperature::from_kelvin(f64::from(v) / 100.0))
    }
}

/// Convert a TLinear frame to degree Celsius, pixel by pixel.
pub fn convert_frame_to_celsius(frame: &Frame) -> Vec<f64> {
    frame
        .data
        .iter()
        .map(|v| f64::from(*v) / 100.0 - ZERO_CELSIUS_IN_KELVIN)
        .collect()
}

struct Inner<C, G> {
    control: C,
    grabber: G,
    connected: bool,
}

/// A rust driver for the FLIR Boson.
pub struct FlirBoson<C: BosonControl, G: FrameGrabber> {
    inner: Arc<Mutex<Inner<C, G>>>,
    port: String,
    params: BosonParams,
    name: String,
}

impl<C: BosonControl, G: FrameGrabber> FlirBoson<C, G> {
    /// Create a new camera instance. `port` is the serial port of the command channel.
    pub fn new(control: C, grabber: G, port: &str, params: BosonParams) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                control,
                grabber,
                connected: false,
            })),
            port: port.to_string(),
            params,
            name: "FLIR Boson".to_string(),
        }
    }

    /// Create a new camera instance from a device configuration. The address is the serial
    /// port of the command channel, see [`BosonParams`] for the device specific parameters.
    pub fn from_config(
        control: C,
        grabber: G,
        config: &DeviceConfig,
    ) -> Result<Self, InstrumentError> {
        let params: BosonParams = config.device_specific_params()?;
        Ok(Self::new(control, grabber, &config.address, params).with_name(&config.device))
    }

    /// Set the name of the device used in log messages.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Radiometry and capture settings that are applied on connecting.
    pub fn params(&self) -> &BosonParams {
        &self.params
    }

    /// Open the command channel, configure the camera for TLinear output, and open the video
    /// capture.
    pub fn connect(&self) -> Result<(), InstrumentError> {
        let mut inner = self.lock();
        let inner = &mut *inner;
        if let Err(code) = inner.control.open_comm(&self.port) {
            let err = InstrumentError::ConnectionFailed {
                device: self.name.clone(),
                reason: format!(
                    "Opening command channel on {} failed with FLR_RESULT {code}",
                    self.port
                ),
            };
            error!("{err}");
            return Err(err);
        }
        if let Err(code) = self.configure(&mut inner.control) {
            self.close_comm_after_error(&mut inner.control);
            return Err(self.sdk_error(code));
        }
        if let Err(err) = self.open_grabber(&mut inner.grabber) {
            error!("{}: Opening video capture failed: {err}", self.name);
            inner.grabber.release();
            self.close_comm_after_error(&mut inner.control);
            return Err(err);
        }
        inner.connected = true;
        info!("{}: Connection opened on {}", self.name, self.port);
        Ok(())
    }

    fn configure(&self, control: &mut C) -> FlrResult<()> {
        let rad = &self.params.radiometry;
        control.set_gain_mode(GainMode::High)?;
        control.tlinear_set_control(true)?;
        control.set_usb_video_ir16_mode(UsbVideoIr16Mode::TLinear)?;
        control.set_emissivity_target(rad.emissivity_target)?;
        control.set_temp_window(rad.temp_window)?;
        control.set_transmission_window(rad.transmission_window)?;
        control.set_reflectivity_window(rad.reflectivity_window)?;
        control.set_temp_window_reflection(rad.temp_window_reflection)?;
        control.set_transmission_atmosphere(rad.transmission_atmosphere)?;
        control.set_temp_atmosphere(rad.temp_atmosphere)?;
        control.set_temp_background(rad.temp_background)?;
        // Radiometry changes only take effect with a new lookup table.
        control.tlinear_refresh_lut(GainMode::High)?;
        control.run_ffc()?;
        debug!("{}: Configured radiometry {rad:?}", self.name);
        Ok(())
    }

    fn close_comm_after_error(&self, control: &mut C) {
        if let Err(code) = control.close_comm() {
            warn!("{}: Closing command channel failed with FLR_RESULT {code}", self.name);
        }
    }

    fn open_grabber(&self, grabber: &mut G) -> Result<(), InstrumentError> {
        let cfg = &self.params.grabber;
        grabber.open(cfg.device_index)?;
        grabber.set_resolution(cfg.resolution[0], cfg.resolution[1])?;
        grabber.set_fourcc(FOURCC_Y16)?;
        grabber.set_convert_rgb(false)
    }

    /// Release the video capture and close the command channel.
    pub fn close(&self) -> Result<(), InstrumentError> {
        let mut inner = self.lock();
        inner.connected = false;
        inner.grabber.release();
        inner.control.close_comm().map_err(|code| self.sdk_error(code))?;
        info!("{}: Connection closed", self.name);
        Ok(())
    }

    /// Are the command channel and the video capture open?
    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    /// Run a flat field correction.
    pub fn run_ffc(&self) -> Result<(), InstrumentError> {
        let mut inner = self.lock();
        if !inner.connected {
            return Err(self.not_connected());
        }
        inner.control.run_ffc().map_err(|code| self.sdk_error(code))
    }

    /// Grab a frame.
    ///
    /// Fails with [`InstrumentError::Measurement`] if no frame was received or its size does
    /// not match the configured resolution.
    pub fn read_frame(&self) -> Result<Frame, InstrumentError> {
        let mut inner = self.lock();
        if !inner.connected {
            return Err(self.not_connected());
        }
        let [width, height] = self.params.grabber.resolution;
        let data = inner.grabber.read()?.ok_or_else(|| {
            InstrumentError::Measurement(format!("{}: No frame received", self.name))
        })?;
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(InstrumentError::Measurement(format!(
                "{}: Received frame with {} pixels, expected {width}x{height} = {expected}",
                self.name,
                data.len()
            )));
        }
        Ok(Frame {
            width,
            height,
            data,
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<C, G>> {
        self.inner.lock().expect("Mutex should not be poisoned")
    }

    fn not_connected(&self) -> InstrumentError {
        InstrumentError::NotConnected(format!("{}: Camera is not connected", self.name))
    }

    fn sdk_error(&self, code: u32) -> InstrumentError {
        let err = InstrumentError::Vendor {
            code: code.into(),
            message: format!("{}: Boson SDK returned FLR_RESULT {code}", self.name),
        };
        error!("{err}");
        err
    }
}

impl<C: BosonControl, G: FrameGrabber> Clone for FlirBoson<C, G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            port: self.port.clone(),
            params: self.params.clone(),
            name: self.name.clone(),
        }
    }
}
