//! Interfaces to the Boson SDK (camera control over the serial command channel) and to the
//! USB video capture that delivers the frames.

use amodevices::InstrumentError;

/// Result of a call into the Boson SDK. The error is the `FLR_RESULT` code of the SDK.
pub type FlrResult<T> = Result<T, u32>;

/// FOURCC code of 16 bit grayscale video.
pub const FOURCC_Y16: [u8; 4] = *b"Y16 ";

/// Gain mode of the camera.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GainMode {
    /// High gain, i.e., low temperature range.
    High,
    /// Low gain, i.e., high temperature range.
    Low,
    /// Automatic switching between high and low gain.
    Auto,
}

/// Content of the 16 bit USB video stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UsbVideoIr16Mode {
    /// Raw sensor counts.
    Raw,
    /// Temperature linear output, in units of 0.01 K.
    TLinear,
}

/// The functions of the Boson SDK that are used by this driver.
pub trait BosonControl {
    /// Open the command channel on the given serial port.
    fn open_comm(&mut self, port: &str) -> FlrResult<()>;

    /// Close the command channel.
    fn close_comm(&mut self) -> FlrResult<()>;

    /// Set the gain mode.
    fn set_gain_mode(&mut self, mode: GainMode) -> FlrResult<()>;

    /// Enable or disable temperature linear output.
    fn tlinear_set_control(&mut self, enable: bool) -> FlrResult<()>;

    /// Select what the 16 bit USB video stream contains.
    fn set_usb_video_ir16_mode(&mut self, mode: UsbVideoIr16Mode) -> FlrResult<()>;

    /// Set the emissivity of the target in percent.
    fn set_emissivity_target(&mut self, percent: u16) -> FlrResult<()>;

    /// Set the temperature of the window in K.
    fn set_temp_window(&mut self, kelvin: u16) -> FlrResult<()>;

    /// Set the transmission of the window in percent.
    fn set_transmission_window(&mut self, percent: u16) -> FlrResult<()>;

    /// Set the reflectivity of the window in percent.
    fn set_reflectivity_window(&mut self, percent: u16) -> FlrResult<()>;

    /// Set the temperature of what is reflected by the window in K.
    fn set_temp_window_reflection(&mut self, kelvin: u16) -> FlrResult<()>;

    /// Set the transmission of the atmosphere in percent.
    fn set_transmission_atmosphere(&mut self, percent: u16) -> FlrResult<()>;

    /// Set the temperature of the atmosphere in K.
    fn set_temp_atmosphere(&mut self, kelvin: u16) -> FlrResult<()>;

    /// Set the temperature of the background in K.
    fn set_temp_background(&mut self, kelvin: u16) -> FlrResult<()>;

    /// Recompute the temperature linear lookup table for the given gain mode.
    fn tlinear_refresh_lut(&mut self, mode: GainMode) -> FlrResult<()>;

    /// Run a flat field correction.
    fn run_ffc(&mut self) -> FlrResult<()>;
}

/// A video capture device that delivers the frames of the camera.
pub trait FrameGrabber {
    /// Open the capture device with the given index.
    fn open(&mut self, device_index: u32) -> Result<(), InstrumentError>;

    /// Set the frame size in pixels.
    fn set_resolution(&mut self, width: u32, height: u32) -> Result<(), InstrumentError>;

    /// Set the pixel format.
    fn set_fourcc(&mut self, fourcc: [u8; 4]) -> Result<(), InstrumentError>;

    /// Enable or disable conversion of frames to RGB.
    fn set_convert_rgb(&mut self, convert: bool) -> Result<(), InstrumentError>;

    /// Grab the next frame, row by row. Returns `None` if no frame could be grabbed.
    fn read(&mut self) -> Result<Option<Vec<u16>>, InstrumentError>;

    /// Release the capture device.
    fn release(&mut self);
}
