//! Interface to the Thorlabs TLBC2 beam profiler library and the data it returns.

use serde::Serialize;

/// Result of a call into the TLBC2 library. The error is the status code of the library.
pub type SdkResult<T> = Result<T, i32>;

/// The functions of the TLBC2 library that are used by this driver.
///
/// Every function that can fail returns the non-zero status code of the library as error.
/// The text belonging to a status code is looked up with
/// [`BeamCameraBackend::error_message`].
pub trait BeamCameraBackend {
    /// Number of beam profilers connected to the system.
    fn device_count(&mut self) -> SdkResult<u32>;

    /// Information about the beam profiler with the given index.
    fn device_information(&mut self, index: u32) -> SdkResult<DeviceListEntry>;

    /// Open a session to the beam profiler with the given resource name.
    fn open(&mut self, resource_name: &str) -> SdkResult<()>;

    /// Close the session.
    fn close(&mut self) -> SdkResult<()>;

    /// Text that belongs to a status code.
    fn error_message(&mut self, code: i32) -> String;

    /// Driver and firmware revision, in this order.
    fn revision_query(&mut self) -> SdkResult<(String, String)>;

    /// Information about the sensor.
    fn sensor_information(&mut self) -> SdkResult<SensorInformation>;

    /// Get the exposure time in ms.
    fn get_exposure_time(&mut self) -> SdkResult<f64>;

    /// Set the exposure time in ms.
    fn set_exposure_time(&mut self, exposure_time_ms: f64) -> SdkResult<()>;

    /// Get the auto exposure state.
    fn get_auto_exposure(&mut self) -> SdkResult<bool>;

    /// Set the auto exposure state.
    fn set_auto_exposure(&mut self, on: bool) -> SdkResult<()>;

    /// Get the gain in dB.
    fn get_gain(&mut self) -> SdkResult<f64>;

    /// Set the gain in dB.
    fn set_gain(&mut self, gain_db: f64) -> SdkResult<()>;

    /// Get the pixel binning.
    fn get_binning(&mut self) -> SdkResult<u8>;

    /// Set the pixel binning.
    fn set_binning(&mut self, binning: u8) -> SdkResult<()>;

    /// Get the region of interest.
    fn get_roi(&mut self) -> SdkResult<Roi>;

    /// Set the region of interest.
    fn set_roi(&mut self, roi: Roi) -> SdkResult<()>;

    /// Get the calculation area mode as `(automatic, form)`.
    fn get_calculation_area_mode(&mut self) -> SdkResult<(bool, u8)>;

    /// Set the calculation area mode.
    fn set_calculation_area_mode(&mut self, automatic: bool, form: u8) -> SdkResult<()>;

    /// Get the user calculation area.
    fn get_user_calculation_area(&mut self) -> SdkResult<UserCalculationArea>;

    /// Set the user calculation area.
    fn set_user_calculation_area(&mut self, area: UserCalculationArea) -> SdkResult<()>;

    /// Get the clip level.
    fn get_clip_level(&mut self) -> SdkResult<f64>;

    /// Set the clip level.
    fn set_clip_level(&mut self, clip_level: f64) -> SdkResult<()>;

    /// Drop all queued frames.
    fn clear_frame_queue(&mut self) -> SdkResult<()>;

    /// Analysis results of the latest frame.
    fn get_scan_data(&mut self) -> SdkResult<ScanData>;

    /// Image of the latest frame, row by row, with the given dimensions.
    fn get_image(&mut self, width: u16, height: u16) -> SdkResult<Vec<u16>>;
}

/// An entry of the device list of the TLBC2 library.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DeviceListEntry {
    /// Manufacturer.
    pub manufacturer: String,
    /// Model name.
    pub model: String,
    /// Serial number, as reported by the library.
    pub serial_number: String,
    /// Is the device available, i.e., not opened by another application?
    pub available: bool,
    /// Resource name to open the device with.
    pub resource_name: String,
}

/// Sensor dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SensorInformation {
    /// Number of horizontal pixels.
    pub pixels_h: u16,
    /// Number of vertical pixels.
    pub pixels_v: u16,
    /// Horizontal pixel pitch in µm.
    pub pixel_pitch_h: f64,
    /// Vertical pixel pitch in µm.
    pub pixel_pitch_v: f64,
}

/// Region of interest, in pixels of the binned sensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Roi {
    /// Left edge.
    pub left: u16,
    /// Top edge.
    pub top: u16,
    /// Width.
    pub width: u16,
    /// Height.
    pub height: u16,
}

/// User-defined calculation area, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct UserCalculationArea {
    /// Horizontal center position.
    pub center_x: f64,
    /// Vertical center position.
    pub center_y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
    /// Rotation angle in degrees.
    pub angle: f64,
}

/// Analysis results of a frame, as calculated by the TLBC2 library.
///
/// Positions and widths are given in pixels of the binned sensor, intensities in counts of
/// the digitizer.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ScanData {
    /// Are the results (and the image) valid?
    pub is_valid: bool,
    /// Width of the image.
    pub image_width: u16,
    /// Height of the image.
    pub image_height: u16,
    /// Base level of the intensity counts.
    pub base_level: f64,
    /// Lowest intensity counts supported, after subtracting the base level.
    pub min_intensity: f64,
    /// Highest intensity counts supported, after subtracting the base level.
    pub max_intensity: f64,
    /// Peak intensity counts of the image, including the base level.
    pub peak_intensity: f64,
    /// Ratio of the peak intensity to the highest intensity supported.
    pub saturation: f64,
    /// Horizontal center of the calculation area.
    pub calc_area_center_x: f64,
    /// Vertical center of the calculation area.
    pub calc_area_center_y: f64,
    /// Width of the calculation area.
    pub calc_area_width: f64,
    /// Height of the calculation area.
    pub calc_area_height: f64,
    /// Angle of the calculation area in degrees.
    pub calc_area_angle: f64,
    /// Horizontal centroid position.
    pub centroid_position_x: f64,
    /// Vertical centroid position.
    pub centroid_position_y: f64,
    /// Horizontal center of the fitted ellipse.
    pub ellipse_center_x: f64,
    /// Vertical center of the fitted ellipse.
    pub ellipse_center_y: f64,
    /// Minor diameter of the ellipse at the clip level.
    pub ellipse_dia_min: f64,
    /// Major diameter of the ellipse at the clip level.
    pub ellipse_dia_max: f64,
    /// Mean diameter of the ellipse at the clip level.
    pub ellipse_dia_mean: f64,
    /// Ellipticity of the ellipse.
    pub ellipse_ellipticity: f64,
    /// Orientation of the ellipse in degrees.
    pub ellipse_orientation: f64,
}
