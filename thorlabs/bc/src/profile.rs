//! Conversion of the analysis results of the TLBC2 library into a beam profile in µm.
//!
//! The origin of the beam profile is the center of the sensor. Positive x and y values point to
//! the right and to the top, respectively, as seen by the laser beam.

use serde::Serialize;

use amodevices::InstrumentError;

use crate::{Roi, ScanData, SensorInformation};

/// Sensor axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    /// Horizontal axis (x).
    Horizontal,
    /// Vertical axis (y).
    Vertical,
}

/// Shape of the calculation area.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum CalculationAreaShape {
    /// Rectangle.
    Rectangle,
    /// Ellipse.
    Ellipse,
    /// Shape determined by the library from the iso-intensity contour.
    IsoAuto,
}

impl CalculationAreaShape {
    pub(crate) fn form(&self) -> u8 {
        match self {
            CalculationAreaShape::Rectangle => 0,
            CalculationAreaShape::Ellipse => 1,
            CalculationAreaShape::IsoAuto => 2,
        }
    }

    pub(crate) fn from_form(form: u8) -> Result<Self, InstrumentError> {
        match form {
            0 => Ok(CalculationAreaShape::Rectangle),
            1 => Ok(CalculationAreaShape::Ellipse),
            2 => Ok(CalculationAreaShape::IsoAuto),
            _ => Err(InstrumentError::ResponseParseError(format!(
                "Calculation area form {form}"
            ))),
        }
    }
}

/// How the calculation area is determined.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CalculationAreaMode {
    /// Is the calculation area determined automatically? Otherwise, the user calculation area
    /// is used.
    pub automatic: bool,
    /// Shape of the calculation area.
    pub shape: CalculationAreaShape,
}

/// Camera settings that a beam profile depends on.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CameraSettings {
    /// Exposure time in ms.
    pub exposure_time_ms: f64,
    /// Auto exposure state.
    pub auto_exposure: bool,
    /// Gain in dB.
    pub gain_db: f64,
    /// Pixel binning.
    pub binning: u8,
    /// Region of interest.
    pub roi: Roi,
    /// Calculation area mode.
    pub calculation_area_mode: CalculationAreaMode,
    /// Clip level for the ellipse fit.
    pub clip_level: f64,
}

/// Beam profile, with all positions and widths in µm as measured from the sensor center.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BeamProfile {
    /// Settings of the camera when the profile was converted.
    pub settings: CameraSettings,
    /// Base level of the intensity counts.
    pub intensity_base_level: f64,
    /// Lowest intensity counts supported, after subtracting the base level.
    pub intensity_range_min: f64,
    /// Highest intensity counts supported, after subtracting the base level.
    pub intensity_range_max: f64,
    /// Peak intensity counts of the image, including the base level.
    pub intensity_peak: f64,
    /// Ratio of the peak intensity to the highest intensity supported.
    pub saturation: f64,
    /// Left edge of the region of interest.
    pub roi_left: f64,
    /// Top edge of the region of interest.
    pub roi_top: f64,
    /// Width of the region of interest.
    pub roi_width: f64,
    /// Height of the region of interest.
    pub roi_height: f64,
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
    pub centroid_x: f64,
    /// Vertical centroid position.
    pub centroid_y: f64,
    /// Horizontal center of the fitted ellipse.
    pub ellipse_x: f64,
    /// Vertical center of the fitted ellipse.
    pub ellipse_y: f64,
    /// Minor diameter of the ellipse at the clip level.
    pub ellipse_diameter_min: f64,
    /// Major diameter of the ellipse at the clip level.
    pub ellipse_diameter_max: f64,
    /// Mean diameter of the ellipse at the clip level.
    pub ellipse_diameter_mean: f64,
    /// Minor radius of the ellipse at the clip level.
    pub ellipse_radius_min: f64,
    /// Major radius of the ellipse at the clip level.
    pub ellipse_radius_max: f64,
    /// Mean radius of the ellipse at the clip level.
    pub ellipse_radius_mean: f64,
    /// Ellipticity of the ellipse.
    pub ellipse_ellipticity: f64,
    /// Orientation of the ellipse in degrees.
    pub ellipse_orientation: f64,
}

/// Convert a value in (unbinned) pixels to µm.
pub fn px_to_um(sensor: &SensorInformation, value: f64, axis: Axis) -> f64 {
    match axis {
        Axis::Horizontal => value * sensor.pixel_pitch_h,
        Axis::Vertical => value * sensor.pixel_pitch_v,
    }
}

impl BeamProfile {
    /// Convert the analysis results of a frame that was taken with the given settings.
    pub fn new(scan: &ScanData, settings: CameraSettings, sensor: &SensorInformation) -> Self {
        let binning = f64::from(settings.binning);
        let roi = settings.roi;
        let left = f64::from(roi.left);
        let top = f64::from(roi.top);
        let half_h = f64::from(sensor.pixels_h) / 2.0 / binning;
        let half_v = f64::from(sensor.pixels_v) / 2.0 / binning;

        let width_x = |px: f64| px_to_um(sensor, binning * px, Axis::Horizontal);
        let width_y = |px: f64| px_to_um(sensor, binning * px, Axis::Vertical);
        let pos_x = |px: f64| width_x(px + left - half_h);
        let pos_y = |px: f64| -width_y(px + top - half_v);
        let um_per_px_mean = (width_x(1.0) + width_y(1.0)) / 2.0;

        Self {
            settings,
            intensity_base_level: scan.base_level,
            intensity_range_min: scan.min_intensity,
            intensity_range_max: scan.max_intensity,
            intensity_peak: scan.peak_intensity,
            saturation: scan.saturation,
            roi_left: width_x(left - half_h),
            roi_top: -width_y(top - half_v),
            roi_width: width_x(f64::from(roi.width)),
            roi_height: width_y(f64::from(roi.height)),
            calc_area_center_x: pos_x(scan.calc_area_center_x),
            calc_area_center_y: pos_y(scan.calc_area_center_y),
            calc_area_width: width_x(scan.calc_area_width),
            calc_area_height: width_y(scan.calc_area_height),
            calc_area_angle: scan.calc_area_angle,
            centroid_x: pos_x(scan.centroid_position_x),
            centroid_y: pos_y(scan.centroid_position_y),
            ellipse_x: pos_x(scan.ellipse_center_x),
            ellipse_y: pos_y(scan.ellipse_center_y),
            ellipse_diameter_min: um_per_px_mean * scan.ellipse_dia_min,
            ellipse_diameter_max: um_per_px_mean * scan.ellipse_dia_max,
            ellipse_diameter_mean: um_per_px_mean * scan.ellipse_dia_mean,
            ellipse_radius_min: um_per_px_mean * scan.ellipse_dia_min / 2.0,
            ellipse_radius_max: um_per_px_mean * scan.ellipse_dia_max / 2.0,
            ellipse_radius_mean: um_per_px_mean * scan.ellipse_dia_mean / 2.0,
            ellipse_ellipticity: scan.ellipse_ellipticity,
            ellipse_orientation: scan.ellipse_orientation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SENSOR: SensorInformation = SensorInformation {
        pixels_h: 1000,
        pixels_v: 800,
        pixel_pitch_h: 5.0,
        pixel_pitch_v: 6.0,
    };

    fn settings(binning: u8, roi: Roi) -> CameraSettings {
        CameraSettings {
            exposure_time_ms: 1.0,
            auto_exposure: false,
            gain_db: 0.0,
            binning,
            roi,
            calculation_area_mode: CalculationAreaMode {
                automatic: true,
                shape: CalculationAreaShape::Ellipse,
            },
            clip_level: 0.135,
        }
    }

    #[test]
    fn centered_beam_is_at_origin() {
        let roi = Roi { left: 0, top: 0, width: 1000, height: 800 };
        let scan = ScanData {
            centroid_position_x: 500.0,
            centroid_position_y: 400.0,
            ..Default::default()
        };
        let profile = BeamProfile::new(&scan, settings(1, roi), &SENSOR);
        assert_eq!(profile.centroid_x, 0.0);
        assert_eq!(profile.centroid_y, 0.0);
        assert_eq!(profile.roi_left, -2500.0);
        assert_eq!(profile.roi_top, 2400.0);
        assert_eq!(profile.roi_width, 5000.0);
        assert_eq!(profile.roi_height, 4800.0);
    }

    #[test]
    fn binned_roi_offsets_positions() {
        // Binning 2: binned sensor is 500 x 400, its center at (250, 200).
        let roi = Roi { left: 100, top: 50, width: 200, height: 100 };
        let scan = ScanData {
            centroid_position_x: 160.0,
            centroid_position_y: 160.0,
            calc_area_width: 10.0,
            calc_area_height: 10.0,
            ellipse_dia_min: 4.0,
            ellipse_dia_max: 8.0,
            ellipse_dia_mean: 6.0,
            ..Default::default()
        };
        let profile = BeamProfile::new(&scan, settings(2, roi), &SENSOR);
        // (160 + 100 - 250) * 2 * 5
        assert_eq!(profile.centroid_x, 100.0);
        // -(160 + 50 - 200) * 2 * 6
        assert_eq!(profile.centroid_y, -120.0);
        assert_eq!(profile.calc_area_width, 100.0);
        assert_eq!(profile.calc_area_height, 120.0);
        // Mean of 10 µm and 12 µm per binned pixel.
        assert_eq!(profile.ellipse_diameter_min, 44.0);
        assert_eq!(profile.ellipse_diameter_max, 88.0);
        assert_eq!(profile.ellipse_radius_mean, 33.0);
    }

    #[test]
    fn calculation_area_forms() {
        for shape in [
            CalculationAreaShape::Rectangle,
            CalculationAreaShape::Ellipse,
            CalculationAreaShape::IsoAuto,
        ] {
            assert_eq!(CalculationAreaShape::from_form(shape.form()).unwrap(), shape);
        }
        assert!(CalculationAreaShape::from_form(3).is_err());
    }
}
