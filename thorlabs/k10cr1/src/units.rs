//! Conversion between device units and physical units of the K10CR1.
//!
//! The conversion factors are given in the Thorlabs APT communications protocol for the K10CR1:
//! 136533.33 steps per degree, 7329109.33 velocity units per degree per second and 1502.0
//! acceleration units per degree per second squared.

/// Position steps per degree.
pub const STEPS_PER_DEGREE: f64 = 136533.33;

/// Velocity device units per degree per second.
pub const VELOCITY_PER_DEGREE_PER_SEC: f64 = 7329109.33;

/// Acceleration device units per degree per second squared.
pub const ACCELERATION_PER_DEGREE_PER_SEC2: f64 = 1502.0;

/// Precision, in degrees, to which positions in device units are converted to degrees.
pub const POSITION_PRECISION: f64 = 1e-5;

/// Convert a position in device units to degrees, rounded to [`POSITION_PRECISION`].
pub fn steps_to_degrees(steps: i32) -> f64 {
    round_to_precision(f64::from(steps) / STEPS_PER_DEGREE, POSITION_PRECISION)
}

/// Convert a position in degrees to the nearest position in device units.
pub fn degrees_to_steps(degrees: f64) -> i32 {
    (degrees * STEPS_PER_DEGREE).round() as i32
}

/// Convert a velocity in device units to degrees per second.
pub fn velocity_to_degrees_per_sec(velocity: i32) -> f64 {
    f64::from(velocity) / VELOCITY_PER_DEGREE_PER_SEC
}

/// Convert a velocity in degrees per second to device units.
pub fn degrees_per_sec_to_velocity(degrees_per_sec: f64) -> i32 {
    (degrees_per_sec * VELOCITY_PER_DEGREE_PER_SEC).round() as i32
}

/// Convert an acceleration in device units to degrees per second squared.
pub fn acceleration_to_degrees_per_sec2(acceleration: i32) -> f64 {
    f64::from(acceleration) / ACCELERATION_PER_DEGREE_PER_SEC2
}

/// Convert an acceleration in degrees per second squared to device units.
pub fn degrees_per_sec2_to_acceleration(degrees_per_sec2: f64) -> i32 {
    (degrees_per_sec2 * ACCELERATION_PER_DEGREE_PER_SEC2).round() as i32
}

fn round_to_precision(value: f64, precision: f64) -> f64 {
    (value / precision).round() * precision
}
