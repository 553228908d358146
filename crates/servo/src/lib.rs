//! Conversion from joint angles to servo pulse-widths.
//!
//! A hobby servo is commanded by a pulse-width in microseconds. Without
//! calibration data we fall back to a fixed linear scale; with a table of
//! bidirectional measurements we interpolate between the recorded points
//! and add a scalar hysteresis correction derived from the clockwise/
//! anticlockwise discrepancy. The strategy is picked once, when the servo
//! is constructed.

pub mod calibration;

pub use calibration::{CalibrationError, CalibrationPoint, CalibrationTable};

/// Fixed linear mapping from angle to pulse-width, used when no calibration
/// data is available.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LinearScale {
    /// Reference angle, in degrees.
    pub centre_angle: f64,
    /// Pulse-width commanded at `centre_angle`, in microseconds.
    pub centre_pulse_width: f64,
    /// Pulse-width change per degree. Negative for servos mounted so that
    /// increasing angle shortens the pulse.
    pub microseconds_per_degree: f64,
}

impl LinearScale {
    /// The plain linear formula. Angles outside any nominal range just
    /// continue the line; clamping is the driver's business, not ours.
    pub fn pulse_width(&self, degrees: f64) -> f64 {
        self.centre_pulse_width + (degrees - self.centre_angle) * self.microseconds_per_degree
    }
}

/// The conversion strategy for one servo, chosen once at construction.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Converter {
    /// No calibration data: plain linear scaling.
    Naive(LinearScale),
    /// Piecewise-linear interpolation over recorded measurements.
    Interpolated(CalibrationTable),
}

impl Converter {
    pub fn is_interpolated(&self) -> bool {
        matches!(self, Converter::Interpolated(_))
    }

    pub fn pulse_width(&self, degrees: f64) -> f64 {
        match self {
            Converter::Naive(scale) => scale.pulse_width(degrees),
            Converter::Interpolated(table) => table.nominal_pulse_width(degrees),
        }
    }
}

/// One servo: a conversion strategy plus the hysteresis correction derived
/// from its calibration table.
#[derive(Debug, Clone, PartialEq)]
pub struct Servo {
    converter: Converter,
    hysteresis_correction: f64,
}

impl Servo {
    pub fn naive(scale: LinearScale) -> Self {
        Servo {
            converter: Converter::Naive(scale),
            hysteresis_correction: 0.0,
        }
    }

    pub fn calibrated(table: CalibrationTable) -> Self {
        let hysteresis_correction = table.hysteresis_correction();
        Servo {
            converter: Converter::Interpolated(table),
            hysteresis_correction,
        }
    }

    /// Converted pulse-width before the hysteresis correction is applied.
    pub fn nominal_pulse_width(&self, degrees: f64) -> f64 {
        self.converter.pulse_width(degrees)
    }

    /// Pulse-width to command for the given angle.
    ///
    /// The correction is a single scalar added regardless of the direction
    /// of travel; the directional split exists only in the calibration data
    /// it was derived from.
    pub fn pulse_width(&self, degrees: f64) -> f64 {
        self.converter.pulse_width(degrees) + self.hysteresis_correction
    }

    pub fn hysteresis_correction(&self) -> f64 {
        self.hysteresis_correction
    }

    pub fn converter(&self) -> &Converter {
        &self.converter
    }
}
