//! Bidirectional calibration measurements for a single servo.
//!
//! A servo horn settles at slightly different pulse-widths depending on
//! whether an angle was approached clockwise or anticlockwise, because of
//! backlash in the gears and linkages. A calibration run records both
//! settling values at a sparse set of reference angles; the table
//! interpolates between them and summarises the directional discrepancy as
//! a single scalar correction.

/// One measured reference point.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CalibrationPoint {
    /// Reference angle, in degrees.
    pub angle: f64,
    /// Pulse-width that settles at `angle` when approached clockwise, in
    /// microseconds.
    pub cw: u16,
    /// Pulse-width that settles at `angle` when approached anticlockwise,
    /// in microseconds.
    pub acw: u16,
}

impl CalibrationPoint {
    pub fn new(angle: f64, cw: u16, acw: u16) -> Self {
        CalibrationPoint { angle, cw, acw }
    }

    /// Half the anticlockwise/clockwise discrepancy at this point.
    fn half_difference(&self) -> f64 {
        (self.acw as f64 - self.cw as f64) / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum CalibrationError {
    #[error("calibration table needs at least two points, got {count}")]
    TooFewPoints { count: usize },
    #[error("duplicate reference angle {angle}° in calibration table")]
    DuplicateAngle { angle: f64 },
    #[error("reference angle {angle} is not finite")]
    NonFiniteAngle { angle: f64 },
}

/// Recorded reference points for one servo, kept sorted by angle.
///
/// Immutable once built; all validation happens in [`CalibrationTable::new`]
/// rather than at first use.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "Vec<CalibrationPoint>", into = "Vec<CalibrationPoint>")]
pub struct CalibrationTable {
    points: Vec<CalibrationPoint>,
}

impl CalibrationTable {
    /// Builds a table from measurements supplied in any order.
    ///
    /// Needs at least two points (interpolation is undefined otherwise),
    /// and every reference angle must be finite and unique.
    pub fn new(mut points: Vec<CalibrationPoint>) -> Result<Self, CalibrationError> {
        if points.len() < 2 {
            return Err(CalibrationError::TooFewPoints {
                count: points.len(),
            });
        }
        for p in &points {
            if !p.angle.is_finite() {
                return Err(CalibrationError::NonFiniteAngle { angle: p.angle });
            }
        }
        points.sort_by(|a, b| a.angle.total_cmp(&b.angle));
        for pair in points.windows(2) {
            if pair[0].angle == pair[1].angle {
                return Err(CalibrationError::DuplicateAngle {
                    angle: pair[0].angle,
                });
            }
        }
        Ok(CalibrationTable { points })
    }

    pub fn points(&self) -> &[CalibrationPoint] {
        &self.points
    }

    /// Mean of the half-differences between the anticlockwise and clockwise
    /// series over all reference points.
    pub fn hysteresis_correction(&self) -> f64 {
        let sum: f64 = self.points.iter().map(CalibrationPoint::half_difference).sum();
        sum / self.points.len() as f64
    }

    /// Interpolated pulse-width at `degrees`, before hysteresis correction.
    ///
    /// The clockwise and anticlockwise series are interpolated separately
    /// between the bracketing reference points and then averaged. Outside
    /// the covered range, the line through the two nearest points is
    /// extended.
    pub fn nominal_pulse_width(&self, degrees: f64) -> f64 {
        let (lo, hi) = self.bracket(degrees);
        let t = (degrees - lo.angle) / (hi.angle - lo.angle);
        let cw = lerp(lo.cw as f64, hi.cw as f64, t);
        let acw = lerp(lo.acw as f64, hi.acw as f64, t);
        (cw + acw) / 2.0
    }

    /// The two reference points whose segment covers `degrees`, falling back
    /// to the first or last segment off either end of the table.
    fn bracket(&self, degrees: f64) -> (&CalibrationPoint, &CalibrationPoint) {
        let hi = self
            .points
            .partition_point(|p| p.angle < degrees)
            .clamp(1, self.points.len() - 1);
        (&self.points[hi - 1], &self.points[hi])
    }
}

impl TryFrom<Vec<CalibrationPoint>> for CalibrationTable {
    type Error = CalibrationError;

    fn try_from(points: Vec<CalibrationPoint>) -> Result<Self, CalibrationError> {
        CalibrationTable::new(points)
    }
}

impl From<CalibrationTable> for Vec<CalibrationPoint> {
    fn from(table: CalibrationTable) -> Self {
        table.points
    }
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}
