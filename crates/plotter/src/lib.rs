//! The plotter facade: owns the arm geometry, the two joint servos and the
//! mutable arm state, and turns move requests into pulse-widths for an
//! external servo driver to apply.
//!
//! Everything except the arm state is fixed at construction. The pen-lift
//! pulse-widths and the virtual-mode flag are carried opaquely for the
//! driver; they take no part in the angle conversions.

use panto_geom::{Config, ConfigBuilder, JointAngles, Len, LenExt, Point, ShoulderElbow};
use panto_servo::{CalibrationTable, LinearScale, Servo};

pub use panto_geom::{GeomError, ReachabilityError};
pub use panto_servo::CalibrationError;

/// Pulse-widths for the two joint servos, in microseconds.
pub type PulseWidths = ShoulderElbow<f64>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Unreachable(#[from] ReachabilityError),
    #[error("joint angles ({angle_1}, {angle_2}) are not finite")]
    NonFiniteAngle { angle_1: f64, angle_2: f64 },
    #[error(transparent)]
    Geometry(#[from] GeomError),
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
}

#[derive(Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PlotterBuilder {
    inner_arm: Len,
    outer_arm: Len,
    shoulder_calibration: Option<CalibrationTable>,
    elbow_calibration: Option<CalibrationTable>,
    shoulder_scale: LinearScale,
    elbow_scale: LinearScale,
    park_angles: (f64, f64),
    pen_up_pulse_width: f64,
    pen_down_pulse_width: f64,
    virtual_mode: bool,
}

impl Default for PlotterBuilder {
    fn default() -> Self {
        Self {
            inner_arm: 8.0.cm(),
            outer_arm: 8.0.cm(),
            shoulder_calibration: None,
            elbow_calibration: None,
            // The stock servos run 10 µs per degree around a 1500 µs centre;
            // the shoulder one is mounted mirrored.
            shoulder_scale: LinearScale {
                centre_angle: -90.0,
                centre_pulse_width: 1500.0,
                microseconds_per_degree: -10.0,
            },
            elbow_scale: LinearScale {
                centre_angle: 90.0,
                centre_pulse_width: 1500.0,
                microseconds_per_degree: 10.0,
            },
            park_angles: (-90.0, 90.0),
            pen_up_pulse_width: 1500.0,
            pen_down_pulse_width: 1100.0,
            virtual_mode: false,
        }
    }
}

impl PlotterBuilder {
    pub fn build(&self) -> Result<Plotter, Error> {
        let geometry = ConfigBuilder::default()
            .with_inner_arm(self.inner_arm)
            .with_outer_arm(self.outer_arm)
            .build()?;

        let servo = |calibration: &Option<CalibrationTable>, scale: LinearScale| match calibration {
            Some(table) => Servo::calibrated(table.clone()),
            None => Servo::naive(scale),
        };
        let servos = ShoulderElbow {
            shoulder: servo(&self.shoulder_calibration, self.shoulder_scale),
            elbow: servo(&self.elbow_calibration, self.elbow_scale),
        };

        let mut plotter = Plotter {
            geometry,
            servos,
            park_angles: self.park_angles,
            pen_up_pulse_width: self.pen_up_pulse_width,
            pen_down_pulse_width: self.pen_down_pulse_width,
            virtual_mode: self.virtual_mode,
            state: ArmState {
                angle_1: 0.0,
                angle_2: 0.0,
                position: Point::new(0.0, 0.0),
                pen_up: true,
            },
        };
        plotter.park()?;
        Ok(plotter)
    }

    pub fn with_inner_arm(&mut self, inner_arm: Len) -> &mut Self {
        self.inner_arm = inner_arm;
        self
    }

    pub fn with_outer_arm(&mut self, outer_arm: Len) -> &mut Self {
        self.outer_arm = outer_arm;
        self
    }

    /// Bidirectional calibration for the shoulder servo. Without one, the
    /// naive linear scale is used.
    pub fn with_shoulder_calibration(&mut self, table: CalibrationTable) -> &mut Self {
        self.shoulder_calibration = Some(table);
        self
    }

    /// Bidirectional calibration for the elbow servo.
    pub fn with_elbow_calibration(&mut self, table: CalibrationTable) -> &mut Self {
        self.elbow_calibration = Some(table);
        self
    }

    pub fn with_shoulder_scale(&mut self, scale: LinearScale) -> &mut Self {
        self.shoulder_scale = scale;
        self
    }

    pub fn with_elbow_scale(&mut self, scale: LinearScale) -> &mut Self {
        self.elbow_scale = scale;
        self
    }

    pub fn with_park_angles(&mut self, angle_1: f64, angle_2: f64) -> &mut Self {
        self.park_angles = (angle_1, angle_2);
        self
    }

    /// Pulse-widths for the pen-lift servo, passed through to the driver.
    pub fn with_pen_pulse_widths(&mut self, up: f64, down: f64) -> &mut Self {
        self.pen_up_pulse_width = up;
        self.pen_down_pulse_width = down;
        self
    }

    /// When set, the driver should skip physical output. The flag is
    /// carried here untouched.
    pub fn with_virtual_mode(&mut self, virtual_mode: bool) -> &mut Self {
        self.virtual_mode = virtual_mode;
        self
    }
}

/// What changes when the arm moves. Everything else on the plotter is
/// read-only after construction.
///
/// Angles are held in degrees, exactly as the caller supplied them; they
/// are converted to radians only inside the geometry calls.
#[derive(Debug, Clone, PartialEq)]
struct ArmState {
    angle_1: f64,
    angle_2: f64,
    position: Point,
    pen_up: bool,
}

pub struct Plotter {
    geometry: Config,
    servos: ShoulderElbow<Servo>,
    park_angles: (f64, f64),
    pen_up_pulse_width: f64,
    pen_down_pulse_width: f64,
    virtual_mode: bool,
    state: ArmState,
}

impl Plotter {
    /// Joint angles (in degrees) that put the pen at `(x, y)`.
    pub fn xy_to_angles(&self, x: f64, y: f64) -> Result<(f64, f64), Error> {
        let angles = self.geometry.point_to_angles(&Point::new(x, y))?;
        Ok((angles.shoulder.to_degrees(), angles.elbow.to_degrees()))
    }

    /// Pen position for the given joint angles (in degrees). Total for any
    /// finite pair.
    pub fn angles_to_xy(&self, angle_1: f64, angle_2: f64) -> (f64, f64) {
        let p = self
            .geometry
            .angles_to_point(&JointAngles::from_degrees(angle_1, angle_2));
        (p.x, p.y)
    }

    /// Moves the joints to the given angles (in degrees) and refreshes the
    /// derived pen position.
    ///
    /// Only non-finite input is refused; whether the pose is mechanically
    /// wise is the driver's concern. On error the state is untouched.
    pub fn set_angles(&mut self, angle_1: f64, angle_2: f64) -> Result<(), Error> {
        if !angle_1.is_finite() || !angle_2.is_finite() {
            return Err(Error::NonFiniteAngle { angle_1, angle_2 });
        }
        let angles = JointAngles::from_degrees(angle_1, angle_2);
        self.state.position = self.geometry.angles_to_point(&angles);
        self.state.angle_1 = angle_1;
        self.state.angle_2 = angle_2;
        log::debug!(
            "angles set to ({angle_1}°, {angle_2}°), pen at ({:.2}, {:.2})",
            self.state.position.x,
            self.state.position.y,
        );
        Ok(())
    }

    /// Moves the pen to `(x, y)`, failing without moving if the point is
    /// out of reach.
    pub fn move_to(&mut self, x: f64, y: f64) -> Result<(), Error> {
        let (angle_1, angle_2) = self.xy_to_angles(x, y)?;
        self.set_angles(angle_1, angle_2)
    }

    /// Returns the arm to its parked configuration.
    pub fn park(&mut self) -> Result<(), Error> {
        let (angle_1, angle_2) = self.park_angles;
        self.set_angles(angle_1, angle_2)
    }

    /// Pulse-widths for the current joint angles, conversion strategy and
    /// hysteresis correction included. Pure read of the current state.
    pub fn get_pulse_widths(&self) -> PulseWidths {
        PulseWidths {
            shoulder: self.servos.shoulder.pulse_width(self.angle_1()),
            elbow: self.servos.elbow.pulse_width(self.angle_2()),
        }
    }

    /// Raises the pen, returning the pulse-width the driver should apply.
    pub fn pen_up(&mut self) -> f64 {
        self.state.pen_up = true;
        self.pen_up_pulse_width
    }

    /// Lowers the pen, returning the pulse-width the driver should apply.
    pub fn pen_down(&mut self) -> f64 {
        self.state.pen_up = false;
        self.pen_down_pulse_width
    }

    /// Shoulder angle, in degrees.
    pub fn angle_1(&self) -> f64 {
        self.state.angle_1
    }

    /// Elbow angle, in degrees.
    pub fn angle_2(&self) -> f64 {
        self.state.angle_2
    }

    pub fn angles(&self) -> JointAngles {
        JointAngles::from_degrees(self.state.angle_1, self.state.angle_2)
    }

    /// Pen position derived from the current angles.
    pub fn position(&self) -> Point {
        self.state.position
    }

    pub fn is_pen_up(&self) -> bool {
        self.state.pen_up
    }

    pub fn is_virtual(&self) -> bool {
        self.virtual_mode
    }

    pub fn geometry(&self) -> &Config {
        &self.geometry
    }

    pub fn shoulder(&self) -> &Servo {
        &self.servos.shoulder
    }

    pub fn elbow(&self) -> &Servo {
        &self.servos.elbow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panto_servo::CalibrationPoint;
    use proptest::prelude::*;

    fn calibrated_plotter() -> Plotter {
        let shoulder = CalibrationTable::new(vec![
            CalibrationPoint::new(-135.0, 2374, 2386),
            CalibrationPoint::new(-120.0, 2204, 2214),
            CalibrationPoint::new(-105.0, 2042, 2054),
            CalibrationPoint::new(-90.0, 1898, 1900),
            CalibrationPoint::new(-75.0, 1730, 1750),
            CalibrationPoint::new(-60.0, 1604, 1612),
            CalibrationPoint::new(-45.0, 1466, 1476),
            CalibrationPoint::new(-30.0, 1330, 1340),
            CalibrationPoint::new(-15.0, 1188, 1200),
            CalibrationPoint::new(0.0, 1048, 1060),
            CalibrationPoint::new(15.0, 904, 910),
            CalibrationPoint::new(30.0, 750, 766),
        ])
        .unwrap();
        let elbow = CalibrationTable::new(vec![
            CalibrationPoint::new(15.0, 783, 761),
            CalibrationPoint::new(30.0, 917, 901),
            CalibrationPoint::new(45.0, 1053, 1035),
            CalibrationPoint::new(60.0, 1183, 1167),
            CalibrationPoint::new(75.0, 1303, 1287),
            CalibrationPoint::new(90.0, 1427, 1417),
            CalibrationPoint::new(105.0, 1557, 1537),
            CalibrationPoint::new(120.0, 1697, 1681),
            CalibrationPoint::new(135.0, 1843, 1827),
            CalibrationPoint::new(150.0, 2003, 1987),
        ])
        .unwrap();
        PlotterBuilder::default()
            .with_shoulder_calibration(shoulder)
            .with_elbow_calibration(elbow)
            .with_pen_pulse_widths(1400.0, 1650.0)
            .with_virtual_mode(true)
            .build()
            .unwrap()
    }

    #[test]
    fn test_uncalibrated_defaults() {
        let plotter = PlotterBuilder::default().build().unwrap();
        assert_eq!((plotter.angle_1(), plotter.angle_2()), (-90.0, 90.0));
        assert_eq!(
            plotter.get_pulse_widths(),
            PulseWidths {
                shoulder: 1500.0,
                elbow: 1500.0,
            }
        );
        assert!(!plotter.shoulder().converter().is_interpolated());
        assert!(!plotter.elbow().converter().is_interpolated());
        assert_eq!(plotter.shoulder().hysteresis_correction(), 0.0);
        assert_eq!(plotter.elbow().hysteresis_correction(), 0.0);
        let p = plotter.position();
        assert!((p.x - -8.0).abs() < 1e-9);
        assert!((p.y - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_calibrated_defaults() {
        let plotter = calibrated_plotter();
        assert!(plotter.shoulder().converter().is_interpolated());
        assert!(plotter.elbow().converter().is_interpolated());
        assert_eq!((plotter.angle_1(), plotter.angle_2()), (-90.0, 90.0));

        // Parked pulse-widths are the table averages at the park angles plus
        // each servo's hysteresis correction, nothing like the naive 1500s.
        let pws = plotter.get_pulse_widths();
        assert!((pws.shoulder - (1899.0 + 65.0 / 12.0)).abs() < 1e-9);
        assert!((pws.elbow - (1422.0 - 8.3)).abs() < 1e-9);
    }

    #[test]
    fn test_set_angles_is_idempotent() {
        let mut plotter = calibrated_plotter();
        plotter.set_angles(-30.0, 45.0).unwrap();
        let first = plotter.get_pulse_widths();
        plotter.set_angles(-30.0, 45.0).unwrap();
        assert_eq!(plotter.get_pulse_widths(), first);
    }

    #[test]
    fn test_can_land_at_zero_degrees() {
        let mut plotter = PlotterBuilder::default().build().unwrap();
        plotter.set_angles(0.0, 0.0).unwrap();
        assert_eq!((plotter.angle_1(), plotter.angle_2()), (0.0, 0.0));
    }

    #[test]
    fn test_unreachable_move_leaves_state_alone() {
        let mut plotter = PlotterBuilder::default()
            .with_inner_arm(8.2.cm())
            .with_outer_arm(8.85.cm())
            .build()
            .unwrap();
        let before = plotter.get_pulse_widths();
        let err = plotter.move_to(-10.2, 13.85).unwrap_err();
        assert!(matches!(err, Error::Unreachable(_)));
        assert_eq!((plotter.angle_1(), plotter.angle_2()), (-90.0, 90.0));
        assert_eq!(plotter.get_pulse_widths(), before);
    }

    #[test]
    fn test_non_finite_angles_are_refused() {
        let mut plotter = PlotterBuilder::default().build().unwrap();
        assert!(matches!(
            plotter.set_angles(f64::NAN, 0.0),
            Err(Error::NonFiniteAngle { .. })
        ));
        assert!(matches!(
            plotter.set_angles(0.0, f64::INFINITY),
            Err(Error::NonFiniteAngle { .. })
        ));
        assert_eq!((plotter.angle_1(), plotter.angle_2()), (-90.0, 90.0));
    }

    #[test]
    fn test_pen_pass_through() {
        let mut plotter = calibrated_plotter();
        assert!(plotter.is_pen_up());
        assert_eq!(plotter.pen_down(), 1650.0);
        assert!(!plotter.is_pen_up());
        assert_eq!(plotter.pen_up(), 1400.0);
        assert!(plotter.is_pen_up());
        assert!(plotter.is_virtual());
    }

    #[test]
    fn test_park_after_moving() {
        let mut plotter = PlotterBuilder::default().build().unwrap();
        plotter.set_angles(-10.0, 120.0).unwrap();
        plotter.park().unwrap();
        assert_eq!((plotter.angle_1(), plotter.angle_2()), (-90.0, 90.0));
        assert_eq!(
            plotter.get_pulse_widths(),
            PulseWidths {
                shoulder: 1500.0,
                elbow: 1500.0,
            }
        );
    }

    proptest! {
        // Moving to a point the forward map produced must land the pen back
        // on that point.
        #[test]
        fn test_move_to_round_trip(shoulder in -150.0..60.0f64, elbow in 10.0..170.0f64) {
            let mut plotter = PlotterBuilder::default().build().unwrap();
            let (x, y) = plotter.angles_to_xy(shoulder, elbow);
            plotter.move_to(x, y).unwrap();
            prop_assert!((plotter.position().x - x).abs() < 1e-6);
            prop_assert!((plotter.position().y - y).abs() < 1e-6);
        }

        // Repeating a move never changes the read-out.
        #[test]
        fn test_pulse_width_read_is_pure(angle_1 in -135.0..30.0f64, angle_2 in 15.0..150.0f64) {
            let mut plotter = calibrated_plotter();
            plotter.set_angles(angle_1, angle_2).unwrap();
            let first = plotter.get_pulse_widths();
            prop_assert_eq!(plotter.get_pulse_widths(), first);
            plotter.set_angles(angle_1, angle_2).unwrap();
            prop_assert_eq!(plotter.get_pulse_widths(), first);
        }
    }
}
