//! Basic geometry of a two-link plotter arm, including conversion between
//! Cartesian pen positions and joint angles.
//!
//! The arm pivots around a fixed "shoulder" at the origin. The inner arm
//! runs from the shoulder to the "elbow," and the outer arm from the elbow
//! to the pen. Bearings are measured from the +y axis, increasing towards
//! +x; the shoulder angle is the bearing of the inner arm, and the elbow
//! angle is the rotation of the outer arm relative to the inner arm's
//! direction.
//!
//! This crate supports `no_std` and uses `libm` to allow for running in
//! embedded contexts.

#![cfg_attr(not(feature = "std"), no_std)]

use core::f64::consts::PI;
use libm::{acos, atan2, cos, fabs, sin, sqrt};

pub type Angle = euclid::Angle<f64>;
pub type Point = euclid::Point2D<f64, Cm>;

pub struct Cm;

pub type Len = euclid::Length<f64, Cm>;

fn square<T: core::ops::Mul<T> + Copy>(x: T) -> <T as core::ops::Mul<T>>::Output {
    x * x
}

fn clamp_unit(x: f64) -> f64 {
    x.clamp(-1.0, 1.0)
}

pub trait LenExt {
    fn cm(self) -> Len;
}

impl LenExt for f64 {
    fn cm(self) -> Len {
        Len::new(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ShoulderElbow<T> {
    pub shoulder: T,
    pub elbow: T,
}

/// Angles of the two joints.
///
/// The shoulder angle is the inner arm's bearing from the +y axis,
/// increasing towards +x. The elbow angle is measured relative to the inner
/// arm's direction, with zero meaning the arm is fully extended.
pub type JointAngles = ShoulderElbow<Angle>;

impl JointAngles {
    pub fn from_degrees(shoulder: f64, elbow: f64) -> Self {
        JointAngles {
            shoulder: Angle::degrees(shoulder),
            elbow: Angle::degrees(elbow),
        }
    }
}

/// The requested pen position lies outside the annulus the arm can sweep.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error(
    "point at distance {distance} cm is outside the reachable annulus [{min_reach} cm, {max_reach} cm]"
)]
pub struct ReachabilityError {
    /// Distance from the shoulder pivot to the requested point.
    pub distance: f64,
    /// Closest the pen can come to the shoulder pivot, `|inner - outer|`.
    pub min_reach: f64,
    /// Furthest the pen can go from the shoulder pivot, `inner + outer`.
    pub max_reach: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum GeomError {
    #[error("arm length must be strictly positive, got {length} cm")]
    BadArmLength { length: f64 },
}

pub struct ConfigBuilder {
    inner_arm: Len,
    outer_arm: Len,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self {
            inner_arm: 8.0.cm(),
            outer_arm: 8.0.cm(),
        }
    }
}

impl ConfigBuilder {
    pub fn build(&self) -> Result<Config, GeomError> {
        for arm in [self.inner_arm, self.outer_arm] {
            if !(arm.get() > 0.0) || !arm.get().is_finite() {
                return Err(GeomError::BadArmLength { length: arm.get() });
            }
        }
        Ok(Config {
            inner_arm: self.inner_arm,
            outer_arm: self.outer_arm,
        })
    }

    pub fn with_inner_arm(&mut self, inner_arm: Len) -> &mut Self {
        self.inner_arm = inner_arm;
        self
    }

    pub fn with_outer_arm(&mut self, outer_arm: Len) -> &mut Self {
        self.outer_arm = outer_arm;
        self
    }
}

/// The geometric configuration of a plotter arm.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct Config {
    /// Length of the arm from the shoulder pivot to the elbow, in
    /// centimeters.
    pub inner_arm: Len,
    /// Length of the arm from the elbow to the pen, in centimeters.
    pub outer_arm: Len,
}

impl Config {
    /// Closest the pen can come to the shoulder pivot.
    pub fn min_reach(&self) -> Len {
        fabs(self.inner_arm.get() - self.outer_arm.get()).cm()
    }

    /// Furthest the pen can go from the shoulder pivot.
    pub fn max_reach(&self) -> Len {
        self.inner_arm + self.outer_arm
    }

    /// Joint angles that put the pen at `p` (inverse kinematics).
    ///
    /// Two mirror configurations reach any interior point; we always return
    /// the one with the elbow angle in `[0°, 180°]`, i.e. with the outer arm
    /// deflected towards increasing bearing. The exact shoulder pivot is
    /// rejected even when the arm lengths are equal, since the bearing is
    /// undefined there.
    pub fn point_to_angles(&self, p: &Point) -> Result<JointAngles, ReachabilityError> {
        let l1 = self.inner_arm.get();
        let l2 = self.outer_arm.get();
        let d = sqrt(square(p.x) + square(p.y));
        let min_reach = self.min_reach().get();
        let max_reach = self.max_reach().get();
        if d == 0.0 || d < min_reach || d > max_reach {
            return Err(ReachabilityError {
                distance: d,
                min_reach,
                max_reach,
            });
        }

        let bearing = atan2(p.x, p.y);
        // Interior angles of the triangle (shoulder, elbow, pen), by the law
        // of cosines. The annulus check keeps the arguments within [-1, 1];
        // clamp away the rounding slop at the boundaries.
        let at_shoulder = acos(clamp_unit(
            (square(d) + square(l1) - square(l2)) / (2.0 * d * l1),
        ));
        let at_elbow = acos(clamp_unit(
            (square(l1) + square(l2) - square(d)) / (2.0 * l1 * l2),
        ));

        Ok(JointAngles {
            shoulder: Angle::radians(bearing - at_shoulder),
            elbow: Angle::radians(PI - at_elbow),
        })
    }

    /// Pen position for the given joint angles (forward kinematics).
    ///
    /// This is a total function: any finite angle pair composes the two link
    /// vectors, whether or not the pose is mechanically sensible.
    pub fn angles_to_point(&self, angles: &JointAngles) -> Point {
        let s = angles.shoulder.get();
        let e = angles.elbow.get();
        let l1 = self.inner_arm.get();
        let l2 = self.outer_arm.get();
        Point::new(
            l1 * sin(s) + l2 * sin(s + e),
            l1 * cos(s) + l2 * cos(s + e),
        )
    }
}
