//! Kinematic Model
//!
//! Simplified two-wheel differential-drive approximation. A pose is advanced
//! from a pair of signed motor speeds over an elapsed time step. The model
//! is first-order: translation uses the heading from *before* this step's
//! rotation, so the order of the two updates is part of the trajectory.

use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Default rotation sensitivity (radians per unit of speed difference per second)
pub const DEFAULT_ROTATION_CONSTANT: f64 = 1.0 / 180.0;

/// Default translation sensitivity (units per unit of mean speed per second)
pub const DEFAULT_TRANSLATION_CONSTANT: f64 = 0.3;

/// Position and heading of the simulated vehicle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Horizontal position in display units
    pub x: f64,
    /// Vertical position in display units
    pub y: f64,
    /// Heading in radians, within `[0, 2π)`
    pub heading: f64,
}

impl Pose {
    /// Create a pose, normalizing the heading into `[0, 2π)`
    pub fn new(x: f64, y: f64, heading: f64) -> Self {
        Self {
            x,
            y,
            heading: normalize_heading(heading),
        }
    }

    /// Straight-line distance to another pose
    pub fn distance_to(&self, other: &Pose) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

/// Signed speeds for the left and right motors
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MotorCommand {
    pub left: f64,
    pub right: f64,
}

impl MotorCommand {
    pub fn new(left: f64, right: f64) -> Self {
        Self { left, right }
    }

    /// Both motors stopped
    pub fn is_stopped(&self) -> bool {
        self.left == 0.0 && self.right == 0.0
    }
}

/// Sensitivity constants of the drive model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriveConstants {
    /// Rotation sensitivity (`K_rot`)
    pub rotation: f64,
    /// Translation sensitivity (`K_trans`)
    pub translation: f64,
}

impl Default for DriveConstants {
    fn default() -> Self {
        Self {
            rotation: DEFAULT_ROTATION_CONSTANT,
            translation: DEFAULT_TRANSLATION_CONSTANT,
        }
    }
}

/// Normalize an angle into `[0, 2π)` using a true (never negative) modulo
pub fn normalize_heading(heading: f64) -> f64 {
    let wrapped = heading.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

/// Advance `pose` by `dt` seconds under the given motor speeds.
///
/// `dt` is expected to be positive; callers drive this from a fixed tick
/// interval. There are no error conditions.
pub fn next_pose(pose: Pose, motors: MotorCommand, dt: f64, constants: &DriveConstants) -> Pose {
    let heading = normalize_heading(
        pose.heading + (motors.left - motors.right) * dt * constants.rotation,
    );

    let distance = (motors.left + motors.right) * dt * constants.translation / 2.0;
    let x = pose.x - distance * pose.heading.sin();
    let y = pose.y + distance * pose.heading.cos();

    Pose { x, y, heading }
}
