//! Unit tests for the differential-drive kinematic model

use robosim::kinematics::{next_pose, normalize_heading, DriveConstants, MotorCommand, Pose};
use std::f64::consts::{FRAC_PI_2, PI, TAU};

#[path = "../test_utils/mod.rs"]
mod test_utils;

use test_utils::assert_close;

/// Integrate `ticks` frames at `rate` Hz
fn drive(mut pose: Pose, motors: MotorCommand, rate: u32, ticks: u32) -> Pose {
    let dt = 1.0 / f64::from(rate);
    let constants = DriveConstants::default();
    for _ in 0..ticks {
        pose = next_pose(pose, motors, dt, &constants);
    }
    pose
}

#[cfg(test)]
mod kinematics_tests {
    use super::*;

    #[test]
    fn test_one_second_straight_at_fifteen_hz() {
        let end = drive(
            Pose::new(250.0, 250.0, 0.0),
            MotorCommand::new(10.0, 10.0),
            15,
            15,
        );
        assert_close(end.x, 250.0);
        assert_close(end.y, 253.0);
        assert_close(end.heading, 0.0);
    }

    #[test]
    fn test_displacement_is_rate_independent_when_straight() {
        let start = Pose::new(0.0, 0.0, FRAC_PI_2);
        let motors = MotorCommand::new(4.0, 4.0);
        let slow = drive(start, motors, 5, 10);
        let fast = drive(start, motors, 60, 120);
        assert_close(slow.x, fast.x);
        assert_close(slow.y, fast.y);
        // heading π/2 drives towards negative x
        assert_close(slow.x, -2.4);
    }

    #[test]
    fn test_left_faster_turns_heading_up() {
        let end = drive(Pose::default(), MotorCommand::new(10.0, 0.0), 10, 1);
        assert_close(end.heading, 10.0 * 0.1 / 180.0);
    }

    #[test]
    fn test_right_faster_wraps_below_zero() {
        let end = drive(Pose::default(), MotorCommand::new(0.0, 10.0), 10, 1);
        assert!(end.heading > PI);
        assert_close(end.heading, TAU - 10.0 * 0.1 / 180.0);
    }

    #[test]
    fn test_spin_in_place_keeps_position() {
        let start = Pose::new(100.0, 100.0, 0.0);
        let end = drive(start, MotorCommand::new(30.0, -30.0), 30, 300);
        assert_close(end.x, 100.0);
        assert_close(end.y, 100.0);
        assert!((0.0..TAU).contains(&end.heading));
    }

    #[test]
    fn test_translation_uses_heading_before_rotation() {
        let constants = DriveConstants::default();
        let pose = Pose::new(0.0, 0.0, 1.0);
        let motors = MotorCommand::new(20.0, 10.0);
        let next = next_pose(pose, motors, 0.5, &constants);

        let d = 30.0 * 0.5 * constants.translation / 2.0;
        assert_close(next.x, -d * 1.0_f64.sin());
        assert_close(next.y, d * 1.0_f64.cos());
        assert_close(next.heading, 1.0 + 10.0 * 0.5 * constants.rotation);
    }

    #[test]
    fn test_custom_constants() {
        let constants = DriveConstants {
            rotation: 0.0,
            translation: 1.0,
        };
        let next = next_pose(
            Pose::default(),
            MotorCommand::new(3.0, 1.0),
            1.0,
            &constants,
        );
        assert_close(next.heading, 0.0);
        assert_close(next.y, 2.0);
    }

    #[test]
    fn test_normalize_heading_edges() {
        assert_eq!(normalize_heading(0.0), 0.0);
        assert_eq!(normalize_heading(TAU), 0.0);
        assert_close(normalize_heading(-FRAC_PI_2), 3.0 * FRAC_PI_2);
        assert_close(normalize_heading(5.0 * TAU + 1.0), 1.0);
        assert!(normalize_heading(-1e-300) < TAU);
    }
}
