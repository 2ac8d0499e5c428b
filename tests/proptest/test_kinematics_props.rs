//! Property-based tests for the kinematic model

use std::f64::consts::TAU;

use proptest::prelude::*;
use robosim::kinematics::{next_pose, normalize_heading, DriveConstants, MotorCommand, Pose};

fn coordinate() -> impl Strategy<Value = f64> {
    -1.0e4..1.0e4
}

fn speed() -> impl Strategy<Value = f64> {
    -500.0..500.0
}

proptest! {
    #[test]
    fn test_stopped_motors_leave_pose_unchanged(
        x in coordinate(),
        y in coordinate(),
        heading in 0.0..TAU,
        dt in 0.0001f64..2.0,
    ) {
        let pose = Pose { x, y, heading };
        let next = next_pose(pose, MotorCommand::default(), dt, &DriveConstants::default());
        prop_assert_eq!(next, pose);
    }

    #[test]
    fn test_heading_stays_in_range(
        heading in -100.0f64..100.0,
        left in speed(),
        right in speed(),
        dt in 0.0001f64..2.0,
    ) {
        let pose = Pose::new(0.0, 0.0, heading);
        prop_assert!((0.0..TAU).contains(&pose.heading));

        let next = next_pose(pose, MotorCommand::new(left, right), dt, &DriveConstants::default());
        prop_assert!((0.0..TAU).contains(&next.heading));
    }

    #[test]
    fn test_displacement_matches_mean_speed(
        x in coordinate(),
        y in coordinate(),
        heading in 0.0..TAU,
        left in speed(),
        right in speed(),
        dt in 0.0001f64..2.0,
    ) {
        let constants = DriveConstants::default();
        let pose = Pose { x, y, heading };
        let next = next_pose(pose, MotorCommand::new(left, right), dt, &constants);

        let expected = ((left + right) * dt * constants.translation / 2.0).abs();
        prop_assert!((pose.distance_to(&next) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_equal_speeds_keep_heading(
        heading in 0.0..TAU,
        speed in speed(),
        dt in 0.0001f64..2.0,
    ) {
        let pose = Pose { x: 0.0, y: 0.0, heading };
        let next = next_pose(pose, MotorCommand::new(speed, speed), dt, &DriveConstants::default());
        prop_assert_eq!(next.heading, heading);
    }

    #[test]
    fn test_normalize_is_idempotent(angle in -1.0e6f64..1.0e6) {
        let once = normalize_heading(angle);
        prop_assert!((0.0..TAU).contains(&once));
        prop_assert_eq!(normalize_heading(once), once);
    }
}
