//! Integration tests for complete simulation flows
//!
//! Real Lua programs run against a recording surface under tokio's paused
//! clock, so timing is exact and repeatable.

use std::f64::consts::TAU;
use std::time::Duration;

use robosim::events::SimEventKind;
use robosim::kinematics::{MotorCommand, Pose};
use robosim::scheduler::{RunOutcome, SchedulerState};
use tokio::task::LocalSet;
use tokio::time;

#[path = "../test_utils/mod.rs"]
mod test_utils;

use test_utils::fixtures::{DRIVE_FOREVER, DRIVE_ONE_SECOND};
use test_utils::{assert_close, lua_simulator};

#[tokio::test(start_paused = true)]
async fn test_one_second_drive_moves_three_units() {
    LocalSet::new()
        .run_until(async {
            let (mut sim, surface) = lua_simulator();
            assert_eq!(sim.pose(), Pose::new(250.0, 250.0, 0.0));
            assert_eq!(sim.frame_rate(), 15);

            let run = sim.load_and_run(DRIVE_ONE_SECOND).unwrap().unwrap();
            assert!(run.outcome().await.is_finished());

            let pose = sim.pose();
            assert_close(pose.x, 250.0);
            assert_close(pose.y, 253.0);
            assert_close(pose.heading, 0.0);
            assert_close(pose.distance_to(&Pose::new(250.0, 250.0, 0.0)), 3.0);

            // the display shows the same pose
            assert_eq!(sim.displayed_pose(), pose);
            let shape = surface.shapes()[0].clone();
            assert_close(shape.transform.dx, 250.0);
            assert_close(shape.transform.dy, 253.0);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_rate_change_keeps_pose_and_applies_next_tick() {
    LocalSet::new()
        .run_until(async {
            let (mut sim, _) = lua_simulator();
            let mut events = sim.subscribe();
            let _run = sim
                .load_and_run("function main()\n  setspeed(10, 10)\n  yield 2\nend\n")
                .unwrap();

            // seven ticks of 0.2 at 15 Hz
            time::sleep(Duration::from_millis(510)).await;
            let before = sim.pose();
            assert_close(before.y, 251.4);

            assert_eq!(sim.change_rate(15), 30);
            assert_eq!(sim.pose(), before);

            // one 30 Hz tick of 0.1 lands within 1/30 s
            time::sleep(Duration::from_millis(40)).await;
            assert_close(sim.pose().y, 251.5);
            assert_close(sim.pose().x, before.x);

            let changed: Vec<u32> = events
                .drain()
                .into_iter()
                .filter_map(|e| match e.kind {
                    SimEventKind::RateChanged { rate_hz } => Some(rate_hz),
                    _ => None,
                })
                .collect();
            assert_eq!(changed, vec![30]);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_rate_is_clamped() {
    LocalSet::new()
        .run_until(async {
            let (mut sim, _) = lua_simulator();
            assert_eq!(sim.change_rate(-100), 1);
            assert_eq!(sim.change_rate(1000), 120);
            assert_eq!(sim.set_rate(60).unwrap(), 60);
            assert_eq!(sim.frame_rate(), 60);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_leaves_last_pose_displayed() {
    LocalSet::new()
        .run_until(async {
            let (mut sim, surface) = lua_simulator();
            let mut events = sim.subscribe();
            let run = sim.load_and_run(DRIVE_FOREVER).unwrap().unwrap();

            time::sleep(Duration::from_millis(700)).await;
            sim.stop();
            let stopped = sim.pose();
            let updates = surface.transform_updates();
            assert!(matches!(run.outcome().await, RunOutcome::Cancelled));

            time::sleep(Duration::from_secs(5)).await;
            assert_eq!(sim.pose(), stopped);
            assert_eq!(sim.displayed_pose(), stopped);
            assert_eq!(surface.transform_updates(), updates);
            assert_eq!(sim.motors(), MotorCommand::new(10.0, 10.0));

            // three highlights: t=0, 0.3, 0.6 and nothing after the stop
            let lines: Vec<usize> = events
                .drain()
                .into_iter()
                .filter_map(|e| match e.kind {
                    SimEventKind::LineReached { line, .. } => Some(line),
                    _ => None,
                })
                .collect();
            assert_eq!(lines, vec![4, 4, 4]);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_idempotent() {
    LocalSet::new()
        .run_until(async {
            let (mut sim, _) = lua_simulator();
            sim.stop();
            let _run = sim.load_and_run(DRIVE_FOREVER).unwrap();
            sim.stop();
            sim.stop();
            assert!(!sim.is_animating());
            assert_eq!(sim.scheduler_state(), SchedulerState::Idle);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_reset_returns_home_and_clears_display() {
    LocalSet::new()
        .run_until(async {
            let (mut sim, surface) = lua_simulator();
            let run = sim
                .load_and_run("function main()\n  setspeed(20, 5)\n  yield 3\nend\n")
                .unwrap()
                .unwrap();
            time::sleep(Duration::from_secs(1)).await;
            assert_ne!(sim.pose(), Pose::new(250.0, 250.0, 0.0));

            let clears = surface.clear_count();
            sim.reset();
            assert!(matches!(run.outcome().await, RunOutcome::Cancelled));
            assert_eq!(sim.pose(), Pose::new(250.0, 250.0, 0.0));
            assert!(sim.motors().is_stopped());
            assert_eq!(surface.clear_count(), clears + 1);
            assert_eq!(surface.shapes().len(), 1);

            time::sleep(Duration::from_secs(5)).await;
            assert_eq!(sim.pose(), Pose::new(250.0, 250.0, 0.0));
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_new_run_starts_from_previous_pose() {
    LocalSet::new()
        .run_until(async {
            let (mut sim, _) = lua_simulator();
            let first = sim.load_and_run(DRIVE_ONE_SECOND).unwrap().unwrap();
            assert!(first.outcome().await.is_finished());
            let first_session = sim.session_id();

            let second = sim.load_and_run(DRIVE_ONE_SECOND).unwrap().unwrap();
            assert_ne!(sim.session_id(), first_session);
            assert!(sim.motors().is_stopped());
            assert!(second.outcome().await.is_finished());
            assert_close(sim.pose().y, 256.0);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_replacing_a_run_cancels_the_old_one() {
    LocalSet::new()
        .run_until(async {
            let (mut sim, _) = lua_simulator();
            let mut events = sim.subscribe();
            let old = sim.load_and_run(DRIVE_FOREVER).unwrap().unwrap();
            time::sleep(Duration::from_millis(200)).await;

            let new = sim
                .load_and_run("function main()\n  setspeed(-10, -10)\n  yield 0.5\nend\n")
                .unwrap()
                .unwrap();
            assert!(matches!(old.outcome().await, RunOutcome::Cancelled));
            assert!(new.outcome().await.is_finished());

            let events = events.drain();
            let new_id = sim.session_id().unwrap();
            let after_switch = events
                .iter()
                .skip_while(|e| e.kind != SimEventKind::SessionStopped)
                .filter(|e| matches!(e.kind, SimEventKind::LineReached { .. }))
                .collect::<Vec<_>>();
            assert!(after_switch.iter().all(|e| e.session == new_id));
            assert_eq!(after_switch.len(), 1);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_turning_program_heading_stays_normalized() {
    LocalSet::new()
        .run_until(async {
            let (mut sim, _) = lua_simulator();
            let program = "\
function main()
  for i = 1, 4 do
    setspeed(0, 200)
    yield 0.5
    setspeed(200, 0)
    yield 0.25
  end
end
";
            let run = sim.load_and_run(program).unwrap().unwrap();
            assert!(run.outcome().await.is_finished());
            let heading = sim.pose().heading;
            assert!((0.0..TAU).contains(&heading));
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_empty_program_starts_nothing() {
    LocalSet::new()
        .run_until(async {
            let (mut sim, _) = lua_simulator();
            assert!(sim.load_and_run("   \n\n").unwrap().is_none());
            assert_eq!(sim.session_id(), None);
            assert_eq!(sim.scheduler_state(), SchedulerState::Idle);
            assert!(!sim.is_animating());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_program_state_survives_between_steps() {
    LocalSet::new()
        .run_until(async {
            let (mut sim, _) = lua_simulator();
            let mut events = sim.subscribe();
            let program = "\
local speeds = {5, 10, 15}
function main()
  for _, s in ipairs(speeds) do
    setspeed(s, s)
    yield s / 10
  end
  print('done')
end
";
            let run = sim.load_and_run(program).unwrap().unwrap();
            assert!(run.outcome().await.is_finished());

            let pauses: Vec<f64> = events
                .drain()
                .into_iter()
                .filter_map(|e| match e.kind {
                    SimEventKind::LineReached { pause_seconds, .. } => Some(pause_seconds),
                    _ => None,
                })
                .collect();
            assert_eq!(pauses, vec![0.5, 1.0, 1.5]);
            assert_eq!(sim.motors(), MotorCommand::new(15.0, 15.0));
        })
        .await;
}
