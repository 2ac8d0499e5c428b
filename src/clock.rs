//! Frame Clock
//!
//! Fixed-rate repeating timer driving the render/physics loop. Each tick is
//! delivered to a [`FrameSink`], which advances the pose and redraws.
//!
//! Tick `n` of a run is due at `anchor + n * period`, so late wake-ups catch
//! up instead of drifting. The clock must be started from inside a
//! [`tokio::task::LocalSet`].

use std::cell::Cell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

/// Receiver of frame ticks
pub trait FrameSink {
    /// Advance the simulation by `dt` seconds
    fn on_tick(&self, dt: f64);

    /// Restore initial pose, motors and display
    fn on_reset(&self);

    /// Whether ticks should still be delivered
    fn is_live(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy)]
struct TickSchedule {
    anchor: Instant,
    rate_hz: u32,
    ticks: u64,
}

impl TickSchedule {
    fn new(anchor: Instant, rate_hz: u32) -> Self {
        Self {
            anchor,
            rate_hz,
            ticks: 0,
        }
    }

    fn period_nanos(&self) -> u64 {
        1_000_000_000 / u64::from(self.rate_hz.max(1))
    }

    fn dt(&self) -> f64 {
        1.0 / f64::from(self.rate_hz.max(1))
    }

    fn next_deadline(&self) -> Instant {
        let offset = self.period_nanos().saturating_mul(self.ticks + 1);
        self.anchor + Duration::from_nanos(offset)
    }

    /// Number of ticks whose deadline is at or before `now`
    fn due_at(&self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.anchor).as_nanos();
        (elapsed / u128::from(self.period_nanos())) as u64
    }
}

/// Repeating frame timer
pub struct FrameClock {
    rate_hz: u32,
    sink: Weak<dyn FrameSink>,
    schedule: Rc<Cell<TickSchedule>>,
    delivered: Rc<Cell<u64>>,
    task: Option<JoinHandle<()>>,
}

impl FrameClock {
    pub fn new(sink: Weak<dyn FrameSink>, rate_hz: u32) -> Self {
        Self {
            rate_hz,
            sink,
            schedule: Rc::new(Cell::new(TickSchedule::new(Instant::now(), rate_hz))),
            delivered: Rc::new(Cell::new(0)),
            task: None,
        }
    }

    /// Begin ticking every `1000 / rate_hz` ms; the first tick is one period away
    pub fn start(&mut self, rate_hz: u32) {
        self.stop();
        self.rate_hz = rate_hz;
        self.spawn();
        debug!("Frame clock started at {} Hz", rate_hz);
    }

    /// Change the rate; a running clock re-arms at the new interval from now.
    ///
    /// Pose is untouched: ticks already due at the old rate are applied first.
    pub fn set_rate(&mut self, rate_hz: u32) {
        self.rate_hz = rate_hz;
        if let Some(task) = self.task.take() {
            self.flush_due_ticks();
            task.abort();
            self.spawn();
            debug!("Frame clock re-armed at {} Hz", rate_hz);
        }
    }

    /// Cancel the repeating timer; safe to call when already stopped
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            self.flush_due_ticks();
            task.abort();
            debug!("Frame clock stopped after {} ticks", self.delivered.get());
        }
    }

    /// Stop and restore the sink's initial state
    pub fn reset(&mut self) {
        self.stop();
        if let Some(sink) = self.sink.upgrade() {
            sink.on_reset();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    pub fn rate_hz(&self) -> u32 {
        self.rate_hz
    }

    /// Ticks delivered over this clock's lifetime
    pub fn ticks_delivered(&self) -> u64 {
        self.delivered.get()
    }

    fn spawn(&mut self) {
        self.schedule
            .set(TickSchedule::new(Instant::now(), self.rate_hz));
        let task = tokio::task::spawn_local(run_ticks(
            self.sink.clone(),
            Rc::clone(&self.schedule),
            Rc::clone(&self.delivered),
        ));
        self.task = Some(task);
    }

    // A tick whose timer fired in the same instant as a stop has not been
    // polled yet; apply it so the stopped pose matches elapsed time.
    fn flush_due_ticks(&self) {
        let mut schedule = self.schedule.get();
        let due = schedule.due_at(Instant::now());
        while schedule.ticks < due {
            schedule.ticks += 1;
            self.schedule.set(schedule);
            if !deliver(&self.sink, schedule.dt(), &self.delivered) {
                break;
            }
        }
    }
}

impl Drop for FrameClock {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for FrameClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameClock")
            .field("rate_hz", &self.rate_hz)
            .field("running", &self.is_running())
            .field("delivered", &self.delivered.get())
            .finish()
    }
}

fn deliver(sink: &Weak<dyn FrameSink>, dt: f64, delivered: &Cell<u64>) -> bool {
    match sink.upgrade() {
        Some(sink) if sink.is_live() => {
            sink.on_tick(dt);
            delivered.set(delivered.get() + 1);
            true
        }
        _ => false,
    }
}

async fn run_ticks(
    sink: Weak<dyn FrameSink>,
    schedule: Rc<Cell<TickSchedule>>,
    delivered: Rc<Cell<u64>>,
) {
    loop {
        time::sleep_until(schedule.get().next_deadline()).await;
        let mut current = schedule.get();
        current.ticks += 1;
        schedule.set(current);
        if !deliver(&sink, current.dt(), &delivered) {
            trace!("Frame sink gone or stale, ending tick loop");
            break;
        }
    }
}
