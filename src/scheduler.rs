//! Program Scheduler
//!
//! Drives a [`StepFunction`] through its suspend points. Each step runs to
//! completion on the local task before the next resumption is scheduled, so
//! user code never overlaps with itself or with a frame tick.

use std::cell::Cell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time;

use crate::error::Error;
use crate::program::{StepFunction, StepOutcome, StepResult};

/// Lifecycle of a loaded program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerState {
    /// No program loaded
    Idle,
    /// A step is scheduled or executing
    Running,
    /// Waiting for a resumption timer
    Suspended,
    /// The program returned
    Finished,
    /// Instantiation or a step raised
    Failed,
}

impl SchedulerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SchedulerState::Finished | SchedulerState::Failed)
    }
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SchedulerState::Idle => "idle",
            SchedulerState::Running => "running",
            SchedulerState::Suspended => "suspended",
            SchedulerState::Finished => "finished",
            SchedulerState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// How a run ended
#[derive(Debug)]
pub enum RunOutcome {
    Finished,
    Failed(Error),
    /// Torn down by stop, reset or a newer run
    Cancelled,
}

impl RunOutcome {
    pub fn is_finished(&self) -> bool {
        matches!(self, RunOutcome::Finished)
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Finished => write!(f, "finished"),
            RunOutcome::Failed(e) => write!(f, "failed: {}", e),
            RunOutcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Completion handle for a loaded program
#[derive(Debug)]
pub struct RunHandle {
    receiver: oneshot::Receiver<RunOutcome>,
}

impl RunHandle {
    /// Wait until the run finishes, fails or is cancelled
    pub async fn outcome(self) -> RunOutcome {
        self.receiver.await.unwrap_or(RunOutcome::Cancelled)
    }
}

/// Receives step notifications from a running program
pub trait StepObserver {
    /// The program suspended at `result.line_number`
    fn on_step(&self, result: &StepResult);

    /// The program finished or failed; not called on cancellation
    fn on_complete(&self, outcome: &RunOutcome);

    /// Whether resumptions scheduled for this observer may still run
    fn is_live(&self) -> bool {
        true
    }
}

/// Runs one program at a time on the local task set
pub struct ProgramScheduler {
    state: Rc<Cell<SchedulerState>>,
    task: Option<JoinHandle<()>>,
}

impl ProgramScheduler {
    pub fn new() -> Self {
        Self {
            state: Rc::new(Cell::new(SchedulerState::Idle)),
            task: None,
        }
    }

    /// Start driving `step`; the first step runs after this returns.
    ///
    /// Any program already loaded is cancelled first. Must be called from
    /// inside a [`tokio::task::LocalSet`].
    pub fn load(&mut self, step: Box<dyn StepFunction>, observer: Weak<dyn StepObserver>) -> RunHandle {
        self.cancel();

        let (sender, receiver) = oneshot::channel();
        self.state.set(SchedulerState::Running);
        self.task = Some(tokio::task::spawn_local(drive(
            step,
            observer,
            Rc::clone(&self.state),
            sender,
        )));
        RunHandle { receiver }
    }

    /// Cancel the pending resumption, if any
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            if !self.state.get().is_terminal() {
                debug!("Program cancelled while {}", self.state.get());
                self.state.set(SchedulerState::Idle);
            }
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state.get()
    }
}

impl Default for ProgramScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ProgramScheduler {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl fmt::Debug for ProgramScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgramScheduler")
            .field("state", &self.state.get())
            .field("loaded", &self.task.is_some())
            .finish()
    }
}

fn live_observer(observer: &Weak<dyn StepObserver>) -> Option<Rc<dyn StepObserver>> {
    observer.upgrade().filter(|o| o.is_live())
}

async fn drive(
    mut step: Box<dyn StepFunction>,
    observer: Weak<dyn StepObserver>,
    state: Rc<Cell<SchedulerState>>,
    done: oneshot::Sender<RunOutcome>,
) {
    loop {
        if live_observer(&observer).is_none() {
            debug!("Dropping resumption for a stale session");
            state.set(SchedulerState::Idle);
            return;
        }

        state.set(SchedulerState::Running);
        let outcome = match step.resume() {
            StepOutcome::Yielded(result) => {
                state.set(SchedulerState::Suspended);
                trace!(
                    "Suspended at line {} for {}s",
                    result.line_number,
                    result.duration_seconds
                );
                if let Some(observer) = live_observer(&observer) {
                    observer.on_step(&result);
                }
                pause(result.duration_seconds).await;
                continue;
            }
            StepOutcome::Finished => {
                state.set(SchedulerState::Finished);
                info!("Program finished");
                RunOutcome::Finished
            }
            StepOutcome::Failed(e) => {
                state.set(SchedulerState::Failed);
                warn!("Program failed: {}", e);
                RunOutcome::Failed(e)
            }
        };

        if let Some(observer) = live_observer(&observer) {
            observer.on_complete(&outcome);
        }
        // the handle may have been dropped
        let _ = done.send(outcome);
        return;
    }
}

/// Sleep for a user-declared pause; never resumes synchronously
async fn pause(seconds: f64) {
    if seconds.is_nan() || seconds <= 0.0 {
        tokio::task::yield_now().await;
        return;
    }
    let duration = Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX);
    time::sleep(duration).await;
}
