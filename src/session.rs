//! Simulation sessions
//!
//! A [`Session`] is one run of one program: its pose, motor command, frame
//! clock and scheduler. The [`Simulator`] owns the current session and a
//! shared epoch counter; starting a new run advances the epoch, so every
//! timer, resumption and motor write belonging to an older session becomes
//! a no-op even if it was already queued.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::annotator::{Annotation, StepAnnotator};
use crate::clock::{FrameClock, FrameSink};
use crate::config::loader::validate_config;
use crate::config::SimConfig;
use crate::error::{Error, Result};
use crate::events::{SimEventBus, SimEventKind, SimEventSubscription};
use crate::kinematics::{next_pose, DriveConstants, MotorCommand, Pose};
use crate::program::{Compiler, LuaCompiler, StepFunction, StepResult};
use crate::render::{RenderBridge, Surface};
use crate::scheduler::{ProgramScheduler, RunHandle, RunOutcome, SchedulerState, StepObserver};

/// Write access to a session's motor command.
///
/// Handed to a program at instantiation; writes are dropped (and `set`
/// returns false) once the session is no longer live.
#[derive(Clone)]
pub struct MotorPort {
    write: Rc<dyn Fn(MotorCommand) -> bool>,
}

impl MotorPort {
    pub fn new(write: impl Fn(MotorCommand) -> bool + 'static) -> Self {
        Self {
            write: Rc::new(write),
        }
    }

    /// Store a motor command; false if it was ignored
    pub fn set(&self, command: MotorCommand) -> bool {
        (self.write)(command)
    }

    /// A port that always accepts, and the cell it writes to
    pub fn recording() -> (Self, Rc<Cell<MotorCommand>>) {
        let cell = Rc::new(Cell::new(MotorCommand::default()));
        let target = Rc::clone(&cell);
        let port = Self::new(move |command| {
            target.set(command);
            true
        });
        (port, cell)
    }
}

impl fmt::Debug for MotorPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MotorPort").finish_non_exhaustive()
    }
}

/// Shared pieces every session of a simulator uses
#[derive(Clone)]
struct SessionContext {
    live: Rc<Cell<u64>>,
    home: Pose,
    drive: DriveConstants,
    bridge: Rc<RefCell<RenderBridge>>,
    events: SimEventBus,
}

/// One run of one program
pub struct Session {
    id: u64,
    ctx: SessionContext,
    pose: Cell<Pose>,
    motors: Cell<MotorCommand>,
    halted: Cell<bool>,
    clock: RefCell<FrameClock>,
    scheduler: RefCell<ProgramScheduler>,
}

impl Session {
    fn new(id: u64, ctx: SessionContext, start: Pose, rate_hz: u32) -> Rc<Self> {
        Rc::new_cyclic(|me: &Weak<Session>| {
            let sink: Weak<dyn FrameSink> = me.clone();
            Session {
                id,
                ctx,
                pose: Cell::new(start),
                motors: Cell::new(MotorCommand::default()),
                halted: Cell::new(false),
                clock: RefCell::new(FrameClock::new(sink, rate_hz)),
                scheduler: RefCell::new(ProgramScheduler::new()),
            }
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether this is the simulator's current session and not stopped
    pub fn is_current(&self) -> bool {
        self.ctx.live.get() == self.id && !self.halted.get()
    }

    pub fn pose(&self) -> Pose {
        self.pose.get()
    }

    pub fn motors(&self) -> MotorCommand {
        self.motors.get()
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.borrow().state()
    }

    pub fn is_animating(&self) -> bool {
        self.clock.borrow().is_running()
    }

    fn motor_port(self: &Rc<Self>) -> MotorPort {
        let session = Rc::downgrade(self);
        MotorPort::new(move |command| match session.upgrade() {
            Some(session) if session.is_current() => {
                session.motors.set(command);
                true
            }
            _ => false,
        })
    }

    fn start(self: &Rc<Self>, step: Box<dyn StepFunction>) -> RunHandle {
        let observer: Weak<dyn StepObserver> = Rc::downgrade(self) as Weak<dyn StepObserver>;
        let rate = self.clock.borrow().rate_hz();
        info!("Session {} started at {} Hz", self.id, rate);
        self.ctx.events.publish(self.id, SimEventKind::SessionStarted);
        self.clock.borrow_mut().start(rate);
        self.scheduler.borrow_mut().load(step, observer)
    }

    fn set_rate(&self, rate_hz: u32) {
        self.clock.borrow_mut().set_rate(rate_hz);
    }

    /// Cancel both timers; the last pose stays displayed
    fn stop(&self) {
        if self.halted.get() {
            return;
        }
        self.scheduler.borrow_mut().cancel();
        self.clock.borrow_mut().stop();
        self.halted.set(true);
        debug!("Session {} stopped at {:?}", self.id, self.pose.get());
        self.ctx.events.publish(self.id, SimEventKind::SessionStopped);
    }

    fn reset(&self) {
        self.scheduler.borrow_mut().cancel();
        if !self.halted.replace(true) {
            self.ctx.events.publish(self.id, SimEventKind::SessionStopped);
        }
        self.clock.borrow_mut().reset();
    }
}

impl FrameSink for Session {
    fn on_tick(&self, dt: f64) {
        if !self.is_current() {
            return;
        }
        let pose = next_pose(self.pose.get(), self.motors.get(), dt, &self.ctx.drive);
        self.pose.set(pose);
        trace!("Session {} tick {:.4}s -> {:?}", self.id, dt, pose);
        if let Err(e) = self.ctx.bridge.borrow_mut().set_pose(pose) {
            warn!("Failed to draw pose: {}", e);
        }
    }

    fn on_reset(&self) {
        let home = self.ctx.home;
        self.pose.set(home);
        self.motors.set(MotorCommand::default());
        if let Err(e) = self.ctx.bridge.borrow_mut().reset(home) {
            warn!("Failed to redraw after reset: {}", e);
        }
        debug!("Session {} reset to {:?}", self.id, home);
        self.ctx.events.publish(self.id, SimEventKind::Reset);
    }

    fn is_live(&self) -> bool {
        self.is_current()
    }
}

impl StepObserver for Session {
    fn on_step(&self, result: &StepResult) {
        self.ctx.events.publish(
            self.id,
            SimEventKind::LineReached {
                line: result.line_number,
                pause_seconds: result.duration_seconds,
            },
        );
    }

    fn on_complete(&self, outcome: &RunOutcome) {
        self.clock.borrow_mut().stop();
        let kind = match outcome {
            RunOutcome::Failed(e) => SimEventKind::RunFailed {
                message: e.to_string(),
            },
            _ => SimEventKind::RunFinished,
        };
        self.ctx.events.publish(self.id, kind);
    }

    fn is_live(&self) -> bool {
        self.is_current()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("pose", &self.pose.get())
            .field("motors", &self.motors.get())
            .field("current", &self.is_current())
            .finish()
    }
}

/// The controller the surrounding UI talks to
pub struct Simulator {
    config: SimConfig,
    compiler: Box<dyn Compiler>,
    annotator: StepAnnotator,
    ctx: SessionContext,
    rate_hz: u32,
    next_id: u64,
    session: Option<Rc<Session>>,
}

impl Simulator {
    pub fn new(config: SimConfig, compiler: Box<dyn Compiler>, surface: Box<dyn Surface>) -> Result<Self> {
        let annotator = StepAnnotator::new(compiler.suspend_syntax())?;
        let rate_hz = config.check_rate(config.simulation.frame_rate_hz)?;
        validate_config(&config)?;
        let home = config.home_pose();

        let mut bridge = RenderBridge::from_config(surface, &config.display);
        bridge.reset(home)?;

        let ctx = SessionContext {
            live: Rc::new(Cell::new(0)),
            home,
            drive: config.simulation.drive_constants(),
            bridge: Rc::new(RefCell::new(bridge)),
            events: SimEventBus::default(),
        };

        Ok(Self {
            config,
            compiler,
            annotator,
            ctx,
            rate_hz,
            next_id: 0,
            session: None,
        })
    }

    /// Simulator running Lua control programs
    pub fn with_lua(config: SimConfig, surface: Box<dyn Surface>) -> Result<Self> {
        let compiler = LuaCompiler::from_config(&config.program);
        Self::new(config, Box::new(compiler), surface)
    }

    /// Rewrite suspend statements without running anything
    pub fn annotate(&self, source: &str) -> Annotation {
        self.annotator.annotate(source)
    }

    /// Annotate, compile and start `source`, replacing any current run.
    ///
    /// Returns `Ok(None)` if the compiler produced nothing. Compile and
    /// instantiation errors are returned here and start no session; step
    /// errors arrive through the [`RunHandle`] and the event bus.
    /// Must be called from inside a [`tokio::task::LocalSet`].
    pub fn load_and_run(&mut self, source: &str) -> Result<Option<RunHandle>> {
        self.stop();

        let annotation = self.annotator.annotate(source);
        debug!(
            "Annotated {} suspend statements",
            annotation.suspend_points.len()
        );

        let executable = match self.compiler.compile(&annotation.source) {
            Ok(Some(executable)) => executable,
            Ok(None) => {
                info!("Compiler produced no program, nothing to run");
                return Ok(None);
            }
            Err(e) => return Err(self.load_failed(e)),
        };

        self.next_id += 1;
        let session = Session::new(self.next_id, self.ctx.clone(), self.pose(), self.rate_hz);
        let step = match executable.instantiate(session.motor_port()) {
            Ok(step) => step,
            Err(e) => return Err(self.load_failed(e)),
        };

        self.ctx.live.set(session.id());
        self.session = Some(Rc::clone(&session));
        Ok(Some(session.start(step)))
    }

    /// Halt both timers; the last pose stays displayed
    pub fn stop(&mut self) {
        if let Some(session) = &self.session {
            session.stop();
        }
    }

    /// Stop and return the vehicle to its initial pose
    pub fn reset(&mut self) {
        match &self.session {
            Some(session) => session.reset(),
            None => {
                if let Err(e) = self.ctx.bridge.borrow_mut().reset(self.ctx.home) {
                    warn!("Failed to redraw after reset: {}", e);
                }
                self.ctx.events.publish(0, SimEventKind::Reset);
            }
        }
    }

    /// Adjust the frame rate by `delta`, clamped to the configured bounds
    pub fn change_rate(&mut self, delta: i32) -> u32 {
        let rate = self
            .config
            .clamp_rate(i64::from(self.rate_hz) + i64::from(delta));
        self.apply_rate(rate);
        rate
    }

    /// Set an exact frame rate; rejected if out of bounds
    pub fn set_rate(&mut self, rate_hz: u32) -> Result<u32> {
        let rate = self.config.check_rate(rate_hz)?;
        self.apply_rate(rate);
        Ok(rate)
    }

    fn apply_rate(&mut self, rate: u32) {
        if rate == self.rate_hz {
            return;
        }
        self.rate_hz = rate;
        if let Some(session) = &self.session {
            session.set_rate(rate);
        }
        info!("Frame rate set to {} Hz", rate);
        self.ctx.events.publish(
            self.session_id().unwrap_or(0),
            SimEventKind::RateChanged { rate_hz: rate },
        );
    }

    fn load_failed(&self, error: Error) -> Error {
        warn!("Program not started: {}", error);
        self.ctx.events.publish(
            self.session_id().unwrap_or(0),
            SimEventKind::RunFailed {
                message: error.to_string(),
            },
        );
        error
    }

    pub fn pose(&self) -> Pose {
        match &self.session {
            Some(session) => session.pose(),
            None => self.ctx.home,
        }
    }

    /// Pose the render bridge last drew
    pub fn displayed_pose(&self) -> Pose {
        self.ctx.bridge.borrow().pose()
    }

    pub fn motors(&self) -> MotorCommand {
        self.session
            .as_ref()
            .map(|session| session.motors())
            .unwrap_or_default()
    }

    pub fn frame_rate(&self) -> u32 {
        self.rate_hz
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.session
            .as_ref()
            .map(|session| session.scheduler_state())
            .unwrap_or(SchedulerState::Idle)
    }

    /// Whether the frame clock is ticking
    pub fn is_animating(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.is_animating())
    }

    pub fn session_id(&self) -> Option<u64> {
        self.session.as_ref().map(|session| session.id())
    }

    pub fn subscribe(&self) -> SimEventSubscription {
        self.ctx.events.subscribe()
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }
}

impl fmt::Debug for Simulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulator")
            .field("rate_hz", &self.rate_hz)
            .field("session", &self.session)
            .finish()
    }
}
