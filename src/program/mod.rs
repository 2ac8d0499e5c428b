//! Control program boundary
//!
//! A control program is compiled by a [`Compiler`], instantiated into a
//! resumable [`StepFunction`], and then driven one step at a time by the
//! [`ProgramScheduler`](crate::scheduler::ProgramScheduler). Each resumption
//! produces a tagged [`StepOutcome`]; completion and failure are distinct,
//! always-observable signals.

pub mod lua;

pub use lua::LuaCompiler;

use serde::{Deserialize, Serialize};

use crate::annotator::SuspendSyntax;
use crate::error::{Error, Result};
use crate::session::MotorPort;

/// What a program reports at a suspend point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// Line of the suspend statement in the original program text
    pub line_number: usize,
    /// Requested pause before the next step
    pub duration_seconds: f64,
}

impl StepResult {
    pub fn new(line_number: usize, duration_seconds: f64) -> Self {
        Self {
            line_number,
            duration_seconds,
        }
    }
}

/// Result of resuming a program once
#[derive(Debug)]
pub enum StepOutcome {
    /// The program paused at a suspend point
    Yielded(StepResult),
    /// The program returned; there are no further steps
    Finished,
    /// The step raised
    Failed(Error),
}

/// A resumable, instantiated program
pub trait StepFunction {
    /// Run the program until its next suspend point, completion or error.
    ///
    /// Resuming after `Finished` or `Failed` must not run user code again.
    fn resume(&mut self) -> StepOutcome;
}

/// A compiled program that has not been started
pub trait Executable {
    /// Run the compiled unit and create its entry point.
    ///
    /// `motors` is the only way the program can affect the simulation.
    fn instantiate(self: Box<Self>, motors: MotorPort) -> Result<Box<dyn StepFunction>>;
}

/// Compiler for a control language
pub trait Compiler {
    /// Suspend statement syntax of the language
    fn suspend_syntax(&self) -> SuspendSyntax;

    /// Compile annotated program text.
    ///
    /// `Ok(None)` means the compiler produced nothing without raising; this
    /// is treated as an empty program, not a failure.
    fn compile(&self, source: &str) -> Result<Option<Box<dyn Executable>>>;
}
