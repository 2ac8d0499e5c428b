//! Lua control programs
//!
//! The control language is Lua with one extra statement, `yield <expr>`,
//! which the [`StepAnnotator`](crate::annotator::StepAnnotator) rewrites into
//! `coroutine.yield(<line>, <expr>)` before compilation. The program's entry
//! point (by default `main`) runs as a coroutine, one step per resume.
//!
//! Programs see two host functions:
//! - `setspeed(left, right)` sets the motor speeds
//! - `print(...)` logs through `tracing`

use mlua::{Function, Lua, MultiValue, ThreadStatus, Value};

use super::{Compiler, Executable, StepFunction, StepOutcome, StepResult};
use crate::annotator::SuspendSyntax;
use crate::config::ProgramConfig;
use crate::error::{Error, Result};
use crate::kinematics::MotorCommand;
use crate::session::MotorPort;

/// Compiles Lua control programs
#[derive(Debug, Clone)]
pub struct LuaCompiler {
    suspend_keyword: String,
    entry_point: String,
    motor_function: String,
}

impl LuaCompiler {
    pub fn new() -> Self {
        Self::from_config(&ProgramConfig::default())
    }

    pub fn from_config(program: &ProgramConfig) -> Self {
        Self {
            suspend_keyword: program.suspend_keyword.clone(),
            entry_point: program.entry_point.clone(),
            motor_function: program.motor_function.clone(),
        }
    }
}

impl Default for LuaCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler for LuaCompiler {
    fn suspend_syntax(&self) -> SuspendSyntax {
        SuspendSyntax::lua().with_keyword(&self.suspend_keyword)
    }

    fn compile(&self, source: &str) -> Result<Option<Box<dyn Executable>>> {
        if source.trim().is_empty() {
            debug!("Empty program, nothing to compile");
            return Ok(None);
        }

        let lua = Lua::new();
        let chunk = lua
            .load(source)
            .set_name("=program")
            .into_function()
            .map_err(|e| Error::CompileFailed {
                reason: e.to_string(),
            })?;

        Ok(Some(Box::new(LuaExecutable {
            lua,
            chunk,
            entry_point: self.entry_point.clone(),
            motor_function: self.motor_function.clone(),
        })))
    }
}

/// A syntax-checked Lua chunk in its own VM
struct LuaExecutable {
    lua: Lua,
    chunk: Function,
    entry_point: String,
    motor_function: String,
}

fn instantiation_error(err: mlua::Error) -> Error {
    Error::InstantiationFailed {
        reason: err.to_string(),
    }
}

impl Executable for LuaExecutable {
    fn instantiate(self: Box<Self>, motors: MotorPort) -> Result<Box<dyn StepFunction>> {
        let LuaExecutable {
            lua,
            chunk,
            entry_point,
            motor_function,
        } = *self;

        install_host_functions(&lua, &motor_function, motors).map_err(instantiation_error)?;
        chunk.call::<()>(()).map_err(instantiation_error)?;

        let entry = match lua
            .globals()
            .get::<Value>(entry_point.as_str())
            .map_err(instantiation_error)?
        {
            Value::Function(entry) => entry,
            Value::Nil => {
                return Err(Error::InstantiationFailed {
                    reason: format!("entry point '{}' is not defined", entry_point),
                })
            }
            other => {
                return Err(Error::InstantiationFailed {
                    reason: format!(
                        "entry point '{}' is a {}, not a function",
                        entry_point,
                        other.type_name()
                    ),
                })
            }
        };

        let thread = lua.create_thread(entry).map_err(instantiation_error)?;
        Ok(Box::new(LuaStepFunction {
            lua,
            thread,
            last_line: None,
            done: false,
        }))
    }
}

fn install_host_functions(lua: &Lua, motor_function: &str, motors: MotorPort) -> mlua::Result<()> {
    let globals = lua.globals();

    let setspeed = lua.create_function(move |_, (left, right): (f64, f64)| {
        if !motors.set(MotorCommand::new(left, right)) {
            debug!("Ignored motor command from a stopped session");
        }
        Ok(())
    })?;
    globals.set(motor_function, setspeed)?;

    let print = lua.create_function(|_, args: MultiValue| {
        let parts: Vec<String> = args.iter().map(display_value).collect();
        info!(target: "robosim::program", "{}", parts.join("\t"));
        Ok(())
    })?;
    globals.set("print", print)?;

    Ok(())
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Nil => "nil".to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.to_string_lossy().to_string(),
        other => format!("<{}>", other.type_name()),
    }
}

/// The entry point running as a coroutine
struct LuaStepFunction {
    lua: Lua,
    thread: mlua::Thread,
    last_line: Option<usize>,
    done: bool,
}

impl LuaStepFunction {
    fn step_result(&self, values: MultiValue) -> Result<StepResult> {
        let malformed = |reason: String| Error::StepFailed {
            line: self.last_line,
            reason: format!("suspend must report (line, seconds): {}", reason),
        };

        let (line, seconds) = self
            .lua
            .unpack_multi::<(i64, f64)>(values)
            .map_err(|e| malformed(e.to_string()))?;
        if line < 1 {
            return Err(malformed(format!("line {} is not a valid line number", line)));
        }
        Ok(StepResult::new(line as usize, seconds))
    }
}

impl StepFunction for LuaStepFunction {
    fn resume(&mut self) -> StepOutcome {
        if self.done {
            return StepOutcome::Finished;
        }

        match self.thread.resume::<MultiValue>(()) {
            Ok(values) => {
                if !matches!(self.thread.status(), ThreadStatus::Resumable) {
                    self.done = true;
                    return StepOutcome::Finished;
                }
                match self.step_result(values) {
                    Ok(result) => {
                        self.last_line = Some(result.line_number);
                        StepOutcome::Yielded(result)
                    }
                    Err(e) => {
                        self.done = true;
                        StepOutcome::Failed(e)
                    }
                }
            }
            Err(e) => {
                self.done = true;
                StepOutcome::Failed(Error::StepFailed {
                    line: self.last_line,
                    reason: e.to_string(),
                })
            }
        }
    }
}
