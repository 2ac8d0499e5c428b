//! robosim - a step-by-step robot control program simulator
//!
//! A user program drives a two-wheeled vehicle by setting motor speeds and
//! pausing with `yield <seconds>`. The simulator shows which line the program
//! is paused on while a fixed-rate frame loop integrates the vehicle's pose
//! and redraws it.
//!
//! ## Module Organization
//!
//! ### Simulation
//!
//! - [`session`] - The [`Simulator`] controller and per-run sessions
//! - [`kinematics`] - Differential-drive pose integration
//! - [`clock`] - Fixed-rate frame clock
//! - [`scheduler`] - Step-by-step program scheduler
//!
//! ### Programs
//!
//! - [`annotator`] - Rewrites suspend statements to report their line
//! - [`program`] - Compiler/step-function boundary and the Lua backend
//!
//! ### Support
//!
//! - [`render`] - Render bridge, affine transforms and surfaces
//! - [`events`] - Broadcast bus for line highlights and run notifications
//! - [`config`] - Configuration loading and validation
//! - [`mod@error`] - Error types and Result aliases
//!
//! ## Quick Start
//!
//! ```no_run
//! use robosim::{MemorySurface, SimConfig, Simulator};
//!
//! # async fn run() -> robosim::Result<()> {
//! let surface = MemorySurface::new(500.0, 500.0);
//! let mut sim = Simulator::with_lua(SimConfig::default(), Box::new(surface))?;
//!
//! let program = "function main()\n  setspeed(10, 10)\n  yield 1\nend\n";
//! if let Some(run) = sim.load_and_run(program)? {
//!     println!("{}", run.outcome().await);
//! }
//! println!("{:?}", sim.pose());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! Everything runs on one thread: a tokio current-thread runtime with a
//! [`tokio::task::LocalSet`]. Frame ticks and program resumptions are local
//! tasks that interleave but never overlap, so state is shared through
//! `Rc`/`Cell` without locks. Each run gets a session id; callbacks of an
//! older session check it and do nothing.

#[macro_use]
extern crate tracing;

pub mod annotator;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod kinematics;
pub mod program;
pub mod render;
pub mod scheduler;
pub mod session;

// Re-exports for core functionality
pub use config::SimConfig;
pub use error::{Error, Result};
pub use session::{MotorPort, Simulator};

// Convenience re-exports for common types
pub use annotator::{Annotation, StepAnnotator, SuspendPoint, SuspendSyntax};
pub use config::loader::ConfigLoader;
pub use events::{SimEvent, SimEventKind};
pub use kinematics::{MotorCommand, Pose};
pub use program::{LuaCompiler, StepOutcome, StepResult};
pub use render::{AsciiSurface, MemorySurface, RenderBridge, Surface};
pub use scheduler::{RunHandle, RunOutcome, SchedulerState};

// Version information
/// The current version of robosim from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The application name from Cargo.toml
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// The application description from Cargo.toml
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Load configuration, from `path` if given, else from the search paths.
///
/// An explicit path must load; a missing or broken file on the search
/// paths falls back to defaults with a warning.
pub fn load_config(path: Option<&std::path::Path>) -> Result<SimConfig> {
    if let Some(path) = path {
        info!("Loading configuration from {}", path.display());
        return ConfigLoader::load_from_path(path);
    }

    match ConfigLoader::load() {
        Ok(config) => Ok(config),
        Err(e) => {
            warn!("Failed to load configuration: {}. Using defaults", e);
            Ok(SimConfig::default())
        }
    }
}

/// User-facing explanation of an error that stopped a run from starting
pub fn handle_startup_error(error: &Error) -> String {
    match error {
        Error::ConfigLoadFailed { path, reason } => {
            format!(
                "Configuration Error: Failed to load config from '{}': {}\n\nTry:\n• Check configuration file syntax\n• Ensure file permissions are correct",
                path.display(),
                reason
            )
        }
        Error::ConfigParseFailed { format, reason } => {
            format!(
                "Configuration Error: Failed to parse {} config: {}\n\nTry:\n• Ensure file is valid {}",
                format, reason, format
            )
        }
        Error::ConfigValidationFailed { field, reason } => {
            format!(
                "Configuration Error: Validation failed for '{}': {}\n\nTry:\n• Check configuration value\n• Remove the field to use its default",
                field, reason
            )
        }
        Error::CompileFailed { reason } => {
            format!(
                "Program Error: {}\n\nTry:\n• Check the program for syntax errors",
                reason
            )
        }
        Error::InstantiationFailed { reason } => {
            format!(
                "Program Error: {}\n\nTry:\n• Define the entry point function\n• Check top-level statements",
                reason
            )
        }
        Error::InvalidFrameRate { .. } => format!("Simulation Error: {}", error),
        Error::Io(err) => {
            format!(
                "I/O Error: {}\n\nTry:\n• Check the program path\n• Check file permissions",
                err
            )
        }
        _ => {
            format!(
                "Unexpected Error: {}\n\nPlease report this issue with debug logs enabled",
                error
            )
        }
    }
}
