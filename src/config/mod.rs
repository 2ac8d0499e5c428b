//! Configuration management for robosim
//!
//! The configuration covers the simulation loop (frame rate bounds, drive
//! constants), the display (surface size and vehicle shape) and the control
//! program conventions (suspend keyword, entry point, motor function).

pub mod loader;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::kinematics::{
    DriveConstants, Pose, DEFAULT_ROTATION_CONSTANT, DEFAULT_TRANSLATION_CONSTANT,
};
use crate::render::{Point, ShapeStyle};

/// Main configuration structure for robosim
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Simulation loop configuration
    pub simulation: SimulationConfig,

    /// Display configuration
    pub display: DisplayConfig,

    /// Control program conventions
    pub program: ProgramConfig,
}

impl SimConfig {
    /// Load configuration from a specific file (TOML or JSON by extension)
    pub fn load_from_file(path: &Path) -> Result<Self> {
        loader::ConfigLoader::load_from_path(path)
    }

    /// Initial vehicle pose: centered on the display, zero heading
    pub fn home_pose(&self) -> Pose {
        Pose::new(self.display.width / 2.0, self.display.height / 2.0, 0.0)
    }

    /// Clamp a frame rate into the configured bounds
    pub fn clamp_rate(&self, rate: i64) -> u32 {
        let min = i64::from(self.simulation.min_frame_rate_hz);
        let max = i64::from(self.simulation.max_frame_rate_hz);
        rate.clamp(min, max) as u32
    }

    /// Reject a frame rate outside the configured bounds
    pub fn check_rate(&self, rate: u32) -> Result<u32> {
        let sim = &self.simulation;
        if rate < sim.min_frame_rate_hz || rate > sim.max_frame_rate_hz {
            return Err(Error::InvalidFrameRate {
                rate,
                min: sim.min_frame_rate_hz,
                max: sim.max_frame_rate_hz,
            });
        }
        Ok(rate)
    }
}

/// Simulation loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Frames rendered per second
    pub frame_rate_hz: u32,

    /// Lowest rate reachable through rate changes
    pub min_frame_rate_hz: u32,

    /// Highest rate reachable through rate changes
    pub max_frame_rate_hz: u32,

    /// Rotation sensitivity of the drive model
    pub rotation_constant: f64,

    /// Translation sensitivity of the drive model
    pub translation_constant: f64,
}

impl SimulationConfig {
    pub fn drive_constants(&self) -> DriveConstants {
        DriveConstants {
            rotation: self.rotation_constant,
            translation: self.translation_constant,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            frame_rate_hz: 15,
            min_frame_rate_hz: 1,
            max_frame_rate_hz: 120,
            rotation_constant: DEFAULT_ROTATION_CONSTANT,
            translation_constant: DEFAULT_TRANSLATION_CONSTANT,
        }
    }
}

/// Display configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Surface width in display units
    pub width: f64,

    /// Surface height in display units
    pub height: f64,

    /// Vehicle outline color
    pub stroke_color: String,

    /// Vehicle outline width
    pub stroke_width: f64,

    /// Vehicle fill color
    pub fill_color: String,

    /// Vehicle outline, drawn around its local origin
    pub outline: Vec<Point>,
}

impl DisplayConfig {
    pub fn shape_style(&self) -> ShapeStyle {
        ShapeStyle {
            stroke_color: self.stroke_color.clone(),
            stroke_width: self.stroke_width,
            fill_color: self.fill_color.clone(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 500.0,
            height: 500.0,
            stroke_color: "black".to_string(),
            stroke_width: 2.0,
            fill_color: "#889".to_string(),
            outline: vec![
                Point::new(-20.0, -20.0),
                Point::new(-20.0, 20.0),
                Point::new(0.0, 10.0),
                Point::new(20.0, 20.0),
                Point::new(20.0, -20.0),
                Point::new(-20.0, -20.0),
            ],
        }
    }
}

/// Control program conventions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgramConfig {
    /// Keyword of the suspend statement (`yield 0.5`)
    pub suspend_keyword: String,

    /// Name of the program's resumable entry point
    pub entry_point: String,

    /// Name of the function programs call to set motor speeds
    pub motor_function: String,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            suspend_keyword: "yield".to_string(),
            entry_point: "main".to_string(),
            motor_function: "setspeed".to_string(),
        }
    }
}
