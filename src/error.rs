//! Error types and Result aliases for robosim

use std::fmt;
use std::path::PathBuf;

use crate::render::RenderError;

/// Result type alias for robosim operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for robosim
#[derive(Debug)]
pub enum Error {
    // === Program lifecycle errors ===
    /// The compiler rejected the (annotated) program text
    CompileFailed {
        reason: String,
    },

    /// Running the compiled unit or creating its entry point failed
    InstantiationFailed {
        reason: String,
    },

    /// A single program step raised
    StepFailed {
        /// Last line the program reported before failing, if any
        line: Option<usize>,
        reason: String,
    },

    // === Simulation errors ===
    /// Requested frame rate is outside the configured bounds
    InvalidFrameRate {
        rate: u32,
        min: u32,
        max: u32,
    },

    /// Rendering surface rejected an operation
    Render(RenderError),

    // === Configuration errors ===
    /// Failed to load configuration file
    ConfigLoadFailed {
        path: PathBuf,
        reason: String,
    },

    /// Configuration file not found
    ConfigNotFound,

    /// Configuration validation failed
    ConfigValidationFailed {
        field: String,
        reason: String,
    },

    /// Failed to serialize configuration
    ConfigSerializationFailed {
        format: String,
        reason: String,
    },

    /// Failed to parse configuration
    ConfigParseFailed {
        format: String,
        reason: String,
    },

    // === I/O and serialization errors ===
    /// I/O errors
    Io(std::io::Error),

    /// Serialization errors
    Serde(serde_json::Error),

    /// TOML parsing errors
    Toml(toml::de::Error),

    /// Regex compilation errors
    Regex(regex::Error),

    // === Generic fallback (use sparingly) ===
    /// Generic errors
    Other(String),
}

impl Error {
    /// Whether this error was raised before any session was started
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            Error::CompileFailed { .. } | Error::InstantiationFailed { .. }
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Program errors
            Error::CompileFailed { reason } => {
                write!(f, "Failed to compile program: {}", reason)
            }
            Error::InstantiationFailed { reason } => {
                write!(f, "Failed to start program: {}", reason)
            }
            Error::StepFailed {
                line: Some(line),
                reason,
            } => {
                write!(f, "Program failed after line {}: {}", line, reason)
            }
            Error::StepFailed { line: None, reason } => {
                write!(f, "Program failed: {}", reason)
            }

            // Simulation errors
            Error::InvalidFrameRate { rate, min, max } => {
                write!(
                    f,
                    "Frame rate {} Hz is outside the allowed range {}..={} Hz",
                    rate, min, max
                )
            }
            Error::Render(err) => write!(f, "Render error: {}", err),

            // Configuration errors
            Error::ConfigLoadFailed { path, reason } => {
                write!(f, "Failed to load config from '{}': {}", path.display(), reason)
            }
            Error::ConfigNotFound => {
                write!(f, "Configuration file not found")
            }
            Error::ConfigValidationFailed { field, reason } => {
                write!(f, "Configuration validation failed for '{}': {}", field, reason)
            }
            Error::ConfigSerializationFailed { format, reason } => {
                write!(f, "Failed to serialize config as {}: {}", format, reason)
            }
            Error::ConfigParseFailed { format, reason } => {
                write!(f, "Failed to parse {} config: {}", format, reason)
            }

            // I/O and serialization errors
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::Serde(err) => write!(f, "Serialization error: {}", err),
            Error::Toml(err) => write!(f, "TOML parsing error: {}", err),
            Error::Regex(err) => write!(f, "Regex compilation error: {}", err),

            // Generic fallback
            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Render(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::Serde(err) => Some(err),
            Error::Toml(err) => Some(err),
            Error::Regex(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RenderError> for Error {
    fn from(err: RenderError) -> Self {
        Error::Render(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serde(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Toml(err)
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error::Regex(err)
    }
}

impl From<String> for Error {
    fn from(err: String) -> Self {
        Error::Other(err)
    }
}

impl From<&str> for Error {
    fn from(err: &str) -> Self {
        Error::Other(err.to_string())
    }
}
