//! Configuration File Loading
//!
//! Handles loading and saving configuration files from various locations
//! with support for TOML and JSON and a fallback to built-in defaults.

use super::SimConfig;
use crate::error::{Error, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "ROBOSIM_CONFIG";

/// Configuration file loader
pub struct ConfigLoader {
    /// Search paths for configuration files (without extension)
    search_paths: Vec<PathBuf>,
    /// Supported configuration file formats
    supported_formats: Vec<ConfigFormat>,
    /// Current configuration file path (if loaded)
    current_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigFormat {
    /// TOML format
    Toml,
    /// JSON format
    Json,
}

impl ConfigFormat {
    fn extension(self) -> &'static str {
        match self {
            ConfigFormat::Toml => "toml",
            ConfigFormat::Json => "json",
        }
    }

    fn name(self) -> &'static str {
        match self {
            ConfigFormat::Toml => "TOML",
            ConfigFormat::Json => "JSON",
        }
    }

    /// Format implied by a file extension; unknown extensions read as TOML
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => ConfigFormat::Json,
            _ => ConfigFormat::Toml,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Whether to fall back to the default config if none exists
    pub create_default: bool,
    /// Whether to validate configuration after loading
    pub validate: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            create_default: true,
            validate: true,
        }
    }
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            search_paths: Self::get_search_paths(),
            supported_formats: vec![ConfigFormat::Toml, ConfigFormat::Json],
            current_path: None,
        }
    }

    /// Load configuration with default options
    pub fn load() -> Result<SimConfig> {
        Self::load_with_options(LoadOptions::default())
    }

    /// Load configuration with custom options
    pub fn load_with_options(options: LoadOptions) -> Result<SimConfig> {
        Self::new().load_from_search_paths(&options)
    }

    /// Load and validate one specific file
    pub fn load_from_path(path: &Path) -> Result<SimConfig> {
        let loader = Self::new();
        let config = loader
            .load_config_file(path, ConfigFormat::from_path(path))
            .map_err(|e| match e {
                Error::Io(io) => Error::ConfigLoadFailed {
                    path: path.to_path_buf(),
                    reason: io.to_string(),
                },
                other => other,
            })?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Walk the search paths, returning the first config that loads
    pub fn load_from_search_paths(&mut self, options: &LoadOptions) -> Result<SimConfig> {
        if let Some((path, config)) = self.find_and_load_config()? {
            debug!("Loaded configuration from {}", path.display());
            self.current_path = Some(path);
            if options.validate {
                validate_config(&config)?;
            }
            return Ok(config);
        }

        if options.create_default {
            let config = SimConfig::default();
            if options.validate {
                validate_config(&config)?;
            }
            Ok(config)
        } else {
            Err(Error::ConfigNotFound)
        }
    }

    /// Save configuration to a specific path, format chosen by extension
    pub fn save_to_path(&self, config: &SimConfig, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let format = ConfigFormat::from_path(path);
        let content = match format {
            ConfigFormat::Json => serde_json::to_string_pretty(config).map_err(|e| {
                Error::ConfigSerializationFailed {
                    format: format.name().to_string(),
                    reason: e.to_string(),
                }
            })?,
            ConfigFormat::Toml => {
                toml::to_string_pretty(config).map_err(|e| Error::ConfigSerializationFailed {
                    format: format.name().to_string(),
                    reason: e.to_string(),
                })?
            }
        };

        fs::write(path, content)?;
        Ok(())
    }

    /// Find and load configuration from search paths
    fn find_and_load_config(&self) -> Result<Option<(PathBuf, SimConfig)>> {
        if let Ok(explicit) = env::var(CONFIG_ENV_VAR) {
            let path = PathBuf::from(explicit);
            if path.exists() {
                let config = self.load_config_file(&path, ConfigFormat::from_path(&path))?;
                return Ok(Some((path, config)));
            }
            warn!("{} points to missing file {}", CONFIG_ENV_VAR, path.display());
        }

        for base in &self.search_paths {
            for format in &self.supported_formats {
                let config_path = base.with_extension(format.extension());
                if !config_path.exists() {
                    continue;
                }
                match self.load_config_file(&config_path, *format) {
                    Ok(config) => return Ok(Some((config_path, config))),
                    Err(e) => {
                        warn!("Failed to load config from {}: {}", config_path.display(), e);
                    }
                }
            }
        }

        Ok(None)
    }

    /// Load a specific configuration file
    fn load_config_file(&self, path: &Path, format: ConfigFormat) -> Result<SimConfig> {
        let content = fs::read_to_string(path)?;

        match format {
            ConfigFormat::Toml => toml::from_str(&content).map_err(|e| Error::ConfigParseFailed {
                format: format.name().to_string(),
                reason: e.to_string(),
            }),
            ConfigFormat::Json => {
                serde_json::from_str(&content).map_err(|e| Error::ConfigParseFailed {
                    format: format.name().to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Get default search paths for configuration files
    fn get_search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("robosim").join("config"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".robosim"));
        }

        if let Ok(cwd) = env::current_dir() {
            paths.push(cwd.join(".robosim"));
        }

        paths
    }

    /// Get the current configuration file path
    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    /// List all search paths
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Clear all search paths and add a single path
    pub fn set_search_path(&mut self, path: PathBuf) {
        self.search_paths = vec![path];
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn invalid(field: &str, reason: &str) -> Error {
    Error::ConfigValidationFailed {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validate configuration
pub fn validate_config(config: &SimConfig) -> Result<()> {
    let sim = &config.simulation;
    if sim.min_frame_rate_hz == 0 {
        return Err(invalid(
            "simulation.min_frame_rate_hz",
            "Minimum frame rate must be greater than 0",
        ));
    }
    if sim.max_frame_rate_hz < sim.min_frame_rate_hz {
        return Err(invalid(
            "simulation.max_frame_rate_hz",
            "Maximum frame rate cannot be below the minimum",
        ));
    }
    if sim.frame_rate_hz < sim.min_frame_rate_hz || sim.frame_rate_hz > sim.max_frame_rate_hz {
        return Err(invalid(
            "simulation.frame_rate_hz",
            "Frame rate must lie within the configured bounds",
        ));
    }
    if !sim.rotation_constant.is_finite() {
        return Err(invalid(
            "simulation.rotation_constant",
            "Rotation constant must be finite",
        ));
    }
    if !sim.translation_constant.is_finite() || sim.translation_constant <= 0.0 {
        return Err(invalid(
            "simulation.translation_constant",
            "Translation constant must be a positive number",
        ));
    }

    let display = &config.display;
    if !(display.width > 0.0 && display.height > 0.0) {
        return Err(invalid("display", "Display width and height must be positive"));
    }
    if display.outline.len() < 2 {
        return Err(invalid(
            "display.outline",
            "Vehicle outline needs at least two points",
        ));
    }

    let program = &config.program;
    if !is_identifier(&program.suspend_keyword) {
        return Err(invalid(
            "program.suspend_keyword",
            "Suspend keyword must be an identifier",
        ));
    }
    if !is_identifier(&program.entry_point) {
        return Err(invalid(
            "program.entry_point",
            "Entry point must be an identifier",
        ));
    }
    if !is_identifier(&program.motor_function) {
        return Err(invalid(
            "program.motor_function",
            "Motor function must be an identifier",
        ));
    }

    Ok(())
}
