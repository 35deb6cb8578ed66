//! TOML settings files.
//!
//! ```toml
//! [tracker]
//! birth_low_db = -60.0
//! birth_high_db = -24.0
//! method = "probability"
//!
//! [allocator]
//! voice_count = 8
//! priority = "loudest-first"
//! ```
//!
//! Missing keys take their defaults.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use vt_ir::{ConfigError, EngineConfig};

#[derive(Debug)]
pub enum SettingsError {
    Io(io::Error),
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
    /// Parsed, but the values are out of range.
    Invalid(ConfigError),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::Io(e) => write!(f, "settings I/O error: {}", e),
            SettingsError::Parse(e) => write!(f, "invalid settings file: {}", e),
            SettingsError::Serialize(e) => write!(f, "cannot serialize settings: {}", e),
            SettingsError::Invalid(e) => write!(f, "invalid setting: {}", e),
        }
    }
}

impl std::error::Error for SettingsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SettingsError::Io(e) => Some(e),
            SettingsError::Parse(e) => Some(e),
            SettingsError::Serialize(e) => Some(e),
            SettingsError::Invalid(e) => Some(e),
        }
    }
}

impl From<io::Error> for SettingsError {
    fn from(e: io::Error) -> Self {
        SettingsError::Io(e)
    }
}

impl From<ConfigError> for SettingsError {
    fn from(e: ConfigError) -> Self {
        SettingsError::Invalid(e)
    }
}

pub fn parse_config(text: &str) -> Result<EngineConfig, SettingsError> {
    let config: EngineConfig = toml::from_str(text).map_err(SettingsError::Parse)?;
    config.validate()?;
    Ok(config)
}

/// Load settings from `path`. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<EngineConfig, SettingsError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::info!("no settings at {}, using defaults", path.display());
            return Ok(EngineConfig::default());
        }
        Err(e) => return Err(e.into()),
    };
    let config = parse_config(&text)?;
    log::info!("loaded settings from {}", path.display());
    Ok(config)
}

pub fn save_config(path: &Path, config: &EngineConfig) -> Result<(), SettingsError> {
    config.validate()?;
    let text = toml::to_string_pretty(config).map_err(SettingsError::Serialize)?;
    fs::write(path, text)?;
    Ok(())
}
