use log::LevelFilter;
use pipette_common::logging::parse_level;
use pipette_common::{parse_color, pipette_config_dir, Rgb};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

fn default_overlay_cursor() -> bool {
    false
}

fn default_outline_color() -> String {
    "#000000".to_string()
}

fn default_uppercase() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureConfig,
    pub preview: PreviewConfig,
    pub output: OutputConfig,
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CaptureConfig {
    /// Include the hardware cursor in the screenshot.
    #[serde(default = "default_overlay_cursor")]
    pub overlay_cursor: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PreviewConfig {
    #[serde(default = "default_outline_color")]
    pub outline_color: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    #[serde(default = "default_uppercase")]
    pub uppercase: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            overlay_cursor: default_overlay_cursor(),
        }
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            outline_color: default_outline_color(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            uppercase: default_uppercase(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Loads `explicit` if given, failing when it cannot be read. Otherwise
    /// tries the user and system config files and falls back to defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            let config = Self::load_from_path(path)?;
            log::info!("Loaded config from {}", path.display());
            return Ok(config);
        }

        let user_config = pipette_config_dir().join("config.toml");
        let system_config = PathBuf::from("/etc/pipette/config.toml");

        for path in [user_config, system_config] {
            if !path.exists() {
                continue;
            }
            match Self::load_from_path(&path) {
                Ok(config) => {
                    log::info!("Loaded config from {}", path.display());
                    return Ok(config);
                }
                Err(e) => {
                    log::warn!("Failed to load {}: {}", path.display(), e);
                }
            }
        }

        log::debug!("Using default configuration");
        Ok(Self::default())
    }

    fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))
    }

    pub fn outline_color(&self) -> Rgb {
        parse_color(&self.preview.outline_color).unwrap_or_else(Rgb::black)
    }

    pub fn log_level(&self) -> Option<LevelFilter> {
        parse_level(&self.log.level)
    }
}
