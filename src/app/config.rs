//! Configuration for the Glk bridge

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::Settings;
use crate::error::StrictPolicy;
use crate::host::DefaultStyles;

/// Bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Font family for buffer windows
    pub font_family: String,
    /// Font size in points
    pub font_size: f64,
    /// Documents directory for saved games, transcripts and data files
    pub base_dir: PathBuf,
    /// Lines kept per buffer window (0 = unlimited)
    pub max_buffer_lines: usize,
    /// Gap between bordered windows in points
    pub border_width: f64,
    /// Refresh the view if the interpreter has not waited for this long
    pub stall_threshold_ms: u64,
    /// What to do with interpreter misuse of the API
    pub strict: StrictPolicy,
    /// Initial viewport
    pub window: WindowConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            font_family: "serif".to_string(),
            font_size: 14.0,
            base_dir: default_base_dir(),
            max_buffer_lines: 2000,
            border_width: 1.0,
            stall_threshold_ms: 500,
            strict: StrictPolicy::Log,
            window: WindowConfig::default(),
        }
    }
}

/// Viewport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Initial width in points
    pub width: f64,
    /// Initial height in points
    pub height: f64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 640.0,
            height: 480.0,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from default location or return default config
    pub fn load_or_default() -> Self {
        // Try to load from ~/.config/glk-bridge/config.json
        if let Some(config_dir) = dirs_config_path() {
            let config_path = config_dir.join("config.json");
            if config_path.exists() {
                match Self::load(&config_path) {
                    Ok(config) => return config,
                    Err(e) => tracing::warn!("ignoring {}: {}", config_path.display(), e),
                }
            }
        }
        Self::default()
    }

    /// Library settings for one game
    pub fn library_settings(&self, game_id: &str) -> Settings {
        Settings {
            base_dir: self.base_dir.clone(),
            game_id: game_id.to_string(),
            border_width: self.border_width,
            max_buffer_lines: self.max_buffer_lines,
            strict: self.strict,
        }
    }

    /// Style policy matching the configured font
    pub fn style_policy(&self) -> DefaultStyles {
        DefaultStyles::new(self.font_family.clone(), self.font_size)
    }
}

/// Get the configuration directory path
fn dirs_config_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".config").join("glk-bridge"))
}

fn default_base_dir() -> PathBuf {
    std::env::var("HOME")
        .map(|home| PathBuf::from(home).join("Documents").join("glk"))
        .unwrap_or_else(|_| std::env::temp_dir().join("glk"))
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
