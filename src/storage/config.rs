use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::geometry::{CellDimension, ImageStyle, TerminalCellMetrics};
use crate::image::RendererKind;
use crate::terminal::{DEFAULT_CELL_HEIGHT, DEFAULT_CELL_WIDTH};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub terminal: TerminalConfig,
    #[serde(default)]
    pub viewer: ViewerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How terminal cell metrics are obtained
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalConfig {
    /// Ask the terminal for its cell size (otherwise always use the fallback)
    #[serde(default = "default_true")]
    pub query_cell_size: bool,

    /// Cell width in pixels when the terminal can't be asked
    #[serde(default = "default_cell_width")]
    pub fallback_cell_width: u16,

    /// Cell height in pixels when the terminal can't be asked
    #[serde(default = "default_cell_height")]
    pub fallback_cell_height: u16,
}

impl TerminalConfig {
    pub fn fallback_metrics(&self) -> TerminalCellMetrics {
        TerminalCellMetrics::from((self.fallback_cell_width, self.fallback_cell_height))
    }
}

impl Default for TerminalConfig {
    fn default() -> Self {
        TerminalConfig {
            query_cell_size: true,
            fallback_cell_width: default_cell_width(),
            fallback_cell_height: default_cell_height(),
        }
    }
}

/// Viewer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// Requested image width: "auto" or a cell count (unset when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<CellDimension>,

    /// Requested image height: "auto" or a cell count (unset when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<CellDimension>,

    /// Number of decoded images kept in memory
    #[serde(default = "default_image_cache_size")]
    pub image_cache_size: usize,

    /// Reload images when their files change
    #[serde(default)]
    pub watch: bool,

    /// "protocol" (auto-detected graphics protocol) or "halfblocks"
    #[serde(default)]
    pub renderer: RendererKind,
}

impl ViewerConfig {
    pub fn style(&self) -> ImageStyle {
        ImageStyle {
            width: self.width,
            height: self.height,
        }
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        ViewerConfig {
            width: None,
            height: None,
            image_cache_size: default_image_cache_size(),
            watch: false,
            renderer: RendererKind::default(),
        }
    }
}

/// Log levels for the viewer's file log and status line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_file_level")]
    pub file_level: String,

    #[serde(default = "default_flash_level")]
    pub flash_level: String,

    /// How long a status line message stays visible
    #[serde(default = "default_flash_message_duration_ms")]
    pub flash_message_duration_ms: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            file_level: default_file_level(),
            flash_level: default_flash_level(),
            flash_message_duration_ms: default_flash_message_duration_ms(),
        }
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_cell_width() -> u16 {
    DEFAULT_CELL_WIDTH
}

fn default_cell_height() -> u16 {
    DEFAULT_CELL_HEIGHT
}

fn default_image_cache_size() -> usize {
    16
}

fn default_file_level() -> String {
    "info".to_string()
}

fn default_flash_level() -> String {
    "warn".to_string()
}

fn default_flash_message_duration_ms() -> u64 {
    4000
}

/// Trait for configuration storage
pub trait ConfigStorage: Send + Sync {
    /// Load configuration from file
    fn load(&self) -> Result<Config>;

    /// Save configuration to file
    fn save(&self, config: &Config) -> Result<()>;

    /// Get the config file path
    fn path(&self) -> &PathBuf;

    /// Create default configuration file if it doesn't exist
    fn create_default(&self) -> Result<()>;
}

/// TOML-based implementation of ConfigStorage
pub struct TomlConfigStorage {
    path: PathBuf,
}

impl TomlConfigStorage {
    /// Create a new TomlConfigStorage with the given path
    pub fn new(path: PathBuf) -> Self {
        TomlConfigStorage { path }
    }
}

impl ConfigStorage for TomlConfigStorage {
    fn load(&self) -> Result<Config> {
        use anyhow::Context;
        use std::fs;

        // First run: write the example config and use the defaults
        if !self.path.exists() {
            log::info!(
                "Config file not found at {:?}, creating default configuration",
                self.path
            );
            self.create_default()?;
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read config from {:?}", self.path))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {:?}", self.path))?;

        log::info!("Loaded configuration from {:?}", self.path);
        log::debug!(
            "Config: query_cell_size={}, fallback cell {}x{}, renderer={:?}",
            config.terminal.query_cell_size,
            config.terminal.fallback_cell_width,
            config.terminal.fallback_cell_height,
            config.viewer.renderer
        );

        Ok(config)
    }

    fn save(&self, config: &Config) -> Result<()> {
        use anyhow::Context;
        use std::fs;

        let toml_str = toml::to_string_pretty(config)
            .with_context(|| "Failed to serialize configuration")?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        fs::write(&self.path, toml_str)
            .with_context(|| format!("Failed to write config to {:?}", self.path))?;

        log::debug!("Saved configuration to {:?}", self.path);

        Ok(())
    }

    fn path(&self) -> &PathBuf {
        &self.path
    }

    fn create_default(&self) -> Result<()> {
        use anyhow::Context;
        use std::fs;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        // Use the example config compiled into the binary
        let example_config = include_str!("../../tuimg.toml.example");

        fs::write(&self.path, example_config)
            .with_context(|| format!("Failed to create default config at {:?}", self.path))?;

        log::info!("Created default configuration at {:?}", self.path);

        Ok(())
    }
}
