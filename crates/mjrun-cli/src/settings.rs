//! Tool settings for the mjrun binary
//!
//! These configure mjrun itself (logging, tracking endpoint), not the
//! experiment. They come from an optional `mjrun.toml` and `MJRUN__*`
//! environment variables.

use std::path::PathBuf;

use anyhow::{Context, Result};
use config::{ConfigBuilder, Environment, File};
use mjrun_track::DEFAULT_BASE_URL;
use serde::Deserialize;

/// Settings for the mjrun binary
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub log: LogSettings,
    pub tracking: TrackingSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
    /// Also write logs to this file when non-empty
    pub file: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TrackingSettings {
    pub base_url: Option<String>,
    pub entity: Option<String>,
    pub api_key: Option<String>,
}

impl TrackingSettings {
    /// Fill unset values from the standard `WANDB_*` variables
    fn apply_wandb_env(&mut self) {
        let from_env = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        if self.base_url.is_none() {
            self.base_url = from_env("WANDB_BASE_URL");
        }
        if self.entity.is_none() {
            self.entity = from_env("WANDB_ENTITY");
        }
        if self.api_key.is_none() {
            self.api_key = from_env("WANDB_API_KEY");
        }
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }
}

impl Settings {
    /// Load settings from file and environment
    pub fn load() -> Result<Self> {
        Self::load_from(Self::find_config_file())
    }

    fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = ConfigBuilder::<config::builder::DefaultState>::default();

        // Add settings file if it exists
        if let Some(path) = &config_path {
            builder = builder.add_source(File::from(path.clone()).required(false));
        }

        // Add environment variables with MJRUN_ prefix
        builder = builder.add_source(
            Environment::with_prefix("MJRUN")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let mut settings: Settings = builder
            .build()?
            .try_deserialize()
            .context("Failed to deserialize settings")?;
        settings.tracking.apply_wandb_env();
        Ok(settings)
    }

    /// Find the settings file
    fn find_config_file() -> Option<PathBuf> {
        // Check in order: MJRUN_CONFIG env, ./mjrun.toml, ~/.config/mjrun/mjrun.toml
        if let Ok(path) = std::env::var("MJRUN_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let local = PathBuf::from("mjrun.toml");
        if local.exists() {
            return Some(local);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".config").join("mjrun").join("mjrun.toml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        None
    }
}
