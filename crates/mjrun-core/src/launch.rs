//! Fixed launch options that sit next to the config file overrides

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::DEFAULT_CONFIG_PATH;
use crate::error::ConfigError;

/// Environment used when `--env-name` is not given
pub const DEFAULT_ENV_NAME: &str = "Ant-v4";

/// Tracking project used when `--wandb-project` is not given
pub const DEFAULT_WANDB_PROJECT: &str = "mujoco";

/// What the invocation is meant to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    Train,
    Eval,
    Evaluate,
    #[default]
    SweepCarbs,
    Autotune,
    Profile,
}

impl Mode {
    pub const ALL: [Mode; 6] = [
        Mode::Train,
        Mode::Eval,
        Mode::Evaluate,
        Mode::SweepCarbs,
        Mode::Autotune,
        Mode::Profile,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Train => "train",
            Mode::Eval => "eval",
            Mode::Evaluate => "evaluate",
            Mode::SweepCarbs => "sweep-carbs",
            Mode::Autotune => "autotune",
            Mode::Profile => "profile",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mode::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| invalid_choice("mode", s, Mode::ALL.iter().map(|m| m.as_str())))
    }
}

/// How environments are vectorized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VecBackend {
    #[default]
    Serial,
    Multiprocessing,
}

impl VecBackend {
    pub const ALL: [VecBackend; 2] = [VecBackend::Serial, VecBackend::Multiprocessing];

    pub fn as_str(self) -> &'static str {
        match self {
            VecBackend::Serial => "serial",
            VecBackend::Multiprocessing => "multiprocessing",
        }
    }
}

impl fmt::Display for VecBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VecBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VecBackend::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| invalid_choice("vec", s, VecBackend::ALL.iter().map(|v| v.as_str())))
    }
}

fn invalid_choice<'a>(
    field: &'static str,
    value: &str,
    choices: impl Iterator<Item = &'a str>,
) -> ConfigError {
    ConfigError::InvalidChoice {
        field,
        value: value.to_string(),
        choices: choices.collect::<Vec<_>>().join(", "),
    }
}

/// The fixed process flags of one invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchOptions {
    pub config: PathBuf,
    pub env_name: String,
    pub mode: Mode,
    pub eval_model_path: Option<PathBuf>,
    pub baseline: bool,
    pub vec: VecBackend,
    pub exp_id: Option<String>,
    pub wandb_project: String,
    pub wandb_group: Option<String>,
    pub track: bool,
    pub capture_video: bool,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            config: PathBuf::from(DEFAULT_CONFIG_PATH),
            env_name: DEFAULT_ENV_NAME.to_string(),
            mode: Mode::default(),
            eval_model_path: None,
            baseline: false,
            vec: VecBackend::default(),
            exp_id: None,
            wandb_project: DEFAULT_WANDB_PROJECT.to_string(),
            wandb_group: None,
            track: false,
            capture_video: false,
        }
    }
}

impl LaunchOptions {
    /// Top-level entries these options contribute to the resolved config.
    ///
    /// `env_name` is reported separately and is not part of the map.
    pub fn to_entries(&self) -> Map<String, Value> {
        let path = |p: &Option<PathBuf>| {
            p.as_ref()
                .map_or(Value::Null, |p| Value::String(p.display().to_string()))
        };
        let text = |s: &Option<String>| s.clone().map_or(Value::Null, Value::String);

        let mut map = Map::new();
        map.insert("config".into(), Value::String(self.config.display().to_string()));
        map.insert("mode".into(), Value::String(self.mode.to_string()));
        map.insert("eval_model_path".into(), path(&self.eval_model_path));
        map.insert("baseline".into(), Value::Bool(self.baseline));
        map.insert("vec".into(), Value::String(self.vec.to_string()));
        map.insert("exp_id".into(), text(&self.exp_id));
        map.insert("wandb_project".into(), Value::String(self.wandb_project.clone()));
        map.insert("wandb_group".into(), text(&self.wandb_group));
        map.insert("track".into(), Value::Bool(self.track));
        map.insert("capture_video".into(), Value::Bool(self.capture_video));
        map
    }
}
