//! Tracking session types

use anyhow::{Context, Result};
use mjrun_core::{ConfigTree, ResolvedRun};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Length of generated run ids
pub const RUN_ID_LEN: usize = 8;

const RUN_ID_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Generate a random run id of [`RUN_ID_LEN`] lowercase alphanumerics
pub fn generate_run_id() -> String {
    let mut rng = rand::thread_rng();
    (0..RUN_ID_LEN)
        .map(|_| RUN_ID_CHARSET[rng.gen_range(0..RUN_ID_CHARSET.len())] as char)
        .collect()
}

/// Errors reported by the tracking service itself
#[derive(Error, Debug)]
pub enum TrackingError {
    #[error("Run {id} already exists and resume is disabled")]
    RunAlreadyExists { id: String },

    #[error("Tracking service error: {0}")]
    Service(String),

    #[error("Tracking response is missing {0}")]
    MalformedResponse(&'static str),
}

/// Everything needed to open a tracking session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InitRequest {
    pub id: String,
    pub name: String,
    pub project: String,
    pub group: Option<String>,
    pub config: ConfigTree,
    pub resume: bool,
    pub allow_val_change: bool,
    pub save_code: bool,
}

impl InitRequest {
    /// Build a request from a resolved config.
    ///
    /// `wandb_project` and `wandb_group` are read from the top level of the
    /// config; the config itself is forwarded unchanged. A fresh id is
    /// generated when `id` is `None`.
    pub fn from_config(
        config: &ConfigTree,
        run_name: &str,
        id: Option<&str>,
        resume: bool,
    ) -> Result<Self> {
        let project = config
            .get("wandb_project")
            .and_then(scalar_text)
            .context("Resolved config has no wandb_project")?;
        let group = config.get("wandb_group").and_then(scalar_text);

        Ok(Self {
            id: id.map_or_else(generate_run_id, str::to_string),
            name: run_name.to_string(),
            project,
            group,
            config: config.clone(),
            resume,
            allow_val_change: true,
            save_code: true,
        })
    }

    /// Build a request from a resolved run; `exp_id` doubles as the resume id
    pub fn from_run(run: &ResolvedRun, resume: bool) -> Result<Self> {
        Self::from_config(
            &run.config,
            run.run_name.as_str(),
            run.launch.exp_id.as_deref(),
            resume,
        )
    }
}

/// Text of a scalar leaf; literal parsing may have turned `123` into a number
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Handle for an open tracking session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingSession {
    pub id: String,
    pub name: String,
    pub project: String,
    pub entity: Option<String>,
    pub group: Option<String>,
    /// The run already existed and was resumed
    pub resumed: bool,
    pub url: Option<String>,
}
