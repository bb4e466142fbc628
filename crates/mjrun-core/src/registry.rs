//! Environment registry
//!
//! Environments are registered by versioned id (`Ant-v5`) together with a
//! reference to their constructor and episode parameters. The registry is
//! an owned value; [`register_builtin_envs`] must be called once before any
//! environment is built.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info};

/// Errors from registering or looking up environments
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Invalid environment id '{0}' (expected Name or Name-vN)")]
    InvalidId(String),

    #[error("Environment {0} is already registered")]
    AlreadyRegistered(EnvId),

    #[error("Environment {id} is not registered{}", format_versions(.known_versions))]
    NotFound { id: EnvId, known_versions: Vec<u32> },
}

fn format_versions(versions: &[u32]) -> String {
    if versions.is_empty() {
        String::new()
    } else {
        let list: Vec<String> = versions.iter().map(|v| format!("v{v}")).collect();
        format!(" (registered versions: {})", list.join(", "))
    }
}

/// Versioned environment id, e.g. `Ant-v5`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EnvId {
    name: String,
    version: Option<u32>,
}

impl EnvId {
    /// Parse `Name` or `Name-vN`. A `-v` suffix that is not all digits is
    /// part of the name.
    pub fn parse(id: &str) -> Result<Self, RegistryError> {
        let (name, version) = match id.rsplit_once("-v") {
            Some((name, version))
                if !version.is_empty() && version.bytes().all(|b| b.is_ascii_digit()) =>
            {
                let version = version
                    .parse()
                    .map_err(|_| RegistryError::InvalidId(id.to_string()))?;
                (name, Some(version))
            }
            _ => (id, None),
        };

        let valid_char = |c: char| c.is_alphanumeric() || matches!(c, '_' | ':' | '.' | '-');
        if name.is_empty() || !name.chars().all(valid_char) {
            return Err(RegistryError::InvalidId(id.to_string()));
        }

        Ok(Self {
            name: name.to_string(),
            version,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Option<u32> {
        self.version
    }
}

impl fmt::Display for EnvId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.version {
            Some(v) => write!(f, "{}-v{}", self.name, v),
            None => write!(f, "{}", self.name),
        }
    }
}

impl FromStr for EnvId {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for EnvId {
    type Error = RegistryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EnvId> for String {
    fn from(id: EnvId) -> Self {
        id.to_string()
    }
}

/// Registration record for one environment variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvSpec {
    pub id: EnvId,
    /// Constructor reference in `module:Class` form
    pub entry_point: String,
    pub max_episode_steps: Option<u32>,
    pub reward_threshold: Option<f64>,
    #[serde(default)]
    pub kwargs: Map<String, Value>,
}

impl EnvSpec {
    pub fn new(id: &str, entry_point: impl Into<String>) -> Result<Self, RegistryError> {
        Ok(Self {
            id: EnvId::parse(id)?,
            entry_point: entry_point.into(),
            max_episode_steps: None,
            reward_threshold: None,
            kwargs: Map::new(),
        })
    }

    pub fn with_max_episode_steps(mut self, steps: u32) -> Self {
        self.max_episode_steps = Some(steps);
        self
    }

    pub fn with_reward_threshold(mut self, threshold: f64) -> Self {
        self.reward_threshold = Some(threshold);
        self
    }

    pub fn with_kwarg(mut self, key: impl Into<String>, value: Value) -> Self {
        self.kwargs.insert(key.into(), value);
        self
    }
}

/// Table of registered environments
#[derive(Debug, Clone, Default)]
pub struct EnvRegistry {
    specs: BTreeMap<EnvId, EnvSpec>,
}

impl EnvRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a spec. Re-registering an id is an error.
    pub fn register(&mut self, spec: EnvSpec) -> Result<(), RegistryError> {
        if self.specs.contains_key(&spec.id) {
            return Err(RegistryError::AlreadyRegistered(spec.id));
        }
        debug!("Registered environment {} -> {}", spec.id, spec.entry_point);
        self.specs.insert(spec.id.clone(), spec);
        Ok(())
    }

    /// Look up a spec by id string
    pub fn spec(&self, id: &str) -> Result<&EnvSpec, RegistryError> {
        let id = EnvId::parse(id)?;
        self.specs.get(&id).ok_or_else(|| RegistryError::NotFound {
            known_versions: self.versions_of(id.name()),
            id,
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.spec(id).is_ok()
    }

    /// Registered versions of an environment name, ascending
    pub fn versions_of(&self, name: &str) -> Vec<u32> {
        self.specs
            .keys()
            .filter(|id| id.name() == name)
            .filter_map(EnvId::version)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EnvSpec> {
        self.specs.values()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

/// Id of the updated Ant variant
pub const ANT_V5: &str = "Ant-v5";

/// Register the environment variants shipped with this project.
///
/// Call once per registry; a second call fails with
/// [`RegistryError::AlreadyRegistered`].
pub fn register_builtin_envs(registry: &mut EnvRegistry) -> Result<(), RegistryError> {
    registry.register(
        EnvSpec::new(ANT_V5, "updated_envs.ant_v5:AntEnv")?
            .with_max_episode_steps(1000)
            .with_reward_threshold(6000.0),
    )?;
    info!("Registered built-in environments ({})", ANT_V5);
    Ok(())
}
