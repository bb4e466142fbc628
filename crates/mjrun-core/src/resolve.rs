//! Config resolution: file defaults + launch options + overrides -> nested map

use std::collections::HashSet;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config::{ConfigFile, KeyPath, Overrides};
use crate::error::ConfigError;
use crate::launch::LaunchOptions;
use crate::run::{Clock, RunName, SystemClock};
use crate::value::parse_literal;

/// Sections that are always present in the resolved config, even when empty
pub const BASE_SECTIONS: [&str; 3] = ["env", "policy", "rnn"];

/// Nested configuration mapping
pub type ConfigTree = Map<String, Value>;

/// Output of resolution
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedRun {
    pub config: ConfigTree,
    pub env_name: String,
    pub run_name: RunName,
    #[serde(skip)]
    pub launch: LaunchOptions,
}

impl ResolvedRun {
    /// Look up a value by dotted path
    pub fn get(&self, path: &str) -> Option<&Value> {
        let path = KeyPath::parse(path).ok()?;
        lookup(&self.config, &path)
    }

    /// The resolved `train.seed`
    pub fn seed(&self) -> Option<&Value> {
        self.get("train.seed")
    }
}

/// Resolves a run configuration with an injectable clock
#[derive(Debug, Clone)]
pub struct Resolver<C: Clock = SystemClock> {
    clock: C,
}

impl Resolver<SystemClock> {
    pub fn new() -> Self {
        Self { clock: SystemClock }
    }
}

impl Default for Resolver<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> Resolver<C> {
    pub fn with_clock(clock: C) -> Self {
        Self { clock }
    }

    /// Build the nested run configuration.
    ///
    /// Overrides must name keys present in `file`, and always win over the
    /// file's value. Every string leaf, whether from the launch options,
    /// the file or an override, is literal-parsed.
    pub fn resolve(
        &self,
        file: &ConfigFile,
        launch: &LaunchOptions,
        overrides: &Overrides,
    ) -> Result<ResolvedRun, ConfigError> {
        overrides.validate(file)?;

        let mut tree = TreeBuilder::with_sections(&BASE_SECTIONS);

        for (key, value) in launch.to_entries() {
            tree.insert(&KeyPath::parse(&key)?, literal_leaf(value))?;
        }

        for (path, value) in file.entries() {
            tree.insert(path, literal_leaf(value.clone()))?;
        }

        for o in overrides.iter() {
            let value = parse_literal(&o.raw);
            debug!("Applying override {} = {}", o.path, value);
            tree.insert(&o.path, value)?;
        }

        let config = tree.finish();

        let seed_path = KeyPath::parse("train.seed")?;
        let seed = lookup(&config, &seed_path)
            .ok_or_else(|| ConfigError::MissingKey(seed_path.to_string()))?;
        let run_name = RunName::new(&launch.env_name, seed, &self.clock);

        info!(
            "Resolved {} config keys ({} overridden), run name {}",
            file.len(),
            overrides.len(),
            run_name
        );

        Ok(ResolvedRun {
            config,
            env_name: launch.env_name.clone(),
            run_name,
            launch: launch.clone(),
        })
    }
}

/// String leaves go through [`parse_literal`]; typed values pass as-is
fn literal_leaf(value: Value) -> Value {
    match value {
        Value::String(raw) => parse_literal(&raw),
        other => other,
    }
}

/// Walk `path` from `root`, descending through nested objects
pub fn lookup<'a>(root: &'a ConfigTree, path: &KeyPath) -> Option<&'a Value> {
    let (last, parents) = path.segments().split_last()?;
    let mut current = root;
    for segment in parents {
        current = current.get(segment)?.as_object()?;
    }
    current.get(last)
}

/// Builds the nested tree while remembering which paths hold leaf values.
///
/// A path may not be both a leaf and a prefix of another path. Replacing
/// one leaf with another is how overrides apply; anything that would turn a
/// leaf into a section (or a section into a leaf) is a
/// [`ConfigError::KeyConflict`].
#[derive(Debug, Default)]
struct TreeBuilder {
    root: ConfigTree,
    leaves: HashSet<KeyPath>,
}

impl TreeBuilder {
    fn with_sections(sections: &[&str]) -> Self {
        let mut builder = Self::default();
        for section in sections {
            builder
                .root
                .insert((*section).to_string(), Value::Object(Map::new()));
        }
        builder
    }

    fn insert(&mut self, path: &KeyPath, value: Value) -> Result<(), ConfigError> {
        let segments = path.segments();
        let (last, parents) = segments
            .split_last()
            .ok_or_else(|| ConfigError::InvalidKeyPath(path.to_string()))?;

        for depth in 1..segments.len() {
            let prefix = KeyPath::parse(&segments[..depth].join("."))?;
            if self.leaves.contains(&prefix) {
                return Err(conflict(&prefix));
            }
        }
        if !self.leaves.contains(path) && lookup(&self.root, path).is_some() {
            return Err(conflict(path));
        }

        let mut current = &mut self.root;
        for segment in parents {
            let entry = current
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            current = entry.as_object_mut().ok_or_else(|| conflict(path))?;
        }
        current.insert(last.clone(), value);
        self.leaves.insert(path.clone());
        Ok(())
    }

    fn finish(self) -> ConfigTree {
        self.root
    }
}

fn conflict(path: &KeyPath) -> ConfigError {
    ConfigError::KeyConflict {
        path: path.to_string(),
    }
}
