//! Config file loading and command-line overrides
//!
//! The config file is a TOML document made of sections. Each `(section, key)`
//! pair becomes an override slot addressed by a dotted [`KeyPath`]; values
//! given on the command line as `--section.key=value` replace the file value
//! during resolution.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::ConfigError;

/// Config path used when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Dotted path into the nested configuration, e.g. `train.learning_rate`
///
/// Segments are normalized so that `-` and `_` are interchangeable, which
/// lets `--train.learning-rate` address the file key `learning_rate`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyPath(Vec<String>);

impl KeyPath {
    /// Parse a dotted path. Empty segments are rejected.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let segments: Vec<String> = s.split('.').map(|seg| seg.replace('-', "_")).collect();
        if segments.iter().any(String::is_empty) {
            return Err(ConfigError::InvalidKeyPath(s.to_string()));
        }
        Ok(Self(segments))
    }

    /// Path for a key inside a file section
    pub fn from_section_key(section: &str, key: &str) -> Result<Self, ConfigError> {
        Self::parse(&format!("{section}.{key}"))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Command-line spelling of this path, e.g. `--train.learning-rate`
    pub fn flag_name(&self) -> String {
        format!("--{}", self.0.join(".").replace('_', "-"))
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl FromStr for KeyPath {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A loaded config file: sections of typed leaf values
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
    entries: Vec<(KeyPath, Value)>,
}

impl ConfigFile {
    /// Load and parse the config file at `path`.
    ///
    /// Fails with [`ConfigError::NotFound`] if the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }

        info!("Loading config from: {:?}", path);
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(path, &content)
    }

    /// Parse config content; `path` is only recorded for diagnostics.
    pub fn parse(path: impl Into<PathBuf>, content: &str) -> Result<Self, ConfigError> {
        let path = path.into();
        let table: toml::Table = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.clone(),
            message: e.message().to_string(),
        })?;

        let mut entries = Vec::new();
        for (section, body) in table {
            let toml::Value::Table(keys) = body else {
                return Err(ConfigError::InvalidSection(section));
            };
            for (key, value) in keys {
                let key_path = KeyPath::from_section_key(&section, &key)?;
                // `frame-skip` and `frame_skip` address the same slot
                if entries.iter().any(|(k, _)| *k == key_path) {
                    return Err(ConfigError::KeyConflict {
                        path: key_path.to_string(),
                    });
                }
                entries.push((key_path, toml_to_json(value)));
            }
        }

        debug!("Config file {:?} has {} keys", path, entries.len());
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All `(path, value)` leaf entries, sorted by section then key
    pub fn entries(&self) -> impl Iterator<Item = (&KeyPath, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn get(&self, path: &KeyPath) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == path).map(|(_, v)| v)
    }

    pub fn contains(&self, path: &KeyPath) -> bool {
        self.get(path).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Convert a TOML value into JSON.
///
/// Non-finite floats have no JSON form and are kept as their string spelling.
fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f).map_or_else(
            || {
                warn!("Non-finite float {} kept as a string", f);
                Value::String(f.to_string())
            },
            Value::Number,
        ),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(arr) => Value::Array(arr.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect::<Map<String, Value>>(),
        ),
    }
}

/// One `--section.key value` pair taken from the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Override {
    pub path: KeyPath,
    pub raw: String,
}

/// Command-line overrides in the order given; later entries win
#[derive(Debug, Clone, Default)]
pub struct Overrides(Vec<Override>);

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: KeyPath, raw: impl Into<String>) {
        self.0.push(Override {
            path,
            raw: raw.into(),
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &Override> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Reject overrides that do not name a key present in `file`
    pub fn validate(&self, file: &ConfigFile) -> Result<(), ConfigError> {
        match self.0.iter().find(|o| !file.contains(&o.path)) {
            Some(unknown) => Err(ConfigError::UnknownOverride(unknown.path.to_string())),
            None => Ok(()),
        }
    }
}

/// Separate dotted override flags from the rest of the command line.
///
/// Accepts `--a.b=value` and `--a.b value`. Everything else, including all
/// arguments after a bare `--`, is returned untouched for the regular flag
/// parser.
pub fn split_override_args<I, S>(args: I) -> Result<(Vec<String>, Overrides), ConfigError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut passthrough = Vec::new();
    let mut overrides = Overrides::new();
    let mut args = args.into_iter().map(Into::into).peekable();

    while let Some(arg) = args.next() {
        if arg == "--" {
            passthrough.push(arg);
            passthrough.extend(args.by_ref());
            break;
        }

        let Some(flag) = arg.strip_prefix("--") else {
            passthrough.push(arg);
            continue;
        };

        let (name, inline_value) = match flag.split_once('=') {
            Some((name, value)) => (name, Some(value.to_string())),
            None => (flag, None),
        };

        if !name.contains('.') {
            passthrough.push(arg);
            continue;
        }

        let path = KeyPath::parse(name)?;
        let value = match inline_value {
            Some(value) => value,
            None => match args.next_if(|next| !next.starts_with("--")) {
                Some(value) => value,
                None => return Err(ConfigError::MissingOverrideValue(name.to_string())),
            },
        };

        debug!("Override {} = {:?}", path, value);
        overrides.push(path, value);
    }

    Ok((passthrough, overrides))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLE: &str = r#"
[env]
name = "Ant"
frame-skip = 5

[train]
seed = 7
learning_rate = 3e-4
sizes = [64, 64]
"#;

    #[test]
    fn test_key_path_normalizes_dashes() {
        let a = KeyPath::parse("train.learning-rate").unwrap();
        let b = KeyPath::parse("train.learning_rate").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "train.learning_rate");
        assert_eq!(a.flag_name(), "--train.learning-rate");
    }

    #[test]
    fn test_key_path_rejects_empty_segments() {
        assert!(matches!(
            KeyPath::parse("train..seed"),
            Err(ConfigError::InvalidKeyPath(_))
        ));
        assert!(KeyPath::parse(".seed").is_err());
    }

    #[test]
    fn test_parse_collects_section_keys() {
        let file = ConfigFile::parse("config.toml", SAMPLE).unwrap();
        assert_eq!(file.len(), 5);
        assert_eq!(
            file.get(&KeyPath::parse("train.seed").unwrap()),
            Some(&json!(7))
        );
        assert_eq!(
            file.get(&KeyPath::parse("env.frame_skip").unwrap()),
            Some(&json!(5))
        );
        assert_eq!(
            file.get(&KeyPath::parse("train.sizes").unwrap()),
            Some(&json!([64, 64]))
        );
    }

    #[test]
    fn test_top_level_scalar_is_rejected() {
        let err = ConfigFile::parse("config.toml", "seed = 1\n[train]\nx = 1\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSection(s) if s == "seed"));
    }

    #[test]
    fn test_spelling_variants_of_one_key_conflict() {
        let err = ConfigFile::parse("config.toml", "[env]\nframe-skip = 1\nframe_skip = 2\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::KeyConflict { path } if path == "env.frame_skip"));
    }

    #[test]
    fn test_malformed_toml_is_a_parse_error() {
        let err = ConfigFile::parse("bad.toml", "[train\nseed = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ConfigFile::load("/definitely/not/here/config.toml").unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
        assert!(err.to_string().contains("/definitely/not/here/config.toml"));
    }

    #[test]
    fn test_split_override_args() {
        let argv = [
            "mjrun",
            "--mode",
            "train",
            "--train.seed=3",
            "--env.name",
            "Hopper",
            "--track",
            "--train.learning-rate",
            "-1e-3",
        ];
        let (rest, overrides) = split_override_args(argv).unwrap();

        assert_eq!(rest, vec!["mjrun", "--mode", "train", "--track"]);
        let pairs: Vec<(String, &str)> = overrides
            .iter()
            .map(|o| (o.path.to_string(), o.raw.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("train.seed".to_string(), "3"),
                ("env.name".to_string(), "Hopper"),
                ("train.learning_rate".to_string(), "-1e-3"),
            ]
        );
    }

    #[test]
    fn test_split_override_missing_value() {
        let err = split_override_args(["mjrun", "--train.seed"]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingOverrideValue(n) if n == "train.seed"));

        let err = split_override_args(["mjrun", "--train.seed", "--track"]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingOverrideValue(_)));
    }

    #[test]
    fn test_split_stops_at_double_dash() {
        let (rest, overrides) = split_override_args(["mjrun", "--", "--train.seed=1"]).unwrap();
        assert!(overrides.is_empty());
        assert_eq!(rest, vec!["mjrun", "--", "--train.seed=1"]);
    }

    #[test]
    fn test_validate_rejects_unknown_keys() {
        let file = ConfigFile::parse("config.toml", SAMPLE).unwrap();
        let mut overrides = Overrides::new();
        overrides.push(KeyPath::parse("train.seed").unwrap(), "1");
        assert!(overrides.validate(&file).is_ok());

        overrides.push(KeyPath::parse("train.gamma").unwrap(), "0.9");
        let err = overrides.validate(&file).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownOverride(p) if p == "train.gamma"));
    }
}
