//! Environment file loading
//!
//! Secrets such as `WANDB_API_KEY` can live in an `mjrun.env` file instead
//! of the shell profile.

use std::path::PathBuf;

/// File name searched for by [`load_env_file`]
pub const ENV_FILE_NAME: &str = "mjrun.env";

/// Candidate env file locations, in search order:
/// 1. /usr/local/etc/mjrun/mjrun.env
/// 2. User's config directory/mjrun/mjrun.env
/// 3. ~/.config/mjrun/mjrun.env
pub fn env_file_candidates() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/usr/local/etc/mjrun").join(ENV_FILE_NAME)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("mjrun").join(ENV_FILE_NAME));
    }
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config").join("mjrun").join(ENV_FILE_NAME));
    }
    paths
}

/// Load environment variables from the first env file found.
///
/// Variables that are already set are left alone. Returns the file used.
pub fn load_env_file() -> Option<PathBuf> {
    let path = env_file_candidates().into_iter().find(|p| p.exists())?;
    let contents = std::fs::read_to_string(&path).ok()?;
    parse_env_file(&contents);
    Some(path)
}

/// Parse env file contents and set environment variables (only if not already set).
/// Supports formats:
/// - `KEY=value`
/// - `export KEY=value`
/// - `KEY="quoted value"`
/// - `KEY='single quoted'`
/// - Comments starting with #
pub fn parse_env_file(contents: &str) {
    for (key, value) in env_file_pairs(contents) {
        if std::env::var(key).is_err() {
            std::env::set_var(key, value);
        }
    }
}

fn env_file_pairs(contents: &str) -> impl Iterator<Item = (&str, &str)> {
    contents.lines().filter_map(|line| {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let (key, value) = line.split_once('=')?;
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        Some((key, value.trim().trim_matches('"').trim_matches('\'')))
    })
}
