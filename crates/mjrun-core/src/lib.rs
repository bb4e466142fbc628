//! mjrun Core - config resolution, run naming and environment registry
//!
//! This crate turns a TOML experiment config plus command-line overrides
//! into a nested run configuration, and holds the environment registry.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod launch;
pub mod registry;
pub mod resolve;
pub mod run;
pub mod util;
pub mod value;

pub use config::{split_override_args, ConfigFile, KeyPath, Override, Overrides};
pub use error::{ConfigError, MjrunError, Result};
pub use launch::{LaunchOptions, Mode, VecBackend};
pub use registry::{register_builtin_envs, EnvId, EnvRegistry, EnvSpec, RegistryError};
pub use resolve::{ConfigTree, ResolvedRun, Resolver};
pub use run::{Clock, FixedClock, RunName, SystemClock};
pub use value::parse_literal;
