//! mjrun CLI - resolve an experiment config and optionally start tracking
//!
//! Every key of the config file can be overridden with a dotted flag such
//! as `--train.learning-rate 0.001`. The resolved configuration is printed
//! and, with `--track`, sent to the tracking service.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::struct_excessive_bools)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, CommandFactory, FromArgMatches, Parser};
use mjrun_core::config::DEFAULT_CONFIG_PATH;
use mjrun_core::launch::{DEFAULT_ENV_NAME, DEFAULT_WANDB_PROJECT};
use mjrun_core::util::load_env_file;
use mjrun_core::{
    register_builtin_envs, split_override_args, ConfigFile, EnvRegistry, LaunchOptions, Mode,
    ResolvedRun, Resolver, VecBackend,
};
use mjrun_track::{InitRequest, TrackingClient, TrackingSession};
use tracing::{debug, info};

mod logging;
mod settings;

use settings::{Settings, TrackingSettings};

const OVERRIDE_HEADING: &str = "Config overrides";

#[derive(Parser, Debug)]
#[command(name = "mjrun")]
#[command(author, version, about = "mjrun - MuJoCo experiment launcher", long_about = None)]
struct Cli {
    /// Experiment config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Environment to run
    #[arg(short, long, default_value = DEFAULT_ENV_NAME)]
    env_name: String,

    /// What to do with the environment
    #[arg(long, default_value_t = Mode::default())]
    mode: Mode,

    /// Model checkpoint used by eval modes
    #[arg(long)]
    eval_model_path: Option<PathBuf>,

    /// Use the baseline settings
    #[arg(long)]
    baseline: bool,

    /// Vectorization backend
    #[arg(long, visible_aliases = ["vector", "vectorization"], default_value_t = VecBackend::default())]
    vec: VecBackend,

    /// Experiment id, reused as the tracking run id
    #[arg(long, visible_alias = "exp-name")]
    exp_id: Option<String>,

    /// Tracking project
    #[arg(long, default_value = DEFAULT_WANDB_PROJECT)]
    wandb_project: String,

    /// Tracking group
    #[arg(long)]
    wandb_group: Option<String>,

    /// Open a tracking session for this run
    #[arg(long)]
    track: bool,

    /// Record videos of the environment
    #[arg(long)]
    capture_video: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Print the resolved config as JSON only
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            config: self.config.clone(),
            env_name: self.env_name.clone(),
            mode: self.mode,
            eval_model_path: self.eval_model_path.clone(),
            baseline: self.baseline,
            vec: self.vec,
            exp_id: self.exp_id.clone(),
            wandb_project: self.wandb_project.clone(),
            wandb_group: self.wandb_group.clone(),
            track: self.track,
            capture_video: self.capture_video,
        }
    }
}

/// Flags needed before the config file is loaded
struct Prescan {
    config: PathBuf,
    verbose: bool,
}

/// Lenient first pass over the fixed flags. Errors and `--help` are left
/// for the full parse.
fn prescan(args: &[String]) -> Prescan {
    let mut pre = Prescan {
        config: PathBuf::from(DEFAULT_CONFIG_PATH),
        verbose: false,
    };

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--" => break,
            "-c" | "--config" => {
                if let Some(value) = iter.next() {
                    pre.config = PathBuf::from(value);
                }
            }
            "-v" | "--verbose" => pre.verbose = true,
            other => {
                if let Some(value) = other.strip_prefix("--config=") {
                    pre.config = PathBuf::from(value);
                } else if let Some(value) = other.strip_prefix("-c").filter(|v| !v.is_empty()) {
                    pre.config = PathBuf::from(value.strip_prefix('=').unwrap_or(value));
                }
            }
        }
    }
    pre
}

/// The full command, with one documented override flag per file entry
fn command_for(file: Option<&ConfigFile>) -> clap::Command {
    let mut cmd = Cli::command();
    for (path, value) in file.into_iter().flat_map(ConfigFile::entries) {
        let flag = path.flag_name();
        cmd = cmd.arg(
            Arg::new(path.to_string())
                .long(flag.trim_start_matches("--").to_string())
                .value_name("VALUE")
                .action(ArgAction::Set)
                .help(format!("Default: {value}"))
                .help_heading(OVERRIDE_HEADING),
        );
    }
    cmd
}

fn print_summary(run: &ResolvedRun) -> Result<()> {
    println!("Run:  {}", run.run_name);
    println!("Env:  {}", run.env_name);
    println!("Mode: {}", run.launch.mode);
    println!();
    println!("{}", serde_json::to_string_pretty(&run.config)?);
    Ok(())
}

fn print_session(session: &TrackingSession) {
    println!();
    if session.resumed {
        println!("Resumed tracking run {} ({})", session.id, session.name);
    } else {
        println!("Started tracking run {} ({})", session.id, session.name);
    }
    println!("  Project: {}", session.project);
    if let Some(group) = &session.group {
        println!("  Group:   {group}");
    }
    if let Some(url) = &session.url {
        println!("  URL:     {url}");
    }
}

async fn start_tracking(settings: &TrackingSettings, run: &ResolvedRun) -> Result<TrackingSession> {
    let mut client = TrackingClient::new(settings.base_url());
    if let Some(key) = &settings.api_key {
        client = client.with_api_key(key);
    }
    if let Some(entity) = &settings.entity {
        client = client.with_entity(entity);
    }

    let request = InitRequest::from_run(run, true)?;
    client
        .init(&request)
        .await
        .with_context(|| format!("Failed to start tracking at {}", client.base_url()))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from mjrun.env file (before reading settings)
    let env_file = load_env_file();
    let settings = Settings::load()?;

    let (args, overrides) = split_override_args(std::env::args())?;
    let pre = prescan(&args);
    let _log_guard = logging::init(&settings.log, pre.verbose);

    if let Some(path) = env_file {
        debug!("Loaded environment from {}", path.display());
    }

    // A missing file is reported after the full parse so `--help` still works
    let file = ConfigFile::load(&pre.config);
    let matches = command_for(file.as_ref().ok()).get_matches_from(&args);
    let cli = Cli::from_arg_matches(&matches)?;
    let file = if cli.config == pre.config {
        file?
    } else {
        ConfigFile::load(&cli.config)?
    };

    let launch = cli.launch_options();

    let mut registry = EnvRegistry::new();
    register_builtin_envs(&mut registry)?;
    if registry.contains(&launch.env_name) {
        debug!("Environment {} is registered", launch.env_name);
    } else {
        debug!("Environment {} is not in the local registry", launch.env_name);
    }

    let run = Resolver::new().resolve(&file, &launch, &overrides)?;
    info!("Resolved run {}", run.run_name);

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&run.config)?);
    } else {
        print_summary(&run)?;
    }

    if launch.track {
        let session = start_tracking(&settings.tracking, &run).await?;
        info!("Tracking session {} in project {}", session.id, session.project);
        if !cli.json {
            print_session(&session);
        }
    }

    Ok(())
}
