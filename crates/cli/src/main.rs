// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! railyard - multi-agent orchestration CLI

mod color;
mod commands;
mod exit_error;
mod help;
mod output;
mod table;

use output::OutputFormat;

use anyhow::Result;
use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use railyard_config::Config;
use railyard_storage::Store;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "railyard",
    version,
    disable_version_flag = true,
    about = "Railyard - orchestrates pools of agent subprocesses against a shared repo"
)]
struct Cli {
    /// Change to <dir> before doing anything
    #[arg(short = 'C', global = true, value_name = "DIR")]
    directory: Option<PathBuf>,

    /// Config file (spec §6.1)
    #[arg(long = "config", global = true, default_value = "railyard.yml")]
    config: PathBuf,

    /// Output format
    #[arg(short = 'o', long = "output", value_enum, default_value_t, global = true)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an Engine Loop to termination
    Engine(commands::engine::EngineArgs),
    /// Invoke the Merge Gate directly for a work item
    Switch(commands::switch::SwitchArgs),
    /// Work item (car) CRUD, dependencies, and the ready set
    Car(commands::car::CarArgs),
    /// Mark a car complete (called from inside the agent subprocess)
    Complete(commands::complete::CompleteArgs),
    /// Append a progress note to a car
    Progress(commands::progress::ProgressArgs),
    /// Send, acknowledge, and view message threads
    Message(commands::message::MessageArgs),
    /// Show unacknowledged messages for an agent
    Inbox(commands::message::InboxArgs),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        let code = e
            .downcast_ref::<exit_error::ExitError>()
            .map_or(exit_error::OPERATIONAL_ERROR, |c| c.code);
        let msg = format_error(&e);
        if !msg.is_empty() {
            eprintln!("Error: {}", msg);
        }
        std::process::exit(code);
    }
}

/// `RAILYARD_LOG` env filter (default `info`), always written to stderr.
/// `engine start` additionally mirrors every event into
/// `<store>/logs/engine-<track>.log` (spec §5: "daemon logs include engine
/// id and cycle"), since the subscriber can only be installed once per
/// process — `file_path` is resolved up front in `run()`, before any command
/// runs. Mirrors the teacher daemon's `setup_logging`, minus the rotation
/// (one log per track run is enough for the lifetime of a single `engine
/// start` invocation).
fn init_tracing(file_path: Option<&Path>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = || EnvFilter::try_from_env("RAILYARD_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match file_path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "engine.log".to_string());
            let appender = tracing_appender::rolling::never(dir, name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(non_blocking)), Some(guard))
        }
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(filter())
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init();

    guard
}

/// Format an anyhow error, deduplicating the chain.
///
/// If the top-level Display already contains the source error text, skip
/// the "Caused by" chain (common when thiserror variants use
/// `#[error("... {0}")]` with `#[from]`). Otherwise render the full chain.
fn format_error(err: &anyhow::Error) -> String {
    let top = err.to_string();

    let chain_redundant = err
        .chain()
        .skip(1)
        .all(|cause| top.contains(&cause.to_string()));

    if chain_redundant {
        return top;
    }

    let mut buf = top;
    for (i, cause) in err.chain().skip(1).enumerate() {
        buf.push_str(&format!("\n\nCaused by:\n    {}: {}", i, cause));
    }
    buf
}

fn cli_command() -> clap::Command {
    Cli::command()
        .help_template(help::template())
        .before_help(help::commands())
        .after_help(help::after_help())
        .styles(help::styles())
        .arg(
            clap::Arg::new("version")
                .short('v')
                .short_alias('V')
                .long("version")
                .action(clap::ArgAction::Version)
                .help("Print version"),
        )
}

async fn run() -> Result<()> {
    let matches = match cli_command().try_get_matches() {
        Ok(m) => m,
        Err(e) => {
            if e.kind() == clap::error::ErrorKind::DisplayHelp {
                let args: Vec<String> = std::env::args().collect();
                let args = strip_global_flags(&args);
                print_formatted_help(&args);
                return Ok(());
            }
            e.exit();
        }
    };
    let cli = Cli::from_arg_matches(&matches)?;
    let format = cli.output;

    if let Some(ref dir) = cli.directory {
        let canonical = std::fs::canonicalize(dir).map_err(|e| {
            anyhow::anyhow!("cannot change to directory '{}': {}", dir.display(), e)
        })?;
        std::env::set_current_dir(&canonical).map_err(|e| {
            anyhow::anyhow!(
                "cannot change to directory '{}': {}",
                canonical.display(),
                e
            )
        })?;
    }

    let command = match cli.command {
        Some(cmd) => cmd,
        None => {
            let _log_guard = init_tracing(None);
            help::print_help(cli_command());
            return Ok(());
        }
    };

    // `engine start` additionally mirrors its log into the store's log
    // directory; every other command just logs to stderr. The subscriber
    // can only be installed once, so this has to happen before dispatch
    // rather than inside `commands::engine::start`.
    let preloaded_config = match &command {
        Commands::Engine(_) => Some(Config::load(&cli.config)?),
        _ => None,
    };
    let log_path = match (&command, &preloaded_config) {
        (Commands::Engine(args), Some(config)) => Some(
            config
                .store_dir()
                .join("logs")
                .join(format!("engine-{}.log", args.track)),
        ),
        _ => None,
    };
    let _log_guard = init_tracing(log_path.as_deref());

    match command {
        Commands::Engine(args) => {
            let config = preloaded_config
                .ok_or_else(|| anyhow::anyhow!("internal error: engine config not preloaded"))?;
            let store = Arc::new(open_store(&cli.config, Some(&config))?);
            commands::engine::start(store, &config, args).await?
        }
        Commands::Switch(args) => {
            let config = Config::load(&cli.config).ok();
            let store = Arc::new(open_store(&cli.config, config.as_ref())?);
            let repo = config
                .as_ref()
                .map(|c| PathBuf::from(&c.repo))
                .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());
            commands::switch::run(store, &repo, args, format).await?
        }
        Commands::Car(args) => {
            let config = Config::load(&cli.config).ok();
            let store = open_store(&cli.config, config.as_ref())?;
            commands::car::run(&store, args, format)?
        }
        Commands::Complete(args) => {
            let config = Config::load(&cli.config).ok();
            let store = Arc::new(open_store(&cli.config, config.as_ref())?);
            commands::complete::run(store, args, format).await?
        }
        Commands::Progress(args) => {
            let config = Config::load(&cli.config).ok();
            let store = open_store(&cli.config, config.as_ref())?;
            commands::progress::run(&store, args, format)?
        }
        Commands::Message(args) => {
            let config = Config::load(&cli.config).ok();
            let store = open_store(&cli.config, config.as_ref())?;
            commands::message::run(&store, args, format)?
        }
        Commands::Inbox(args) => {
            let config = Config::load(&cli.config).ok();
            let store = open_store(&cli.config, config.as_ref())?;
            commands::message::inbox(&store, args, format)?
        }
    }

    Ok(())
}

/// Open the store for this invocation. Inside an agent subprocess the
/// `RAILYARD_*` env vars (spec §6.3) name the store directly, so `complete`
/// and `progress` never need a config file in the worktree; everything
/// else falls back to a loaded `Config`.
fn open_store(config_path: &Path, config: Option<&Config>) -> Result<Store> {
    if let Ok(dir) = std::env::var(railyard_core::agent_env::STORE_DIR) {
        let owner = std::env::var(railyard_core::agent_env::OWNER).unwrap_or_default();
        let branch_prefix =
            std::env::var(railyard_core::agent_env::BRANCH_PREFIX).unwrap_or_default();
        let default_branch =
            std::env::var(railyard_core::agent_env::DEFAULT_BRANCH).unwrap_or_default();
        return Ok(Store::open(dir, owner, branch_prefix, default_branch)?);
    }
    let config = match config {
        Some(c) => c.clone(),
        None => Config::load(config_path)?,
    };
    let store = Store::open(
        config.store_dir(),
        &config.owner,
        &config.branch_prefix,
        &config.default_branch,
    )?;
    sync_tracks(&store, &config)?;
    Ok(store)
}

/// Seed every `config.tracks` entry into the store (spec §3 Track,
/// "Immutable after seeding"; §6.1 config `tracks` list). Run on every
/// command that loads a config so `test_command`, `conventions`, and
/// `engine_slots` stay current with the config file rather than whatever
/// was seeded the first time a store was opened.
fn sync_tracks(store: &Store, config: &Config) -> Result<()> {
    for track in &config.tracks {
        store.seed_track(track.clone())?;
    }
    Ok(())
}

/// Print help with post-hoc colorization, resolving the correct subcommand from args.
fn print_formatted_help(args: &[String]) {
    let cmd = cli_command();

    let non_flags: Vec<&String> = args
        .iter()
        .skip(1)
        .filter(|arg| !arg.starts_with('-'))
        .collect();

    let subcommand_names: Vec<&str> = if non_flags.first().map(|s| s.as_str()) == Some("help") {
        non_flags.iter().skip(1).map(|s| s.as_str()).collect()
    } else {
        non_flags.iter().map(|s| s.as_str()).collect()
    };

    let target_cmd = find_subcommand(cmd, &subcommand_names);
    help::print_help(target_cmd);
}

/// Strip `-C <value>` and `--config <value>` from args so their values
/// aren't mistaken for subcommand names in help formatting.
fn strip_global_flags(args: &[String]) -> Vec<String> {
    let mut result = Vec::with_capacity(args.len());
    let mut skip_next = false;
    for arg in args {
        if skip_next {
            skip_next = false;
            continue;
        }
        if arg == "-C" || arg == "--config" {
            skip_next = true;
            continue;
        }
        if arg.starts_with("-C") && arg.len() > 2 {
            continue;
        }
        if arg.starts_with("--config=") {
            continue;
        }
        result.push(arg.clone());
    }
    result
}

/// Recursively find a nested subcommand by name path.
pub(crate) fn find_subcommand(mut cmd: clap::Command, names: &[&str]) -> clap::Command {
    for name in names {
        let mut found_sub = None;
        for sub in cmd.get_subcommands() {
            if sub.get_name() == *name || sub.get_all_aliases().any(|a| a == *name) {
                found_sub = Some(sub.get_name().to_string());
                break;
            }
        }
        if let Some(sub_name) = found_sub {
            if let Some(sub) = cmd.find_subcommand_mut(&sub_name) {
                cmd = sub.clone();
            } else {
                break;
            }
        } else {
            break;
        }
    }
    cmd
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
