mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use devcell_lib::cancel;
use devcell_lib::engine::{EngineError, EngineKind};
use devcell_lib::project::{ComposeData, ProjectName, StoreError};
use devcell_lib::prompt::PromptError;

use crate::output::{OutputFormat, print_error, print_warning};

/// Exit status used when the user interrupts a command.
const INTERRUPTED: u8 = 130;

/// devcell - per-project container development environments
#[derive(Parser)]
#[command(name = "devcell")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Increase log verbosity (-v info, -vv debug)
  #[arg(short, long, global = true, action = ArgAction::Count)]
  verbose: u8,

  /// Output format
  #[arg(short, long, global = true, value_enum, default_value_t)]
  output: OutputFormat,

  /// Container engine to drive (docker or podman)
  #[arg(long, global = true, env = "DEVCELL_ENGINE", default_value = "docker")]
  engine: EngineKind,

  /// Dotfiles directory copied into each image at build time
  #[arg(long, global = true, env = "DEVCELL_DOTFILES_DIR")]
  dotfiles: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Create a project's compose and env files
  Create {
    /// Project name (lowercase letters, digits and '-')
    name: ProjectName,

    /// Host directory mounted into the container
    #[arg(short, long)]
    path: PathBuf,

    /// Publish a port (HOST:CONTAINER); repeatable
    #[arg(long = "port", value_name = "MAPPING")]
    ports: Vec<String>,

    /// Extra volume (SOURCE:TARGET); repeatable
    #[arg(long = "volume", value_name = "MAPPING")]
    volumes: Vec<String>,

    /// Container environment variable; repeatable
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    env: Vec<(String, String)>,
  },

  /// Build (or rebuild) a project's image
  Build {
    name: ProjectName,

    /// Rebuild even when the image is up to date
    #[arg(short, long)]
    force: bool,
  },

  /// Start a session, joining the running one if there is one
  Run {
    name: ProjectName,

    /// Command to run instead of an interactive shell
    #[arg(last = true)]
    args: Vec<String>,
  },

  /// Show a project's files, build record and image
  Status { name: ProjectName },

  /// List all projects
  List,

  /// Remove a project and everything the engine holds for it
  Rm {
    name: ProjectName,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    force: bool,
  },

  /// Drop the engine's build cache
  ///
  /// The cache is shared with every other build on this engine, so cached
  /// layers of unrelated images are dropped too.
  Prune,

  /// Show the engine, identity and directories in use
  Info,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
  let (key, value) = s
    .split_once('=')
    .ok_or_else(|| format!("invalid KEY=VALUE: no '=' in '{s}'"))?;
  if key.is_empty() {
    return Err(format!("invalid KEY=VALUE: empty key in '{s}'"));
  }
  Ok((key.to_string(), value.to_string()))
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  match run(cli) {
    Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
    Err(err) => report(&err),
  }
}

fn init_tracing(verbose: u8) {
  let default = match verbose {
    0 => "warn",
    1 => "info",
    _ => "debug",
  };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn run(cli: Cli) -> Result<i32> {
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;

  rt.block_on(async move {
    let (handle, cancel) = cancel::channel();
    tokio::spawn(async move {
      if tokio::signal::ctrl_c().await.is_ok() {
        debug!("interrupt received");
        handle.cancel();
      }
    });

    let ctx = cmd::Context::new(cli.engine, cli.output, cli.dotfiles, cancel)?;

    match cli.command {
      Commands::Create {
        name,
        path,
        ports,
        volumes,
        env,
      } => {
        let compose = ComposeData {
          ports,
          volumes,
          environment: env.into_iter().collect(),
        };
        cmd::cmd_create(&ctx, &name, &path, &compose).map(|_| 0)
      }
      Commands::Build { name, force } => cmd::cmd_build(&ctx, &name, force).await.map(|_| 0),
      Commands::Run { name, args } => cmd::cmd_run(&ctx, &name, &args).await,
      Commands::Status { name } => cmd::cmd_status(&ctx, &name).await.map(|_| 0),
      Commands::List => cmd::cmd_list(&ctx).map(|_| 0),
      Commands::Rm { name, force } => cmd::cmd_rm(&ctx, &name, force).await.map(|_| 0),
      Commands::Prune => cmd::cmd_prune(&ctx).await.map(|_| 0),
      Commands::Info => cmd::cmd_info(&ctx).await.map(|_| 0),
    }
  })
}

/// Print `err` with its causes and a remediation hint where one applies.
fn report(err: &anyhow::Error) -> ExitCode {
  if is_cancelled(err) {
    print_warning("Interrupted");
    return ExitCode::from(INTERRUPTED);
  }

  print_error(&format!("{err:#}"));

  let engine_error = err.chain().find_map(|cause| cause.downcast_ref::<EngineError>());
  match engine_error {
    Some(EngineError::PermissionDenied { engine, .. }) => print_warning(&format!(
      "{engine} did not accept the request; re-run with sudo or add your user to the {engine} group"
    )),
    Some(EngineError::EngineUnavailable { program, .. }) => print_warning(&format!(
      "'{program}' was not found; install it or pick another engine with --engine"
    )),
    _ => {}
  }

  ExitCode::FAILURE
}

fn is_cancelled(err: &anyhow::Error) -> bool {
  err.chain().any(|cause| {
    matches!(cause.downcast_ref::<EngineError>(), Some(EngineError::Cancelled))
      || matches!(cause.downcast_ref::<PromptError>(), Some(PromptError::Cancelled))
      || cause.downcast_ref::<StoreError>().is_some_and(StoreError::is_cancelled)
  })
}
