//! [`ContainerEngine`] backed by the `docker` or `podman` command line.
//!
//! Captured commands run with piped output and are killed if the caller
//! cancels. Build, run and join inherit the terminal so the user sees the
//! engine's own progress output and can interact with the session.
//!
//! When a mutating command fails, the engine is probed with `info`. If the
//! probe fails too, the daemon is unreachable for this user and the failure is
//! reported as [`EngineError::PermissionDenied`] instead of the command error.

use std::fmt;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output, Stdio};
use std::str::FromStr;

use async_trait::async_trait;
use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::naming::{self, leader_container_name};
use super::parse::{self, CONTAINER_FORMAT, IMAGE_FORMAT, INSPECT_IMAGE_FORMAT, NETWORK_FORMAT, VOLUME_FORMAT};
use super::{ContainerEngine, ContainerInfo, EngineError, EngineInfo, ImageInfo, NetworkInfo, VolumeInfo};
use crate::cancel::Cancellation;
use crate::consts::{IMAGE_REPOSITORY, RESOURCE_PREFIX, SERVICE_NAME};
use crate::project::templates::{compose_project_name, image_reference};
use crate::project::{Project, ProjectName};

/// Label set on volumes this tool creates.
const MANAGED_LABEL: &str = "devcell.managed=true";

/// Build variable naming the dotfiles directory inside the build context.
const DOTFILES_VAR: &str = "DEVCELL_DOTFILES";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
  Docker,
  Podman,
}

impl EngineKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Docker => "docker",
      Self::Podman => "podman",
    }
  }
}

impl fmt::Display for EngineKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for EngineKind {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "docker" => Ok(Self::Docker),
      "podman" => Ok(Self::Podman),
      other => Err(format!("unsupported container engine '{other}' (expected docker or podman)")),
    }
  }
}

#[derive(Debug, Clone)]
pub struct CliEngine {
  kind: EngineKind,
  program: PathBuf,
}

impl CliEngine {
  /// Use the engine's executable from `PATH`.
  pub fn new(kind: EngineKind) -> Self {
    Self::with_program(kind, kind.as_str())
  }

  /// Use a specific executable that speaks `kind`'s command line.
  pub fn with_program(kind: EngineKind, program: impl Into<PathBuf>) -> Self {
    Self {
      kind,
      program: program.into(),
    }
  }

  pub fn kind(&self) -> EngineKind {
    self.kind
  }

  fn program_name(&self) -> String {
    self.program.display().to_string()
  }

  fn describe(&self, args: &[String]) -> String {
    format!("{} {}", self.kind, args.join(" "))
  }

  fn command(&self, args: &[String]) -> Command {
    let mut command = Command::new(&self.program);
    command.args(args).kill_on_drop(true);
    command
  }

  fn spawn_error(&self, source: std::io::Error) -> EngineError {
    if source.kind() == std::io::ErrorKind::NotFound {
      EngineError::EngineUnavailable {
        program: self.program_name(),
        source,
      }
    } else {
      EngineError::Spawn {
        program: self.program_name(),
        source,
      }
    }
  }

  /// Run to completion with captured output.
  async fn capture(&self, cancel: &Cancellation, args: &[String]) -> Result<Output, EngineError> {
    if cancel.is_cancelled() {
      return Err(EngineError::Cancelled);
    }
    debug!(command = %self.describe(args), "running engine command");

    let child = self
      .command(args)
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .spawn()
      .map_err(|e| self.spawn_error(e))?;

    // Dropping the child on cancellation kills it.
    tokio::select! {
      biased;
      _ = cancel.cancelled() => Err(EngineError::Cancelled),
      output = child.wait_with_output() => output.map_err(|e| self.spawn_error(e)),
    }
  }

  fn failure(&self, args: &[String], output: &Output) -> EngineError {
    EngineError::CommandFailed {
      command: self.describe(args),
      code: output.status.code(),
      stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
  }

  /// Read-only command: failures are returned as they are.
  async fn query(&self, cancel: &Cancellation, args: &[String]) -> Result<String, EngineError> {
    let output = self.capture(cancel, args).await?;
    if !output.status.success() {
      return Err(self.failure(args, &output));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
  }

  /// Mutating command: failures are checked against engine reachability.
  async fn mutate(&self, cancel: &Cancellation, args: &[String]) -> Result<(), EngineError> {
    let output = self.capture(cancel, args).await?;
    if output.status.success() {
      return Ok(());
    }
    let failure = self.failure(args, &output);
    Err(self.diagnose(cancel, failure).await)
  }

  /// Probe the engine after `failure`; an unreachable engine means permission denied.
  async fn diagnose(&self, cancel: &Cancellation, failure: EngineError) -> EngineError {
    match self.probe(cancel).await {
      Ok(None) => failure,
      Ok(Some(detail)) => {
        warn!(engine = %self.kind, detail = %detail, "engine unreachable after failed command");
        EngineError::PermissionDenied {
          engine: self.kind.to_string(),
          detail,
        }
      }
      Err(err) => err,
    }
  }

  /// `None` when the engine answers, otherwise what it said.
  async fn probe(&self, cancel: &Cancellation) -> Result<Option<String>, EngineError> {
    let output = self.capture(cancel, &args(["info"])).await?;
    if output.status.success() {
      return Ok(None);
    }
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    Ok(Some(if stderr.is_empty() {
      format!("`{} info` failed", self.kind)
    } else {
      stderr
    }))
  }

  /// Run attached to the terminal until exit or cancellation.
  async fn attached(
    &self,
    cancel: &Cancellation,
    mut command: Command,
    args: &[String],
  ) -> Result<ExitStatus, EngineError> {
    if cancel.is_cancelled() {
      return Err(EngineError::Cancelled);
    }
    info!(command = %self.describe(args), "running attached engine command");

    let mut child = command
      .stdin(Stdio::inherit())
      .stdout(Stdio::inherit())
      .stderr(Stdio::inherit())
      .spawn()
      .map_err(|e| self.spawn_error(e))?;

    let outcome = tokio::select! {
      biased;
      _ = cancel.cancelled() => None,
      status = child.wait() => Some(status),
    };

    match outcome {
      Some(status) => status.map_err(|e| self.spawn_error(e)),
      None => {
        if let Err(e) = child.kill().await {
          warn!(error = %e, "failed to kill engine process");
        }
        Err(EngineError::Cancelled)
      }
    }
  }

  /// Exit code of a session; a failing session is only an error if the engine is unreachable.
  async fn session_exit(&self, cancel: &Cancellation, status: ExitStatus) -> Result<i32, EngineError> {
    let code = exit_code(status);
    if code != 0
      && let Some(detail) = self.probe(cancel).await?
    {
      return Err(EngineError::PermissionDenied {
        engine: self.kind.to_string(),
        detail,
      });
    }
    Ok(code)
  }

  fn compose_args(&self, project: &Project) -> Vec<String> {
    args([
      "compose".to_string(),
      "-p".to_string(),
      compose_project_name(&project.name),
      "-f".to_string(),
      project.compose_file_path.display().to_string(),
      "--env-file".to_string(),
      project.env_file_path.display().to_string(),
    ])
  }

  async fn inspect_image(&self, cancel: &Cancellation, name: &ProjectName) -> Result<Option<ImageInfo>, EngineError> {
    let reference = image_reference(name);
    let args = args(["image", "inspect", "--format", INSPECT_IMAGE_FORMAT, reference.as_str()]);
    let output = self.capture(cancel, &args).await?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      if is_missing_image(&stderr) {
        return Ok(None);
      }
      let failure = self.failure(&args, &output);
      return Err(self.diagnose(cancel, failure).await);
    }

    let text = String::from_utf8_lossy(&output.stdout);
    let (repository, tag) = naming::split_reference(&reference);
    parse::parse_inspected_image(&text, repository, tag)
      .map(Some)
      .map_err(|source| EngineError::Parse {
        command: self.describe(&args),
        source,
      })
  }

  async fn list<T>(
    &self,
    cancel: &Cancellation,
    args: Vec<String>,
    parser: fn(&str) -> Result<Vec<T>, parse::ParseError>,
  ) -> Result<Vec<T>, EngineError> {
    let text = self.query(cancel, &args).await?;
    parser(&text).map_err(|source| EngineError::Parse {
      command: self.describe(&args),
      source,
    })
  }
}

fn args<S: Into<String>>(items: impl IntoIterator<Item = S>) -> Vec<String> {
  items.into_iter().map(Into::into).collect()
}

fn is_missing_image(stderr: &str) -> bool {
  let stderr = stderr.to_ascii_lowercase();
  ["no such image", "no such object", "image not known"]
    .iter()
    .any(|needle| stderr.contains(needle))
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
  use std::os::unix::process::ExitStatusExt;
  status
    .code()
    .or_else(|| status.signal().map(|signal| 128 + signal))
    .unwrap_or(1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
  status.code().unwrap_or(1)
}

#[async_trait]
impl ContainerEngine for CliEngine {
  async fn info(&self, cancel: &Cancellation) -> Result<EngineInfo, EngineError> {
    let args = args(["--version"]);
    let text = self.query(cancel, &args).await?;
    let version = parse::parse_version_output(&text).map_err(|source| EngineError::Parse {
      command: self.describe(&args),
      source,
    })?;
    Ok(EngineInfo {
      name: self.kind.to_string(),
      version,
    })
  }

  async fn build_image(&self, cancel: &Cancellation, project: &Project, dotfiles: &Path) -> Result<(), EngineError> {
    let mut args = self.compose_args(project);
    args.push("build".to_string());

    let mut command = self.command(&args);
    command
      .env("COMPOSE_PROJECT_NAME", compose_project_name(&project.name))
      .env(DOTFILES_VAR, dotfiles);

    let status = self.attached(cancel, command, &args).await?;
    if status.success() {
      info!(project = %project.name, "image built");
      return Ok(());
    }

    let failure = EngineError::CommandFailed {
      command: self.describe(&args),
      code: status.code(),
      stderr: String::new(),
    };
    Err(self.diagnose(cancel, failure).await)
  }

  async fn run_container(&self, cancel: &Cancellation, project: &Project, extra: &[String]) -> Result<i32, EngineError> {
    let mut args = self.compose_args(project);
    args.extend(["run".to_string(), "--rm".to_string()]);
    if extra.is_empty() {
      args.extend(["--name".to_string(), leader_container_name(&project.name)]);
    }
    args.push(SERVICE_NAME.to_string());
    args.extend(extra.iter().cloned());

    let mut command = self.command(&args);
    command.env("COMPOSE_PROJECT_NAME", compose_project_name(&project.name));

    let status = self.attached(cancel, command, &args).await?;
    self.session_exit(cancel, status).await
  }

  async fn join_container(
    &self,
    cancel: &Cancellation,
    container: &ContainerInfo,
    extra: &[String],
  ) -> Result<i32, EngineError> {
    let mut args = args(["exec", "-i"]);
    if std::io::stdin().is_terminal() {
      args.push("-t".to_string());
    }
    args.push(container.id.clone());
    if extra.is_empty() {
      args.extend(["bash".to_string(), "-l".to_string()]);
    } else {
      args.extend(extra.iter().cloned());
    }

    let command = self.command(&args);
    let status = self.attached(cancel, command, &args).await?;
    self.session_exit(cancel, status).await
  }

  async fn has_been_built(&self, cancel: &Cancellation, name: &ProjectName) -> Result<bool, EngineError> {
    Ok(self.inspect_image(cancel, name).await?.is_some())
  }

  async fn get_image_info(&self, cancel: &Cancellation, name: &ProjectName) -> Result<Option<ImageInfo>, EngineError> {
    self.inspect_image(cancel, name).await
  }

  async fn list_containers(&self, cancel: &Cancellation) -> Result<Vec<ContainerInfo>, EngineError> {
    let filter = format!("name={RESOURCE_PREFIX}");
    let args = args(["ps", "--all", "--filter", filter.as_str(), "--format", CONTAINER_FORMAT]);
    self.list(cancel, args, parse::parse_containers).await
  }

  async fn list_images(&self, cancel: &Cancellation) -> Result<Vec<ImageInfo>, EngineError> {
    let filter = format!("reference={IMAGE_REPOSITORY}");
    let args = args(["images", "--filter", filter.as_str(), "--format", IMAGE_FORMAT]);
    self.list(cancel, args, parse::parse_images).await
  }

  async fn list_volumes(&self, cancel: &Cancellation) -> Result<Vec<VolumeInfo>, EngineError> {
    let filter = format!("name={RESOURCE_PREFIX}");
    let args = args(["volume", "ls", "--filter", filter.as_str(), "--format", VOLUME_FORMAT]);
    self.list(cancel, args, parse::parse_volumes).await
  }

  async fn list_networks(&self, cancel: &Cancellation) -> Result<Vec<NetworkInfo>, EngineError> {
    let filter = format!("name={RESOURCE_PREFIX}");
    let args = args(["network", "ls", "--filter", filter.as_str(), "--format", NETWORK_FORMAT]);
    self.list(cancel, args, parse::parse_networks).await
  }

  async fn remove_container(&self, cancel: &Cancellation, id: &str) -> Result<(), EngineError> {
    self.mutate(cancel, &args(["rm", "--force", id])).await
  }

  async fn remove_image(&self, cancel: &Cancellation, reference: &str) -> Result<(), EngineError> {
    self.mutate(cancel, &args(["image", "rm", reference])).await
  }

  async fn remove_volume(&self, cancel: &Cancellation, name: &str) -> Result<(), EngineError> {
    self.mutate(cancel, &args(["volume", "rm", name])).await
  }

  async fn remove_network(&self, cancel: &Cancellation, name: &str) -> Result<(), EngineError> {
    self.mutate(cancel, &args(["network", "rm", name])).await
  }

  async fn create_volume(&self, cancel: &Cancellation, name: &str) -> Result<(), EngineError> {
    self
      .mutate(cancel, &args(["volume", "create", "--label", MANAGED_LABEL, name]))
      .await
  }

  async fn prune_build_cache(&self, cancel: &Cancellation) -> Result<(), EngineError> {
    let args = match self.kind {
      EngineKind::Docker => args(["builder", "prune", "--force"]),
      EngineKind::Podman => args(["image", "prune", "--build-cache", "--force"]),
    };
    self.mutate(cancel, &args).await
  }
}
