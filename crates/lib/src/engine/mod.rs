//! Container engine abstraction.
//!
//! [`ContainerEngine`] is everything the rest of the crate needs from an
//! engine: build and run a project's image, attach to its leader container,
//! and inventory or clean up the resources this tool created. Every call
//! takes a [`Cancellation`]; a cancelled call kills the engine process it
//! started and returns [`EngineError::Cancelled`].
//!
//! [`cli::CliEngine`] is the only implementation and drives the `docker` or
//! `podman` executable.

pub mod cli;
pub mod naming;
pub mod parse;

use std::io;
use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub use cli::{CliEngine, EngineKind};
pub use parse::ParseError;

use crate::cancel::Cancellation;
use crate::project::{Project, ProjectName};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineInfo {
  /// `docker` or `podman`; recorded in the build record.
  pub name: String,
  pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageInfo {
  pub id: String,
  pub repository: String,
  pub tag: String,
  pub created: String,
  pub size: String,
  pub project: Option<ProjectName>,
}

impl ImageInfo {
  pub fn reference(&self) -> String {
    format!("{}:{}", self.repository, self.tag)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerInfo {
  pub id: String,
  pub name: String,
  pub image: String,
  pub state: String,
  pub status: String,
  pub project: Option<ProjectName>,
}

impl ContainerInfo {
  pub fn is_running(&self) -> bool {
    self.state.eq_ignore_ascii_case("running")
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeInfo {
  pub name: String,
  pub driver: String,
  pub project: Option<ProjectName>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkInfo {
  pub id: String,
  pub name: String,
  pub driver: String,
  pub project: Option<ProjectName>,
}

#[derive(Debug, Error)]
pub enum EngineError {
  #[error("container engine '{program}' is not installed or not on PATH")]
  EngineUnavailable {
    program: String,
    #[source]
    source: io::Error,
  },

  #[error("permission denied talking to {engine}: {detail}")]
  PermissionDenied { engine: String, detail: String },

  #[error("`{command}` failed{}", failure_suffix(.code, .stderr))]
  CommandFailed {
    command: String,
    code: Option<i32>,
    stderr: String,
  },

  #[error("unexpected output from `{command}`: {source}")]
  Parse {
    command: String,
    #[source]
    source: ParseError,
  },

  #[error("failed to run {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: io::Error,
  },

  #[error("operation cancelled")]
  Cancelled,
}

fn failure_suffix(code: &Option<i32>, stderr: &str) -> String {
  let mut suffix = String::new();
  if let Some(code) = code {
    suffix.push_str(&format!(" with exit code {code}"));
  }
  let stderr = stderr.trim();
  if !stderr.is_empty() {
    suffix.push_str(": ");
    suffix.push_str(stderr);
  }
  suffix
}

impl EngineError {
  pub fn is_permission_denied(&self) -> bool {
    matches!(self, Self::PermissionDenied { .. })
  }
}

#[async_trait]
pub trait ContainerEngine: Send + Sync {
  /// Engine name and client version.
  async fn info(&self, cancel: &Cancellation) -> Result<EngineInfo, EngineError>;

  /// Build the project's image. `dotfiles` is relative to the build context.
  async fn build_image(&self, cancel: &Cancellation, project: &Project, dotfiles: &Path) -> Result<(), EngineError>;

  /// Start the leader session. Interactive when `args` is empty, otherwise
  /// runs `args` once. Returns the session's exit code.
  async fn run_container(&self, cancel: &Cancellation, project: &Project, args: &[String]) -> Result<i32, EngineError>;

  /// Open another session in a running leader container.
  async fn join_container(
    &self,
    cancel: &Cancellation,
    container: &ContainerInfo,
    args: &[String],
  ) -> Result<i32, EngineError>;

  /// Whether the project's image exists. A missing image is `Ok(false)`.
  async fn has_been_built(&self, cancel: &Cancellation, name: &ProjectName) -> Result<bool, EngineError>;

  async fn get_image_info(&self, cancel: &Cancellation, name: &ProjectName) -> Result<Option<ImageInfo>, EngineError>;

  async fn list_containers(&self, cancel: &Cancellation) -> Result<Vec<ContainerInfo>, EngineError>;
  async fn list_images(&self, cancel: &Cancellation) -> Result<Vec<ImageInfo>, EngineError>;
  async fn list_volumes(&self, cancel: &Cancellation) -> Result<Vec<VolumeInfo>, EngineError>;
  async fn list_networks(&self, cancel: &Cancellation) -> Result<Vec<NetworkInfo>, EngineError>;

  async fn remove_container(&self, cancel: &Cancellation, id: &str) -> Result<(), EngineError>;
  async fn remove_image(&self, cancel: &Cancellation, reference: &str) -> Result<(), EngineError>;
  async fn remove_volume(&self, cancel: &Cancellation, name: &str) -> Result<(), EngineError>;
  async fn remove_network(&self, cancel: &Cancellation, name: &str) -> Result<(), EngineError>;

  async fn create_volume(&self, cancel: &Cancellation, name: &str) -> Result<(), EngineError>;

  /// Drop the engine's whole build cache.
  ///
  /// Neither docker's `builder prune` nor podman's build-cache prune can
  /// filter by label, so this also clears cache left by builds that are not
  /// devcell's.
  async fn prune_build_cache(&self, cancel: &Cancellation) -> Result<(), EngineError>;
}
