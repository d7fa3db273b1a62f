//! Content materialized into the data directory and each project directory.
//!
//! The Dockerfile and entrypoint are shared by every project and are only
//! written when absent, so local edits survive. The `.env` and compose files
//! are rendered per project from [`EnvData`] and [`ComposeData`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::name::ProjectName;
use crate::consts::{DOCKERFILE_FILENAME, IMAGE_REPOSITORY, RESOURCE_PREFIX, SERVICE_NAME};
use crate::platform::Identity;
use crate::util::kv;

/// Base image definition. Bump `BASE_IMAGE_DEFINITION_VERSION` when changing it.
pub const DOCKERFILE: &str = r#"FROM ubuntu:24.04

ARG USER_UID=1000
ARG USER_GID=1000
ARG DOTFILES_DIR=dotfiles

ENV DEBIAN_FRONTEND=noninteractive

RUN apt-get update \
    && apt-get install -y --no-install-recommends \
       bash-completion ca-certificates curl git less openssh-client sudo vim \
    && rm -rf /var/lib/apt/lists/*

RUN if getent passwd "${USER_UID}" >/dev/null; then userdel -r "$(getent passwd "${USER_UID}" | cut -d: -f1)"; fi \
    && if ! getent group "${USER_GID}" >/dev/null; then groupadd --gid "${USER_GID}" dev; fi \
    && useradd --uid "${USER_UID}" --gid "${USER_GID}" --create-home --shell /bin/bash dev \
    && echo "dev ALL=(ALL) NOPASSWD:ALL" > /etc/sudoers.d/dev \
    && chmod 0440 /etc/sudoers.d/dev

COPY --chown=${USER_UID}:${USER_GID} ${DOTFILES_DIR} /opt/devcell/dotfiles
COPY entrypoint.sh /usr/local/bin/devcell-entrypoint
RUN chmod 0755 /usr/local/bin/devcell-entrypoint

USER dev
WORKDIR /home/dev

ENTRYPOINT ["/usr/local/bin/devcell-entrypoint"]
CMD ["bash", "-l"]
"#;

/// Links staged dotfiles into the home volume on first start, then execs the command.
pub const ENTRYPOINT: &str = r#"#!/bin/sh
set -e

DOTFILES_SRC=/opt/devcell/dotfiles
MARKER="$HOME/.devcell-dotfiles-installed"

if [ -d "$DOTFILES_SRC" ] && [ ! -e "$MARKER" ]; then
  for entry in "$DOTFILES_SRC"/.[!.]* "$DOTFILES_SRC"/*; do
    [ -e "$entry" ] || continue
    name=$(basename "$entry")
    if [ ! -e "$HOME/$name" ]; then
      ln -s "$entry" "$HOME/$name"
    fi
  done
  if [ -x "$DOTFILES_SRC/install.sh" ]; then
    "$DOTFILES_SRC/install.sh"
  fi
  touch "$MARKER"
fi

exec "$@"
"#;

/// Mount point of the project's host directory inside the container.
pub fn workspace_dir(name: &ProjectName) -> String {
  format!("/workspace/{name}")
}

/// Values written to a project's `.env` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvData {
  pub project_path: PathBuf,
  pub user_id: u32,
  pub group_id: u32,
}

impl EnvData {
  pub fn new(project_path: impl Into<PathBuf>, user_id: u32, group_id: u32) -> Self {
    Self {
      project_path: project_path.into(),
      user_id,
      group_id,
    }
  }

  /// Use the ids `identity` owns files as, so the container user matches the host user.
  pub fn for_identity(project_path: impl Into<PathBuf>, identity: &Identity) -> Self {
    let (user_id, group_id) = match identity.owner {
      Some(owner) => (owner.uid, owner.gid),
      None => process_ids(),
    };
    Self::new(project_path, user_id, group_id)
  }
}

#[cfg(unix)]
fn process_ids() -> (u32, u32) {
  (nix::unistd::getuid().as_raw(), nix::unistd::getgid().as_raw())
}

#[cfg(not(unix))]
fn process_ids() -> (u32, u32) {
  (1000, 1000)
}

/// User-supplied additions to the generated compose service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposeData {
  /// `host:container` port mappings.
  pub ports: Vec<String>,
  /// `source:target[:mode]` mounts; a source that is not a path declares a named volume.
  pub volumes: Vec<String>,
  pub environment: BTreeMap<String, String>,
}

pub fn render_env(name: &ProjectName, data: &EnvData) -> String {
  let project_path = data.project_path.to_string_lossy();
  kv::render([
    ("COMPOSE_PROJECT_NAME", kv::quote(&compose_project_name(name))),
    ("PROJECT_NAME", kv::quote(name.as_str())),
    ("PROJECT_PATH", kv::quote(&project_path)),
    ("WORKSPACE_DIR", kv::quote(&workspace_dir(name))),
    ("HOST_UID", kv::quote(&data.user_id.to_string())),
    ("HOST_GID", kv::quote(&data.group_id.to_string())),
  ])
}

/// Compose project name, which also prefixes every resource compose creates.
pub fn compose_project_name(name: &ProjectName) -> String {
  format!("{RESOURCE_PREFIX}-{name}")
}

pub fn image_reference(name: &ProjectName) -> String {
  format!("{IMAGE_REPOSITORY}:{name}")
}

#[derive(Serialize)]
struct ComposeFile {
  services: BTreeMap<&'static str, Service>,
  volumes: BTreeMap<String, NamedVolume>,
}

#[derive(Serialize)]
struct Service {
  image: String,
  build: BuildSection,
  volumes: Vec<String>,
  working_dir: String,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  ports: Vec<String>,
  #[serde(skip_serializing_if = "BTreeMap::is_empty")]
  environment: BTreeMap<String, String>,
  stdin_open: bool,
  tty: bool,
}

#[derive(Serialize)]
struct BuildSection {
  context: String,
  dockerfile: &'static str,
  args: BTreeMap<&'static str, &'static str>,
}

#[derive(Serialize)]
struct NamedVolume {}

/// Render the compose file. `build_context` is the data directory holding the
/// shared Dockerfile and the staged dotfiles.
pub fn render_compose(name: &ProjectName, build_context: &Path, data: &ComposeData) -> Result<String, serde_yaml::Error> {
  let mut volumes = vec!["${PROJECT_PATH}:${WORKSPACE_DIR}".to_string(), "home:/home/dev".to_string()];
  volumes.extend(data.volumes.iter().cloned());

  let mut named = BTreeMap::new();
  named.insert("home".to_string(), NamedVolume {});
  for spec in &data.volumes {
    if let Some(volume) = named_volume(spec) {
      named.insert(volume.to_string(), NamedVolume {});
    }
  }

  let args = BTreeMap::from([
    ("USER_UID", "${HOST_UID}"),
    ("USER_GID", "${HOST_GID}"),
    ("DOTFILES_DIR", "${DEVCELL_DOTFILES:-dotfiles}"),
  ]);

  let service = Service {
    image: image_reference(name),
    build: BuildSection {
      context: build_context.to_string_lossy().into_owned(),
      dockerfile: DOCKERFILE_FILENAME,
      args,
    },
    volumes,
    working_dir: "${WORKSPACE_DIR}".to_string(),
    ports: data.ports.clone(),
    environment: data.environment.clone(),
    stdin_open: true,
    tty: true,
  };

  serde_yaml::to_string(&ComposeFile {
    services: BTreeMap::from([(SERVICE_NAME, service)]),
    volumes: named,
  })
}

/// The volume name in `spec` when its source is not a host path.
fn named_volume(spec: &str) -> Option<&str> {
  let (source, _) = spec.split_once(':')?;
  let is_path = source.starts_with(['/', '.', '~', '$']) || source.contains(['/', '\\']);
  (!source.is_empty() && !is_path).then_some(source)
}
