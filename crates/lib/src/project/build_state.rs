//! The build record (`project.buildinfo`) and the rebuild decision.
//!
//! A build record captures the inputs behind the last successful build: the
//! machine it ran on, the hashes of the env and compose files, and the engine
//! that produced the image. Comparing it against the current inputs tells the
//! caller whether the image is stale and, if so, why.
//!
//! # Format
//!
//! ```text
//! VERSION=1.0.0
//! BUILT_BY=6f1c2a0e-93d4-4a53-9bd8-3f0c8f1f6a77
//! BUILD_ENV=<sha256 hex>
//! BUILD_COMPOSE=<sha256 hex>
//! LAST_BUILT_AT=2026-03-01T09:30:00Z
//! CONTAINER_ENGINE=docker
//! CONTAINER_ENGINE_VERSION=27.3.1
//! ```

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use super::error::FormatError;
use super::lock::parse_version;
use crate::util::hash::ContentHash;
use crate::util::kv::{self, KvFile};
use crate::version::Version;

const KEY_VERSION: &str = "VERSION";
const KEY_BUILT_BY: &str = "BUILT_BY";
const KEY_BUILD_ENV: &str = "BUILD_ENV";
const KEY_BUILD_COMPOSE: &str = "BUILD_COMPOSE";
const KEY_LAST_BUILT_AT: &str = "LAST_BUILT_AT";
const KEY_CONTAINER_ENGINE: &str = "CONTAINER_ENGINE";
const KEY_CONTAINER_ENGINE_VERSION: &str = "CONTAINER_ENGINE_VERSION";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildState {
  pub format_version: Version,
  /// Machine id of the host that ran the build.
  pub built_by: String,
  pub env_hash: ContentHash,
  pub compose_hash: ContentHash,
  pub built_at: DateTime<Utc>,
  pub engine_name: String,
  pub engine_version: String,
}

impl BuildState {
  pub fn parse(text: &str) -> Result<Self, FormatError> {
    let kv = KvFile::parse(text)?;
    let required = |key: &'static str| -> Result<String, FormatError> {
      kv.get(key).map(str::to_string).ok_or(FormatError::MissingField(key))
    };

    let format_version = parse_version(&kv, KEY_VERSION)?;
    let built_by = required(KEY_BUILT_BY)?;
    let env_hash = parse_hash(required(KEY_BUILD_ENV)?, KEY_BUILD_ENV)?;
    let compose_hash = parse_hash(required(KEY_BUILD_COMPOSE)?, KEY_BUILD_COMPOSE)?;
    let built_at = DateTime::parse_from_rfc3339(&required(KEY_LAST_BUILT_AT)?)
      .map_err(|e| FormatError::InvalidValue {
        field: KEY_LAST_BUILT_AT,
        reason: e.to_string(),
      })?
      .with_timezone(&Utc);

    Ok(Self {
      format_version,
      built_by,
      env_hash,
      compose_hash,
      built_at,
      engine_name: required(KEY_CONTAINER_ENGINE)?,
      engine_version: required(KEY_CONTAINER_ENGINE_VERSION)?,
    })
  }

  pub fn render(&self) -> String {
    kv::render([
      (KEY_VERSION, self.format_version.to_string()),
      (KEY_BUILT_BY, self.built_by.clone()),
      (KEY_BUILD_ENV, self.env_hash.to_string()),
      (KEY_BUILD_COMPOSE, self.compose_hash.to_string()),
      (KEY_LAST_BUILT_AT, self.built_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
      (KEY_CONTAINER_ENGINE, self.engine_name.clone()),
      (KEY_CONTAINER_ENGINE_VERSION, self.engine_version.clone()),
    ])
  }
}

fn parse_hash(value: String, field: &'static str) -> Result<ContentHash, FormatError> {
  if value.len() != 64 || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
    return Err(FormatError::InvalidValue {
      field,
      reason: format!("'{value}' is not a sha256 hex digest"),
    });
  }
  Ok(ContentHash(value.to_ascii_lowercase()))
}

/// Why an image has to be rebuilt, or that it does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RebuildReason {
  DifferentMachine,
  ComposeChanged,
  EnvChanged,
  DifferentEngine,
  NotNeeded,
}

impl RebuildReason {
  pub fn needs_rebuild(&self) -> bool {
    !matches!(self, Self::NotNeeded)
  }

  pub fn describe(&self) -> &'static str {
    match self {
      Self::DifferentMachine => "the image was built on a different machine",
      Self::ComposeChanged => "the compose file changed since the last build",
      Self::EnvChanged => "the env file changed since the last build",
      Self::DifferentEngine => "the image was built with a different container engine",
      Self::NotNeeded => "the image is up to date",
    }
  }
}

impl fmt::Display for RebuildReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.describe())
  }
}

/// The current values a build record is compared against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildInputs {
  pub machine_id: String,
  pub env_hash: ContentHash,
  pub compose_hash: ContentHash,
  pub engine_name: String,
}

/// Compare a build record against the current inputs; the first mismatch wins.
pub fn decide(state: &BuildState, current: &RebuildInputs) -> RebuildReason {
  if state.built_by != current.machine_id {
    RebuildReason::DifferentMachine
  } else if state.compose_hash != current.compose_hash {
    RebuildReason::ComposeChanged
  } else if state.env_hash != current.env_hash {
    RebuildReason::EnvChanged
  } else if state.engine_name != current.engine_name {
    RebuildReason::DifferentEngine
  } else {
    RebuildReason::NotNeeded
  }
}
