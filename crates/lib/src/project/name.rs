//! Project identifiers.
//!
//! Names double as directory names and as part of engine resource names
//! (`devcell-<name>`, `devcell:<name>`), so they are restricted to what every
//! engine accepts there: lowercase ASCII letters, digits and `-`, starting
//! with a letter or digit. `_` is reserved as the separator compose places
//! between a project and its volume or network names, and names ending the
//! way compose suffixes its container names (`-dev-1`, `-dev-run-<id>`) are
//! refused so a leader container never reads as another project's.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

use crate::engine::naming::strip_compose_suffix;

const MAX_LEN: usize = 48;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectNameError {
  #[error("project name is empty")]
  Empty,

  #[error("project name '{0}' is longer than {MAX_LEN} characters")]
  TooLong(String),

  #[error("project name '{0}' may only contain lowercase letters, digits and '-', and must start with a letter or digit")]
  InvalidCharacters(String),

  #[error("project name '{0}' ends like a container name the engine generates (for example '-dev-1')")]
  ReservedSuffix(String),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ProjectName(String);

impl ProjectName {
  pub fn parse(name: &str) -> Result<Self, ProjectNameError> {
    if name.is_empty() {
      return Err(ProjectNameError::Empty);
    }
    if name.len() > MAX_LEN {
      return Err(ProjectNameError::TooLong(name.to_string()));
    }

    let valid_char = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-';
    let starts_ok = name.chars().next().is_some_and(|c| c != '-');
    if !starts_ok || !name.chars().all(valid_char) {
      return Err(ProjectNameError::InvalidCharacters(name.to_string()));
    }
    if strip_compose_suffix(name, '-').is_some() {
      return Err(ProjectNameError::ReservedSuffix(name.to_string()));
    }

    Ok(Self(name.to_string()))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for ProjectName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl FromStr for ProjectName {
  type Err = ProjectNameError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse(s)
  }
}

impl AsRef<str> for ProjectName {
  fn as_ref(&self) -> &str {
    &self.0
  }
}
