use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::name::{ProjectName, ProjectNameError};
use crate::platform::UserFsError;
use crate::util::hash::HashFileError;
use crate::util::kv::KvError;
use crate::version::{Version, VersionError};

/// Problems with the contents of a `KEY=value` project file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
  #[error(transparent)]
  Syntax(#[from] KvError),

  #[error("missing field {0}")]
  MissingField(&'static str),

  #[error("invalid {field}: {reason}")]
  InvalidValue { field: &'static str, reason: String },
}

impl FormatError {
  pub(crate) fn version(field: &'static str, err: VersionError) -> Self {
    Self::InvalidValue {
      field,
      reason: err.to_string(),
    }
  }
}

#[derive(Debug, Error)]
pub enum StoreError {
  #[error(transparent)]
  InvalidName(#[from] ProjectNameError),

  #[error("project '{name}' already exists at {}", path.display())]
  AlreadyExists { name: ProjectName, path: PathBuf },

  #[error("{} does not exist", path.display())]
  Missing { path: PathBuf },

  #[error("{} is corrupted: {reason}", path.display())]
  Corrupted { path: PathBuf, reason: String },

  #[error("{} is missing the {field} field", path.display())]
  MissingField { path: PathBuf, field: &'static str },

  #[error("project lock format {found} is not supported by this version (expects {supported})")]
  IncompatibleLockFormat { found: Version, supported: Version },

  #[error("project was created for base image definition {found}, this version provides {supported}")]
  IncompatibleBaseDefinition { found: Version, supported: Version },

  #[error("build record format {found} is not supported by this version (expects {supported})")]
  IncompatibleBuildState { found: Version, supported: Version },

  #[error("failed to read {}: {source}", path.display())]
  Read { path: PathBuf, source: io::Error },

  #[error("failed to remove {}: {source}", path.display())]
  Remove { path: PathBuf, source: io::Error },

  #[error("failed to move {} into place: {source}", path.display())]
  Rename { path: PathBuf, source: io::Error },

  #[error("failed to render compose file: {0}")]
  Render(#[source] serde_yaml::Error),

  #[error(transparent)]
  UserFs(#[from] UserFsError),

  #[error(transparent)]
  Hash(#[from] HashFileError),
}

impl StoreError {
  pub(crate) fn from_format(path: PathBuf, err: FormatError) -> Self {
    match err {
      FormatError::MissingField(field) => Self::MissingField { path, field },
      other => Self::Corrupted {
        path,
        reason: other.to_string(),
      },
    }
  }

  pub(crate) fn read(path: PathBuf, source: io::Error) -> Self {
    if source.kind() == io::ErrorKind::NotFound {
      Self::Missing { path }
    } else {
      Self::Read { path, source }
    }
  }

  /// True when a build record should be treated as "never built": it is
  /// absent, or it was written in a format this binary does not trust.
  pub fn is_absent(&self) -> bool {
    matches!(self, Self::Missing { .. } | Self::IncompatibleBuildState { .. })
  }

  pub fn is_cancelled(&self) -> bool {
    matches!(self, Self::UserFs(UserFsError::Cancelled))
  }
}
