//! The project lock file (`project.lock`).
//!
//! Records which schema revisions a project's files were created under. It is
//! written once when the project is created and never updated; a project whose
//! lock this binary cannot accept is unusable rather than silently upgraded.
//!
//! # Format
//!
//! ```text
//! VERSION=1.0.0
//! DOCKERFILE_VERSION=1.1.0
//! ```

use serde::Serialize;

use super::error::FormatError;
use crate::consts::{BASE_IMAGE_DEFINITION_VERSION, LOCK_FORMAT_VERSION};
use crate::util::kv::{self, KvFile};
use crate::version::Version;

const KEY_VERSION: &str = "VERSION";
const KEY_DOCKERFILE_VERSION: &str = "DOCKERFILE_VERSION";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProjectLock {
  pub lock_format_version: Version,
  pub base_image_definition_version: Version,
}

impl ProjectLock {
  /// A lock stamped with the versions this binary writes.
  pub fn current() -> Self {
    Self {
      lock_format_version: LOCK_FORMAT_VERSION,
      base_image_definition_version: BASE_IMAGE_DEFINITION_VERSION,
    }
  }

  pub fn parse(text: &str) -> Result<Self, FormatError> {
    let kv = KvFile::parse(text)?;
    Ok(Self {
      lock_format_version: parse_version(&kv, KEY_VERSION)?,
      base_image_definition_version: parse_version(&kv, KEY_DOCKERFILE_VERSION)?,
    })
  }

  pub fn render(&self) -> String {
    kv::render([
      (KEY_VERSION, self.lock_format_version.to_string()),
      (KEY_DOCKERFILE_VERSION, self.base_image_definition_version.to_string()),
    ])
  }
}

/// The `VERSION` field alone, for files that no longer parse in full.
pub(crate) fn peek_format_version(text: &str) -> Option<Version> {
  let kv = KvFile::parse(text).ok()?;
  parse_version(&kv, KEY_VERSION).ok()
}

pub(crate) fn parse_version(kv: &KvFile, key: &'static str) -> Result<Version, FormatError> {
  let raw = kv.get(key).ok_or(FormatError::MissingField(key))?;
  Version::parse(raw).map_err(|e| FormatError::version(key, e))
}
