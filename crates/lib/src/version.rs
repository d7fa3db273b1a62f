//! Three-part compatibility tokens stamped into on-disk files.
//!
//! A [`Version`] is compared lexicographically on `(major, minor, patch)`.
//! The text form is exactly `X.Y.Z`; pre-release or build suffixes are
//! rejected rather than ignored.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
  #[error("invalid version format '{0}', expected X.Y.Z")]
  InvalidFormat(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
  pub major: u64,
  pub minor: u64,
  pub patch: u64,
}

impl Version {
  pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
    Self { major, minor, patch }
  }

  pub fn parse(text: &str) -> Result<Self, VersionError> {
    let invalid = || VersionError::InvalidFormat(text.to_string());

    let mut parts = text.split('.');
    let mut next = || -> Result<u64, VersionError> {
      let part = parts.next().ok_or_else(invalid)?;
      if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
      }
      part.parse().map_err(|_| invalid())
    };

    let version = Self::new(next()?, next()?, next()?);
    if parts.next().is_some() {
      return Err(invalid());
    }
    Ok(version)
  }

  /// True when `self` shares `base`'s major version and is not older than it.
  pub fn is_compatible_with_base(&self, base: &Version) -> bool {
    self.major == base.major && base <= self
  }
}

impl fmt::Display for Version {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
  }
}

impl FromStr for Version {
  type Err = VersionError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse(s)
  }
}

impl Serialize for Version {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}
