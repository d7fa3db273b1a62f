//! The real user behind the current process.
//!
//! When the tool is started through `sudo`, the process runs as root but every
//! artifact it writes belongs to the user who invoked `sudo`. [`Identity`]
//! captures that decision once at startup; [`UserFs`](super::UserFs) threads it
//! through every filesystem operation.

use std::path::PathBuf;

use serde::Serialize;
use tracing::debug;

use super::userfs::UserFsError;

/// Environment variable `sudo` sets to the invoking user's login name.
pub const ELEVATION_MARKER_VAR: &str = "SUDO_USER";

const SUPERUSER: &str = "root";

/// Numeric ownership target applied to created paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Owner {
  pub uid: u32,
  pub gid: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
  pub username: String,
  pub home: PathBuf,
  /// Present only when acting on behalf of another user.
  pub owner: Option<Owner>,
}

impl Identity {
  /// Resolve the identity from the process environment.
  pub fn detect() -> Result<Self, UserFsError> {
    Self::resolve(std::env::var(ELEVATION_MARKER_VAR).ok())
  }

  /// Resolve the identity given the value of the elevation marker.
  ///
  /// An empty marker or one naming the superuser means there is nobody to
  /// impersonate.
  pub fn resolve(elevated_for: Option<String>) -> Result<Self, UserFsError> {
    match elevated_for.filter(|name| !name.is_empty() && name != SUPERUSER) {
      Some(name) => Self::impersonating(&name),
      None => Self::current(),
    }
  }

  /// The identity of the running process, with no ownership correction.
  pub fn current() -> Result<Self, UserFsError> {
    let username = whoami::username();
    let home = dirs::home_dir()
      .filter(|home| !home.as_os_str().is_empty())
      .ok_or_else(|| UserFsError::IdentityUnresolved {
        user: username.clone(),
        reason: "no home directory for the current user".to_string(),
      })?;

    Ok(Self {
      username,
      home,
      owner: None,
    })
  }

  /// Look `name` up in the user database and target it for ownership.
  #[cfg(unix)]
  pub fn impersonating(name: &str) -> Result<Self, UserFsError> {
    use nix::unistd::User;

    let unresolved = |reason: String| UserFsError::IdentityUnresolved {
      user: name.to_string(),
      reason,
    };

    let user = User::from_name(name)
      .map_err(|e| unresolved(e.to_string()))?
      .ok_or_else(|| unresolved("no such user".to_string()))?;

    if user.dir.as_os_str().is_empty() {
      return Err(unresolved("user has no home directory".to_string()));
    }

    debug!(user = %name, uid = user.uid.as_raw(), home = %user.dir.display(), "impersonating invoking user");

    Ok(Self {
      username: user.name,
      home: user.dir,
      owner: Some(Owner {
        uid: user.uid.as_raw(),
        gid: user.gid.as_raw(),
      }),
    })
  }

  /// Elevation helpers on this platform do not hand us another user's
  /// account, so the current one is used as-is.
  #[cfg(not(unix))]
  pub fn impersonating(name: &str) -> Result<Self, UserFsError> {
    debug!(user = %name, "ignoring elevation marker on this platform");
    Self::current()
  }

  /// Build an impersonating identity from known values.
  pub fn with_owner(username: impl Into<String>, home: impl Into<PathBuf>, owner: Owner) -> Self {
    Self {
      username: username.into(),
      home: home.into(),
      owner: Some(owner),
    }
  }

  /// Build a non-impersonating identity rooted at `home`.
  pub fn with_home(username: impl Into<String>, home: impl Into<PathBuf>) -> Self {
    Self {
      username: username.into(),
      home: home.into(),
      owner: None,
    }
  }

  pub fn is_impersonating(&self) -> bool {
    self.owner.is_some()
  }
}
