//! Filesystem access on behalf of the real invoking user.
//!
//! Every path created through [`UserFs`] ends up owned by the identity it was
//! built with. When that identity impersonates another account (the process
//! runs under `sudo`), each created directory, file and symlink is chowned to
//! the account's uid/gid right after creation. If the chown fails, whatever
//! was newly created is removed again before the error is returned.
//!
//! # Directory resolution
//!
//! | platform | data dir                               | config dir                          |
//! |----------|----------------------------------------|-------------------------------------|
//! | Windows  | `%LOCALAPPDATA%` (`~\AppData\Local`)   | `%APPDATA%` (`~\AppData\Roaming`)   |
//! | macOS    | `~/Library/Application Support`        | `~/Library/Preferences`             |
//! | other    | `$XDG_DATA_HOME` (`~/.local/share`)    | `$XDG_CONFIG_HOME` (`~/.config`)    |
//!
//! Under impersonation the XDG variables are ignored: `sudo` does not reliably
//! carry the invoking user's environment over, so the defaults relative to
//! the impersonated home are used.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

use super::identity::{Identity, Owner};
use super::os::Os;
use crate::cancel::Cancellation;
use crate::consts::{APP_NAME, COPY_CHUNK_SIZE};

#[derive(Debug, Error)]
pub enum UserFsError {
  #[error("cannot resolve user {user}: {reason}")]
  IdentityUnresolved { user: String, reason: String },

  #[error("failed to create directory {}: {source}", path.display())]
  CreateDir { path: PathBuf, source: io::Error },

  #[error("failed to write file {}: {source}", path.display())]
  WriteFile { path: PathBuf, source: io::Error },

  #[error("failed to read {}: {source}", path.display())]
  Read { path: PathBuf, source: io::Error },

  #[error("failed to create symlink {}: {source}", path.display())]
  CreateSymlink { path: PathBuf, source: io::Error },

  #[error("failed to change owner of {} to {}:{}: {source}", path.display(), owner.uid, owner.gid)]
  Chown {
    path: PathBuf,
    owner: Owner,
    source: io::Error,
  },

  #[error("failed to walk {}: {source}", path.display())]
  Walk { path: PathBuf, source: walkdir::Error },

  #[error("operation cancelled")]
  Cancelled,
}

#[derive(Debug, Clone)]
pub struct UserFs {
  identity: Identity,
  os: Os,
}

impl UserFs {
  pub fn new(identity: Identity) -> Self {
    Self::with_os(identity, Os::current())
  }

  /// Resolve the identity from the environment (see [`Identity::detect`]).
  pub fn detect() -> Result<Self, UserFsError> {
    Ok(Self::new(Identity::detect()?))
  }

  /// Use `os`'s directory convention instead of the running platform's.
  pub fn with_os(identity: Identity, os: Os) -> Self {
    Self { identity, os }
  }

  pub fn identity(&self) -> &Identity {
    &self.identity
  }

  pub fn home_dir(&self) -> &Path {
    &self.identity.home
  }

  /// Application data directory (`<data root>/devcell`).
  pub fn data_dir(&self) -> PathBuf {
    self.data_root().join(APP_NAME)
  }

  /// Application config directory (`<config root>/devcell`).
  pub fn config_dir(&self) -> PathBuf {
    self.config_root().join(APP_NAME)
  }

  fn data_root(&self) -> PathBuf {
    let home = self.home_dir();
    match self.os {
      Os::Windows => env_path("LOCALAPPDATA").unwrap_or_else(|| home.join("AppData").join("Local")),
      Os::MacOs => home.join("Library").join("Application Support"),
      Os::Other => self
        .xdg_override("XDG_DATA_HOME")
        .unwrap_or_else(|| home.join(".local").join("share")),
    }
  }

  fn config_root(&self) -> PathBuf {
    let home = self.home_dir();
    match self.os {
      Os::Windows => env_path("APPDATA").unwrap_or_else(|| home.join("AppData").join("Roaming")),
      Os::MacOs => home.join("Library").join("Preferences"),
      Os::Other => self.xdg_override("XDG_CONFIG_HOME").unwrap_or_else(|| home.join(".config")),
    }
  }

  fn xdg_override(&self, var: &str) -> Option<PathBuf> {
    if self.identity.is_impersonating() {
      return None;
    }
    // Relative XDG paths are invalid and must be ignored.
    env_path(var).filter(|path| path.is_absolute())
  }

  fn owner(&self) -> Option<Owner> {
    self.identity.owner.filter(|_| self.os.supports_ownership())
  }

  /// Create `path` and any missing parents with `mode`.
  pub fn mkdir_as_user(&self, path: &Path, mode: u32) -> Result<(), UserFsError> {
    if path.is_dir() {
      return Ok(());
    }

    let topmost = topmost_missing(path);
    create_dir_all(path, mode).map_err(|source| UserFsError::CreateDir {
      path: path.to_path_buf(),
      source,
    })?;

    let Some(owner) = self.owner() else {
      return Ok(());
    };

    for dir in path.ancestors().take_while(|dir| dir.starts_with(&topmost)) {
      if let Err(source) = chown(dir, owner, false) {
        remove_created(&topmost);
        return Err(UserFsError::Chown {
          path: dir.to_path_buf(),
          owner,
          source,
        });
      }
    }

    Ok(())
  }

  /// Write `contents` to `path` (truncating), creating it with `mode`.
  pub fn write_file_as_user(&self, path: &Path, contents: &[u8], mode: u32) -> Result<(), UserFsError> {
    let existed = path.symlink_metadata().is_ok();
    let write_err = |source| UserFsError::WriteFile {
      path: path.to_path_buf(),
      source,
    };

    let mut file = create_file(path, mode).map_err(write_err)?;
    self.take_ownership(path, existed, false)?;
    file.write_all(contents).map_err(write_err)?;
    file.flush().map_err(write_err)
  }

  /// Mirror the tree at `src` into `dst`.
  ///
  /// Symlinks are recreated, not followed. Cancellation is checked before
  /// every entry and every chunk write; a cancelled copy leaves what was
  /// already written in place.
  pub fn copy_dir_as_user(&self, cancel: &Cancellation, src: &Path, dst: &Path) -> Result<(), UserFsError> {
    self.copy_tree(cancel, src, dst, |_| {})
  }

  pub(crate) fn copy_tree<F>(&self, cancel: &Cancellation, src: &Path, dst: &Path, mut on_entry: F) -> Result<(), UserFsError>
  where
    F: FnMut(&Path),
  {
    debug!(src = %src.display(), dst = %dst.display(), "copying directory tree");

    for entry in WalkDir::new(src).follow_links(false).sort_by_file_name() {
      if cancel.is_cancelled() {
        return Err(UserFsError::Cancelled);
      }

      let entry = entry.map_err(|source| UserFsError::Walk {
        path: src.to_path_buf(),
        source,
      })?;
      let Ok(relative) = entry.path().strip_prefix(src) else {
        continue;
      };
      let target = dst.join(relative);
      on_entry(entry.path());

      let file_type = entry.file_type();
      if file_type.is_dir() {
        let mode = source_mode(&entry, 0o755);
        self.mkdir_as_user(&target, mode)?;
      } else if file_type.is_symlink() {
        self.copy_symlink(entry.path(), &target)?;
      } else if file_type.is_file() {
        let mode = source_mode(&entry, 0o644);
        self.copy_file(cancel, entry.path(), &target, mode)?;
      } else {
        warn!(path = %entry.path().display(), "skipping special file");
      }
    }

    Ok(())
  }

  fn copy_file(&self, cancel: &Cancellation, src: &Path, dst: &Path, mode: u32) -> Result<(), UserFsError> {
    trace!(src = %src.display(), dst = %dst.display(), "copying file");

    let existed = dst.symlink_metadata().is_ok();
    let read_err = |source| UserFsError::Read {
      path: src.to_path_buf(),
      source,
    };
    let write_err = |source| UserFsError::WriteFile {
      path: dst.to_path_buf(),
      source,
    };

    let mut reader = File::open(src).map_err(read_err)?;
    let mut writer = create_file(dst, mode).map_err(write_err)?;
    // Owned before the first chunk so a partial file never stays root's.
    self.take_ownership(dst, existed, false)?;
    let mut buffer = vec![0u8; COPY_CHUNK_SIZE];

    loop {
      let read = reader.read(&mut buffer).map_err(read_err)?;
      if read == 0 {
        break;
      }
      if cancel.is_cancelled() {
        return Err(UserFsError::Cancelled);
      }
      writer.write_all(&buffer[..read]).map_err(write_err)?;
    }
    writer.flush().map_err(write_err)
  }

  fn copy_symlink(&self, src: &Path, dst: &Path) -> Result<(), UserFsError> {
    let link_target = fs::read_link(src).map_err(|source| UserFsError::Read {
      path: src.to_path_buf(),
      source,
    })?;

    let existed = dst.symlink_metadata().is_ok();
    let link_err = |source| UserFsError::CreateSymlink {
      path: dst.to_path_buf(),
      source,
    };
    if existed {
      fs::remove_file(dst).map_err(link_err)?;
    }
    create_symlink(&link_target, dst).map_err(link_err)?;

    self.take_ownership(dst, existed, true)
  }

  fn take_ownership(&self, path: &Path, existed: bool, is_link: bool) -> Result<(), UserFsError> {
    let Some(owner) = self.owner() else {
      return Ok(());
    };

    chown(path, owner, is_link).map_err(|source| {
      if !existed {
        remove_created(path);
      }
      UserFsError::Chown {
        path: path.to_path_buf(),
        owner,
        source,
      }
    })
  }
}

fn env_path(var: &str) -> Option<PathBuf> {
  std::env::var_os(var).filter(|value| !value.is_empty()).map(PathBuf::from)
}

/// The highest ancestor of `path` (or `path` itself) that does not exist yet.
fn topmost_missing(path: &Path) -> PathBuf {
  let mut topmost = path.to_path_buf();
  for ancestor in path.ancestors().skip(1) {
    if ancestor.as_os_str().is_empty() || ancestor.symlink_metadata().is_ok() {
      break;
    }
    topmost = ancestor.to_path_buf();
  }
  topmost
}

fn remove_created(path: &Path) {
  let result = match path.symlink_metadata() {
    Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
    Ok(_) => fs::remove_file(path),
    Err(_) => return,
  };
  if let Err(e) = result {
    warn!(path = %path.display(), error = %e, "failed to remove partially created path");
  }
}

#[cfg(unix)]
fn create_dir_all(path: &Path, mode: u32) -> io::Result<()> {
  use std::os::unix::fs::DirBuilderExt;
  fs::DirBuilder::new().recursive(true).mode(mode).create(path)
}

#[cfg(not(unix))]
fn create_dir_all(path: &Path, _mode: u32) -> io::Result<()> {
  fs::create_dir_all(path)
}

#[cfg(unix)]
fn create_file(path: &Path, mode: u32) -> io::Result<File> {
  use std::os::unix::fs::OpenOptionsExt;
  OpenOptions::new().write(true).create(true).truncate(true).mode(mode).open(path)
}

#[cfg(not(unix))]
fn create_file(path: &Path, _mode: u32) -> io::Result<File> {
  OpenOptions::new().write(true).create(true).truncate(true).open(path)
}

#[cfg(unix)]
fn source_mode(entry: &walkdir::DirEntry, default: u32) -> u32 {
  use std::os::unix::fs::PermissionsExt;
  entry
    .metadata()
    .map(|meta| meta.permissions().mode() & 0o7777)
    .unwrap_or(default)
}

#[cfg(not(unix))]
fn source_mode(_entry: &walkdir::DirEntry, default: u32) -> u32 {
  default
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
  std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
  let resolved = link.parent().map(|parent| parent.join(target)).unwrap_or_else(|| target.to_path_buf());
  if resolved.is_dir() {
    std::os::windows::fs::symlink_dir(target, link)
  } else {
    std::os::windows::fs::symlink_file(target, link)
  }
}

/// Hand `path` to `owner`. Symlinks are changed themselves, never their target.
#[cfg(unix)]
fn chown(path: &Path, owner: Owner, is_link: bool) -> io::Result<()> {
  use nix::unistd::{Gid, Uid};

  let uid = Uid::from_raw(owner.uid);
  let gid = Gid::from_raw(owner.gid);
  if is_link {
    std::os::unix::fs::lchown(path, Some(owner.uid), Some(owner.gid))
  } else {
    nix::unistd::chown(path, Some(uid), Some(gid)).map_err(io::Error::from)
  }
}

#[cfg(not(unix))]
fn chown(_path: &Path, _owner: Owner, _is_link: bool) -> io::Result<()> {
  Ok(())
}
