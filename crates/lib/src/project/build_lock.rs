//! Per-project advisory lock held while an image is being built.
//!
//! Two concurrent builds of the same project would race on the build record
//! and on the engine's compose project. The lock is a non-blocking exclusive
//! `flock` (`LockFileEx` on Windows) on `<project>/.build.lock`; the file body
//! names the holder so a contended caller can report who has it.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::BUILD_LOCK_FILENAME;
use crate::platform::{UserFs, UserFsError};

const METADATA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildLockMetadata {
  pub version: u32,
  pub pid: u32,
  pub started_at: DateTime<Utc>,
  pub command: String,
  pub project: String,
}

#[derive(Debug, Error)]
pub enum BuildLockError {
  #[error(
    "project {project} is being built by another process: {command} (PID {pid}, started {started_at})\n\
     If no devcell process is running, remove the lock file:\n  {}",
    lock_path.display()
  )]
  Contention {
    project: String,
    command: String,
    pid: u32,
    started_at: DateTime<Utc>,
    lock_path: PathBuf,
  },

  #[error(
    "project is locked by another process (could not read lock metadata)\n\
     If no devcell process is running, remove the lock file:\n  {}",
    lock_path.display()
  )]
  ContentionUnknown { lock_path: PathBuf },

  #[error("failed to create lock file: {0}")]
  Create(#[from] UserFsError),

  #[error("failed to open lock file {}: {source}", path.display())]
  Open { path: PathBuf, source: io::Error },

  #[error("failed to write lock metadata: {0}")]
  WriteMetadata(#[source] io::Error),

  #[error("failed to acquire lock: {0}")]
  LockFailed(#[source] io::Error),
}

/// Released when dropped.
#[derive(Debug)]
pub struct BuildLock {
  file: File,
  lock_path: PathBuf,
}

impl BuildLock {
  /// Lock `project_dir`, which must already exist.
  pub fn acquire(userfs: &UserFs, project_dir: &Path, project: &str, command: &str) -> Result<Self, BuildLockError> {
    let lock_path = project_dir.join(BUILD_LOCK_FILENAME);
    if lock_path.symlink_metadata().is_err() {
      userfs.write_file_as_user(&lock_path, b"", 0o644)?;
    }

    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .truncate(false)
      .open(&lock_path)
      .map_err(|source| BuildLockError::Open {
        path: lock_path.clone(),
        source,
      })?;

    if let Err(err) = try_lock(&file) {
      if err.kind() == io::ErrorKind::WouldBlock {
        return Err(read_contention_error(&lock_path));
      }
      return Err(BuildLockError::LockFailed(err));
    }

    write_metadata(&file, project, command)?;
    debug!(project, path = %lock_path.display(), "acquired build lock");

    Ok(Self { file, lock_path })
  }

  /// Read back the metadata through the held handle.
  pub fn read_metadata(&self) -> io::Result<BuildLockMetadata> {
    let mut file = &self.file;
    file.seek(SeekFrom::Start(0))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    serde_json::from_str(&contents).map_err(io::Error::other)
  }

  pub fn lock_path(&self) -> &Path {
    &self.lock_path
  }
}

fn write_metadata(file: &File, project: &str, command: &str) -> Result<(), BuildLockError> {
  let metadata = BuildLockMetadata {
    version: METADATA_VERSION,
    pid: std::process::id(),
    started_at: Utc::now(),
    command: command.to_string(),
    project: project.to_string(),
  };

  file.set_len(0).map_err(BuildLockError::WriteMetadata)?;
  let mut writer = io::BufWriter::new(file);
  writer.seek(SeekFrom::Start(0)).map_err(BuildLockError::WriteMetadata)?;
  serde_json::to_writer_pretty(&mut writer, &metadata).map_err(|e| BuildLockError::WriteMetadata(io::Error::other(e)))?;
  writer.flush().map_err(BuildLockError::WriteMetadata)?;
  Ok(())
}

fn read_contention_error(lock_path: &Path) -> BuildLockError {
  let metadata = std::fs::read_to_string(lock_path)
    .ok()
    .and_then(|contents| serde_json::from_str::<BuildLockMetadata>(&contents).ok());

  match metadata {
    Some(metadata) => BuildLockError::Contention {
      project: metadata.project,
      command: metadata.command,
      pid: metadata.pid,
      started_at: metadata.started_at,
      lock_path: lock_path.to_path_buf(),
    },
    None => BuildLockError::ContentionUnknown {
      lock_path: lock_path.to_path_buf(),
    },
  }
}

#[cfg(unix)]
fn try_lock(file: &File) -> io::Result<()> {
  use rustix::fs::{FlockOperation, flock};
  use std::os::unix::io::AsFd;

  flock(file.as_fd(), FlockOperation::NonBlockingLockExclusive).map_err(|e| io::Error::from_raw_os_error(e.raw_os_error()))
}

#[cfg(windows)]
fn try_lock(file: &File) -> io::Result<()> {
  use std::os::windows::io::AsRawHandle;
  use windows_sys::Win32::Foundation::HANDLE;
  use windows_sys::Win32::Storage::FileSystem::{LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY, LockFileEx};

  let handle = file.as_raw_handle() as HANDLE;

  // SAFETY: OVERLAPPED is plain data and valid when zeroed; `handle` is owned by `file`.
  let result = unsafe {
    let mut overlapped = std::mem::zeroed();
    LockFileEx(
      handle,
      LOCKFILE_FAIL_IMMEDIATELY | LOCKFILE_EXCLUSIVE_LOCK,
      0,
      1,
      0,
      &mut overlapped,
    )
  };

  if result == 0 {
    Err(io::Error::last_os_error())
  } else {
    Ok(())
  }
}
