//! The on-disk project store.
//!
//! # Layout
//!
//! ```text
//! <data dir>/
//! ├── Dockerfile              # shared, written once
//! ├── entrypoint.sh           # shared, written once
//! ├── machine-id              # created on first build
//! ├── dotfiles/               # staged before each build
//! └── projects/
//!     └── <name>/
//!         ├── docker-compose.yml
//!         ├── .env
//!         ├── project.lock
//!         ├── project.buildinfo
//!         └── .build.lock
//! ```

pub mod build_lock;
pub mod build_state;
mod error;
pub mod lock;
pub mod name;
pub mod store;
pub mod templates;

use std::path::PathBuf;

use serde::Serialize;

pub use build_lock::{BuildLock, BuildLockError};
pub use build_state::{BuildState, RebuildReason};
pub use error::{FormatError, StoreError};
pub use lock::ProjectLock;
pub use name::{ProjectName, ProjectNameError};
pub use store::{FileStore, ProjectFailure, ProjectListing};
pub use templates::{ComposeData, EnvData};

/// A project as read back from its directory. Never persisted as a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Project {
  pub name: ProjectName,
  /// Host directory mounted into the container, from `PROJECT_PATH` in `.env`.
  pub host_mount_path: PathBuf,
  pub compose_file_path: PathBuf,
  pub env_file_path: PathBuf,
}

impl Project {
  /// Directory holding the project's files.
  pub fn dir(&self) -> Option<&std::path::Path> {
    self.compose_file_path.parent()
  }
}
