//! Shared helpers for library integration tests.

use std::path::Path;

use devcell_lib::platform::{Identity, UserFs};
use devcell_lib::project::{ComposeData, EnvData, FileStore, Project, ProjectName};
use tempfile::TempDir;

pub fn name(name: &str) -> ProjectName {
  ProjectName::parse(name).unwrap()
}

/// A store rooted in `temp`, owned by a non-impersonating identity.
pub fn store(temp: &TempDir) -> FileStore {
  let userfs = UserFs::new(Identity::with_home("tester", temp.path().join("home")));
  FileStore::with_root(userfs, temp.path().join("data"))
}

pub fn create(store: &FileStore, project: &str, host_path: &Path) -> Project {
  store
    .create_project_files(
      &name(project),
      &EnvData::new(host_path, 1000, 1000),
      &ComposeData::default(),
    )
    .unwrap()
}

/// A stand-in engine executable: `compose ... build` creates a `built`
/// marker next to it, and `image inspect` succeeds only once it exists.
#[cfg(unix)]
pub fn fake_engine(dir: &Path) -> std::path::PathBuf {
  use std::os::unix::fs::PermissionsExt;

  let script = r#"#!/bin/sh
dir="$(dirname "$0")"
case "$1" in
  --version) echo "Docker version 27.0.0, build fake" ;;
  info) ;;
  image)
    if [ -f "$dir/built" ]; then
      printf 'sha256:feed\t2026-01-01T00:00:00Z\t2048\n'
    else
      echo "Error response from daemon: No such image: devcell:demo" >&2
      exit 1
    fi
    ;;
  compose)
    for arg in "$@"; do
      if [ "$arg" = "build" ]; then touch "$dir/built"; fi
    done
    ;;
esac
exit 0
"#;
  let path = dir.join("engine");
  std::fs::write(&path, script).unwrap();
  std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
  path
}
