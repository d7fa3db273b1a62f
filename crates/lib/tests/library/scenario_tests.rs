//! End-to-end flows through the public API: creating a project, building it,
//! deciding on rebuilds, resolving directories under sudo and cancelling copies.

use std::fs;
use std::path::PathBuf;

use devcell_lib::cancel::{self, Cancellation};
use devcell_lib::platform::{Identity, Os, Owner, UserFs, UserFsError};
use devcell_lib::project::{ComposeData, EnvData, RebuildReason, StoreError};
use devcell_lib::version::Version;
use serial_test::serial;
use tempfile::TempDir;

use super::common::{create, name, store};

mod creating {
  use super::*;

  #[test]
  fn env_records_the_host_path_and_recreate_fails() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp);

    let project = create(&store, "demo", &PathBuf::from("/tmp/x"));
    let env = fs::read_to_string(&project.env_file_path).unwrap();
    assert!(env.contains("PROJECT_PATH=\"/tmp/x\""), "{env}");

    let again = store.create_project_files(&name("demo"), &EnvData::new("/tmp/y", 1, 1), &ComposeData::default());
    assert!(matches!(again, Err(StoreError::AlreadyExists { .. })));
    assert_eq!(store.read_project(&name("demo")).unwrap().host_mount_path, PathBuf::from("/tmp/x"));
  }

  #[test]
  fn listing_separates_broken_projects() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp);
    create(&store, "alpha", &PathBuf::from("/src/alpha"));
    create(&store, "beta", &PathBuf::from("/src/beta"));
    fs::write(store.lock_path(&name("beta")), "VERSION=9.0.0\nDOCKERFILE_VERSION=1.0.0\n").unwrap();

    let listing = store.get_all_projects().unwrap();
    assert_eq!(listing.projects.len(), 1);
    assert_eq!(listing.projects[0].name, name("alpha"));
    assert_eq!(listing.failures.len(), 1);
    assert!(matches!(
      listing.failures[0].error,
      StoreError::IncompatibleLockFormat { found, .. } if found == Version::new(9, 0, 0)
    ));
  }
}

#[cfg(unix)]
mod building {
  use super::*;
  use crate::common::fake_engine;
  use devcell_lib::engine::{CliEngine, ContainerEngine, EngineKind};

  #[tokio::test]
  async fn build_then_edit_compose() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp);
    let bin = temp.path().join("bin");
    fs::create_dir(&bin).unwrap();
    let engine = CliEngine::with_program(EngineKind::Docker, fake_engine(&bin));
    let cancel = Cancellation::never();
    let demo = name("demo");

    let project = create(&store, "demo", &PathBuf::from("/tmp/x"));
    assert!(!engine.has_been_built(&cancel, &demo).await.unwrap());
    assert!(store.read_build_state(&demo).unwrap_err().is_absent());

    let dotfiles = store.stage_dotfiles(&cancel, None).unwrap();
    engine.build_image(&cancel, &project, &dotfiles).await.unwrap();
    let info = engine.info(&cancel).await.unwrap();
    store.refresh_build_state(&demo, &info.name, &info.version).unwrap();

    assert!(engine.has_been_built(&cancel, &demo).await.unwrap());
    let state = store.read_build_state(&demo).unwrap();
    assert_eq!(state.engine_name, "docker");
    assert_eq!(state.engine_version, "27.0.0");
    assert_eq!(
      store.needs_rebuild(&demo, &state, &info.name).unwrap(),
      RebuildReason::NotNeeded
    );
    assert_eq!(
      store.needs_rebuild(&demo, &state, "podman").unwrap(),
      RebuildReason::DifferentEngine
    );

    let mut compose = fs::read_to_string(&project.compose_file_path).unwrap();
    compose.push_str("# edited\n");
    fs::write(&project.compose_file_path, compose).unwrap();
    assert_eq!(
      store.needs_rebuild(&demo, &state, &info.name).unwrap(),
      RebuildReason::ComposeChanged
    );
  }

  #[tokio::test]
  async fn image_info_of_a_built_project() {
    let temp = TempDir::new().unwrap();
    let bin = temp.path().join("bin");
    fs::create_dir(&bin).unwrap();
    let engine = CliEngine::with_program(EngineKind::Docker, fake_engine(&bin));
    let cancel = Cancellation::never();

    assert_eq!(engine.get_image_info(&cancel, &name("demo")).await.unwrap(), None);

    fs::write(bin.join("built"), "").unwrap();
    let image = engine.get_image_info(&cancel, &name("demo")).await.unwrap().unwrap();
    assert_eq!(image.id, "sha256:feed");
    assert_eq!(image.reference(), "devcell:demo");
    assert_eq!(image.project, Some(name("demo")));
  }
}

mod rebuild_records {
  use super::*;

  #[test]
  fn future_build_record_is_treated_as_never_built() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp);
    create(&store, "demo", &PathBuf::from("/tmp/x"));
    store.refresh_build_state(&name("demo"), "docker", "27.0.0").unwrap();

    let path = store.build_info_path(&name("demo"));
    let text = fs::read_to_string(&path).unwrap();
    let bumped: String = text
      .lines()
      .map(|line| {
        if line.starts_with("VERSION=") {
          "VERSION=2.0.0".to_string()
        } else {
          line.to_string()
        }
      })
      .collect::<Vec<_>>()
      .join("\n");
    fs::write(&path, bumped).unwrap();

    let err = store.read_build_state(&name("demo")).unwrap_err();
    assert!(matches!(err, StoreError::IncompatibleBuildState { .. }));
    assert!(err.is_absent());
  }

  #[test]
  fn record_without_engine_is_missing_field() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp);
    create(&store, "demo", &PathBuf::from("/tmp/x"));
    store.refresh_build_state(&name("demo"), "docker", "27.0.0").unwrap();

    let path = store.build_info_path(&name("demo"));
    let text = fs::read_to_string(&path).unwrap();
    let trimmed: String = text
      .lines()
      .filter(|line| !line.starts_with("CONTAINER_ENGINE="))
      .map(|line| format!("{line}\n"))
      .collect();
    fs::write(&path, trimmed).unwrap();

    let err = store.read_build_state(&name("demo")).unwrap_err();
    assert!(matches!(err, StoreError::MissingField { field: "CONTAINER_ENGINE", .. }), "{err}");
  }

  #[test]
  fn machine_id_is_stable() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp);
    let first = store.machine_id().unwrap();
    assert_eq!(store.machine_id().unwrap(), first);
    assert!(uuid_like(&first), "{first}");
  }

  fn uuid_like(id: &str) -> bool {
    id.len() == 36 && id.chars().filter(|c| *c == '-').count() == 4
  }
}

mod directories {
  use super::*;

  #[test]
  #[serial]
  fn impersonation_ignores_xdg_config_home() {
    let temp = TempDir::new().unwrap();
    let alice_home = temp.path().join("alice");
    let identity = Identity::with_owner("alice", &alice_home, Owner { uid: 1001, gid: 1001 });
    let userfs = UserFs::with_os(identity, Os::Other);

    temp_env::with_var("XDG_CONFIG_HOME", Some("/root/.config"), || {
      assert_eq!(userfs.config_dir(), alice_home.join(".config").join("devcell"));
    });
  }

  #[test]
  #[serial]
  fn without_impersonation_xdg_config_home_applies() {
    let temp = TempDir::new().unwrap();
    let userfs = UserFs::with_os(Identity::with_home("bob", temp.path()), Os::Other);
    let config = temp.path().join("xdg-config");

    temp_env::with_var("XDG_CONFIG_HOME", Some(&config), || {
      assert_eq!(userfs.config_dir(), config.join("devcell"));
    });
  }
}

mod cancelling {
  use super::*;

  #[test]
  fn cancelled_copy_writes_nothing() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("dotfiles");
    fs::create_dir(&src).unwrap();
    fs::write(src.join(".bashrc"), "alias ll='ls -l'\n").unwrap();

    let (handle, cancel) = cancel::channel();
    handle.cancel();

    let userfs = UserFs::new(Identity::with_home("tester", temp.path()));
    let dst = temp.path().join("copy");
    let result = userfs.copy_dir_as_user(&cancel, &src, &dst);
    assert!(matches!(result, Err(UserFsError::Cancelled)));
    assert!(!dst.exists());
  }

  #[test]
  fn cancelled_staging_surfaces_as_cancelled() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp);
    let src = temp.path().join("dotfiles");
    fs::create_dir(&src).unwrap();
    fs::write(src.join(".vimrc"), "set nu\n").unwrap();

    let (handle, cancel) = cancel::channel();
    handle.cancel();

    let err = store.stage_dotfiles(&cancel, Some(&src)).unwrap_err();
    assert!(err.is_cancelled(), "{err}");
  }
}
