//! `FileStore`: where project files live and when they are written.
//!
//! Every write goes through [`UserFs`], so files created while running under
//! `sudo` still belong to the invoking user. Nothing here is transactional
//! across files: a failure partway through creation leaves what was already
//! written in place and the caller decides whether to clean up.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::build_lock::{BuildLock, BuildLockError};
use super::build_state::{self, BuildState, RebuildInputs, RebuildReason};
use super::error::StoreError;
use super::lock::{ProjectLock, peek_format_version};
use super::name::ProjectName;
use super::templates::{self, ComposeData, EnvData};
use super::Project;
use crate::cancel::Cancellation;
use crate::consts::{
  BASE_IMAGE_DEFINITION_VERSION, BUILD_INFO_FILENAME, BUILD_STATE_FORMAT_VERSION, COMPOSE_FILENAME,
  DOCKERFILE_FILENAME, DOTFILES_DIRNAME, ENTRYPOINT_FILENAME, ENV_FILENAME, LOCK_FILENAME, LOCK_FORMAT_VERSION,
  MACHINE_ID_FILENAME, PROJECTS_DIRNAME,
};
use crate::platform::UserFs;
use crate::util::hash::hash_file;
use crate::util::kv::KvFile;

const DIR_MODE: u32 = 0o755;
const FILE_MODE: u32 = 0o644;
const SCRIPT_MODE: u32 = 0o755;

const PROJECT_PATH_KEY: &str = "PROJECT_PATH";

/// Result of scanning the projects directory.
#[derive(Debug, Default)]
pub struct ProjectListing {
  pub projects: Vec<Project>,
  /// Directories that could not be read as a project.
  pub failures: Vec<ProjectFailure>,
}

#[derive(Debug)]
pub struct ProjectFailure {
  pub name: String,
  pub path: PathBuf,
  pub error: StoreError,
}

#[derive(Debug, Clone)]
pub struct FileStore {
  userfs: UserFs,
  root: PathBuf,
}

impl FileStore {
  /// A store rooted at the identity's data directory.
  pub fn new(userfs: UserFs) -> Self {
    let root = userfs.data_dir();
    Self { userfs, root }
  }

  pub fn with_root(userfs: UserFs, root: impl Into<PathBuf>) -> Self {
    Self {
      userfs,
      root: root.into(),
    }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn userfs(&self) -> &UserFs {
    &self.userfs
  }

  pub fn projects_dir(&self) -> PathBuf {
    self.root.join(PROJECTS_DIRNAME)
  }

  pub fn project_dir(&self, name: &ProjectName) -> PathBuf {
    self.projects_dir().join(name.as_str())
  }

  pub fn compose_path(&self, name: &ProjectName) -> PathBuf {
    self.project_dir(name).join(COMPOSE_FILENAME)
  }

  pub fn env_path(&self, name: &ProjectName) -> PathBuf {
    self.project_dir(name).join(ENV_FILENAME)
  }

  pub fn lock_path(&self, name: &ProjectName) -> PathBuf {
    self.project_dir(name).join(LOCK_FILENAME)
  }

  pub fn build_info_path(&self, name: &ProjectName) -> PathBuf {
    self.project_dir(name).join(BUILD_INFO_FILENAME)
  }

  pub fn dotfiles_dir(&self) -> PathBuf {
    self.root.join(DOTFILES_DIRNAME)
  }

  fn machine_id_path(&self) -> PathBuf {
    self.root.join(MACHINE_ID_FILENAME)
  }

  /// A project exists when both its compose and env files do.
  pub fn project_exists(&self, name: &ProjectName) -> bool {
    self.compose_path(name).is_file() && self.env_path(name).is_file()
  }

  pub fn create_project_files(
    &self,
    name: &ProjectName,
    env: &EnvData,
    compose: &ComposeData,
  ) -> Result<Project, StoreError> {
    let compose_path = self.compose_path(name);
    let env_path = self.env_path(name);
    if compose_path.exists() || env_path.exists() {
      return Err(StoreError::AlreadyExists {
        name: name.clone(),
        path: self.project_dir(name),
      });
    }

    // Render before touching the disk so a render failure writes nothing.
    let env_text = templates::render_env(name, env);
    let compose_text = templates::render_compose(name, &self.root, compose).map_err(StoreError::Render)?;

    self.ensure_base_artifacts()?;
    self.userfs.mkdir_as_user(&self.project_dir(name), DIR_MODE)?;
    self.userfs.write_file_as_user(&env_path, env_text.as_bytes(), FILE_MODE)?;
    self
      .userfs
      .write_file_as_user(&compose_path, compose_text.as_bytes(), FILE_MODE)?;
    self
      .userfs
      .write_file_as_user(&self.lock_path(name), ProjectLock::current().render().as_bytes(), FILE_MODE)?;

    info!(project = %name, path = %self.project_dir(name).display(), "created project");

    Ok(Project {
      name: name.clone(),
      host_mount_path: env.project_path.clone(),
      compose_file_path: compose_path,
      env_file_path: env_path,
    })
  }

  /// Write the shared Dockerfile and entrypoint unless they already exist.
  pub fn ensure_base_artifacts(&self) -> Result<(), StoreError> {
    self.userfs.mkdir_as_user(&self.root, DIR_MODE)?;

    let artifacts = [
      (DOCKERFILE_FILENAME, templates::DOCKERFILE, FILE_MODE),
      (ENTRYPOINT_FILENAME, templates::ENTRYPOINT, SCRIPT_MODE),
    ];
    for (filename, contents, mode) in artifacts {
      let path = self.root.join(filename);
      if path.exists() {
        continue;
      }
      debug!(path = %path.display(), "writing base artifact");
      self.userfs.write_file_as_user(&path, contents.as_bytes(), mode)?;
    }

    Ok(())
  }

  pub fn read_project_lock(&self, name: &ProjectName) -> Result<ProjectLock, StoreError> {
    let path = self.lock_path(name);
    let text = fs::read_to_string(&path).map_err(|e| StoreError::read(path.clone(), e))?;

    let lock = match ProjectLock::parse(&text) {
      Ok(lock) => lock,
      Err(err) => {
        if let Some(found) = peek_format_version(&text)
          && !LOCK_FORMAT_VERSION.is_compatible_with_base(&found)
        {
          return Err(StoreError::IncompatibleLockFormat {
            found,
            supported: LOCK_FORMAT_VERSION,
          });
        }
        return Err(StoreError::from_format(path, err));
      }
    };

    if !LOCK_FORMAT_VERSION.is_compatible_with_base(&lock.lock_format_version) {
      return Err(StoreError::IncompatibleLockFormat {
        found: lock.lock_format_version,
        supported: LOCK_FORMAT_VERSION,
      });
    }
    if !BASE_IMAGE_DEFINITION_VERSION.is_compatible_with_base(&lock.base_image_definition_version) {
      return Err(StoreError::IncompatibleBaseDefinition {
        found: lock.base_image_definition_version,
        supported: BASE_IMAGE_DEFINITION_VERSION,
      });
    }

    Ok(lock)
  }

  /// Read a project back, checking its lock first.
  pub fn read_project(&self, name: &ProjectName) -> Result<Project, StoreError> {
    self.read_project_lock(name)?;

    let compose_path = self.compose_path(name);
    if !compose_path.is_file() {
      return Err(StoreError::Missing { path: compose_path });
    }

    let env_path = self.env_path(name);
    let text = fs::read_to_string(&env_path).map_err(|e| StoreError::read(env_path.clone(), e))?;
    let env = KvFile::parse(&text).map_err(|e| StoreError::Corrupted {
      path: env_path.clone(),
      reason: e.to_string(),
    })?;
    let host_mount_path = env
      .get(PROJECT_PATH_KEY)
      .filter(|value| !value.is_empty())
      .map(PathBuf::from)
      .ok_or_else(|| StoreError::MissingField {
        path: env_path.clone(),
        field: PROJECT_PATH_KEY,
      })?;

    Ok(Project {
      name: name.clone(),
      host_mount_path,
      compose_file_path: compose_path,
      env_file_path: env_path,
    })
  }

  /// This machine's identifier, generated on first use.
  pub fn machine_id(&self) -> Result<String, StoreError> {
    let path = self.machine_id_path();
    match fs::read_to_string(&path) {
      Ok(text) => {
        let id = text.trim();
        Uuid::parse_str(id).map_err(|e| StoreError::Corrupted {
          path: path.clone(),
          reason: e.to_string(),
        })?;
        Ok(id.to_string())
      }
      Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
        let id = Uuid::new_v4().to_string();
        self.userfs.mkdir_as_user(&self.root, DIR_MODE)?;
        self
          .userfs
          .write_file_as_user(&path, format!("{id}\n").as_bytes(), FILE_MODE)?;
        info!(machine_id = %id, "generated machine id");
        Ok(id)
      }
      Err(err) => Err(StoreError::read(path, err)),
    }
  }

  /// Record a successful build of `name`. Only call once the build is confirmed.
  pub fn refresh_build_state(
    &self,
    name: &ProjectName,
    engine_name: &str,
    engine_version: &str,
  ) -> Result<BuildState, StoreError> {
    let state = BuildState {
      format_version: BUILD_STATE_FORMAT_VERSION,
      built_by: self.machine_id()?,
      env_hash: hash_file(&self.env_path(name))?,
      compose_hash: hash_file(&self.compose_path(name))?,
      built_at: chrono::Utc::now(),
      engine_name: engine_name.to_string(),
      engine_version: engine_version.to_string(),
    };

    let path = self.build_info_path(name);
    let staging = path.with_extension("buildinfo.tmp");
    self
      .userfs
      .write_file_as_user(&staging, state.render().as_bytes(), FILE_MODE)?;
    fs::rename(&staging, &path).map_err(|source| StoreError::Rename {
      path: path.clone(),
      source,
    })?;

    info!(project = %name, engine = engine_name, "recorded build");
    Ok(state)
  }

  /// Read the build record. See [`StoreError::is_absent`] for "never built".
  pub fn read_build_state(&self, name: &ProjectName) -> Result<BuildState, StoreError> {
    let path = self.build_info_path(name);
    let text = fs::read_to_string(&path).map_err(|e| StoreError::read(path.clone(), e))?;

    let incompatible = |found: crate::version::Version| StoreError::IncompatibleBuildState {
      found,
      supported: BUILD_STATE_FORMAT_VERSION,
    };

    let state = match BuildState::parse(&text) {
      Ok(state) => state,
      Err(err) => {
        if let Some(found) = peek_format_version(&text)
          && !BUILD_STATE_FORMAT_VERSION.is_compatible_with_base(&found)
        {
          return Err(incompatible(found));
        }
        return Err(StoreError::from_format(path, err));
      }
    };

    if !BUILD_STATE_FORMAT_VERSION.is_compatible_with_base(&state.format_version) {
      debug!(project = %name, found = %state.format_version, "ignoring build record in unsupported format");
      return Err(incompatible(state.format_version));
    }

    Ok(state)
  }

  /// Decide whether `name` must be rebuilt given its last build record.
  pub fn needs_rebuild(
    &self,
    name: &ProjectName,
    state: &BuildState,
    engine_name: &str,
  ) -> Result<RebuildReason, StoreError> {
    let current = RebuildInputs {
      machine_id: self.machine_id()?,
      env_hash: hash_file(&self.env_path(name))?,
      compose_hash: hash_file(&self.compose_path(name))?,
      engine_name: engine_name.to_string(),
    };

    let reason = build_state::decide(state, &current);
    debug!(project = %name, reason = ?reason, "rebuild decision");
    Ok(reason)
  }

  /// Every project under the projects directory, sorted by name.
  pub fn get_all_projects(&self) -> Result<ProjectListing, StoreError> {
    let dir = self.projects_dir();
    let entries = match fs::read_dir(&dir) {
      Ok(entries) => entries,
      Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(ProjectListing::default()),
      Err(err) => return Err(StoreError::read(dir, err)),
    };

    let mut listing = ProjectListing::default();
    for entry in entries {
      let entry = entry.map_err(|e| StoreError::read(dir.clone(), e))?;
      let path = entry.path();
      if !path.is_dir() {
        continue;
      }

      let raw_name = entry.file_name().to_string_lossy().into_owned();
      let result = ProjectName::parse(&raw_name)
        .map_err(StoreError::from)
        .and_then(|name| self.read_project(&name));

      match result {
        Ok(project) => listing.projects.push(project),
        Err(error) => {
          warn!(project = %raw_name, error = %error, "skipping unreadable project");
          listing.failures.push(ProjectFailure {
            name: raw_name,
            path,
            error,
          });
        }
      }
    }

    listing.projects.sort_by(|a, b| a.name.cmp(&b.name));
    listing.failures.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(listing)
  }

  /// Stage `source` (or an empty directory) as the dotfiles in the build context.
  ///
  /// Returns the staged path relative to the build context.
  pub fn stage_dotfiles(&self, cancel: &Cancellation, source: Option<&Path>) -> Result<PathBuf, StoreError> {
    let staged = self.dotfiles_dir();
    if staged.symlink_metadata().is_ok() {
      fs::remove_dir_all(&staged).map_err(|source| StoreError::Remove {
        path: staged.clone(),
        source,
      })?;
    }

    self.userfs.mkdir_as_user(&self.root, DIR_MODE)?;
    match source {
      Some(source) if !source.is_dir() => {
        return Err(StoreError::Missing {
          path: source.to_path_buf(),
        });
      }
      Some(source) => {
        info!(source = %source.display(), "staging dotfiles");
        self.userfs.copy_dir_as_user(cancel, source, &staged)?;
      }
      None => self.userfs.mkdir_as_user(&staged, DIR_MODE)?,
    }

    Ok(PathBuf::from(DOTFILES_DIRNAME))
  }

  /// Delete the project's directory and everything in it.
  pub fn remove_project(&self, name: &ProjectName) -> Result<(), StoreError> {
    let dir = self.project_dir(name);
    if !dir.is_dir() {
      return Err(StoreError::Missing { path: dir });
    }
    fs::remove_dir_all(&dir).map_err(|source| StoreError::Remove {
      path: dir.clone(),
      source,
    })?;
    info!(project = %name, "removed project files");
    Ok(())
  }

  /// Take the project's build lock for as long as the guard lives.
  pub fn lock_build(&self, name: &ProjectName, command: &str) -> Result<BuildLock, BuildLockError> {
    BuildLock::acquire(&self.userfs, &self.project_dir(name), name.as_str(), command)
  }
}
