//! Names and embedded format versions shared across the crate.

use crate::version::Version;

/// Directory name used under the platform data and config roots.
pub const APP_NAME: &str = "devcell";

/// Prefix for every engine resource this tool creates (`devcell-<project>`).
pub const RESOURCE_PREFIX: &str = "devcell";

/// Image repository; project images are tagged `devcell:<project>`.
pub const IMAGE_REPOSITORY: &str = "devcell";

/// Compose service that hosts the development session.
pub const SERVICE_NAME: &str = "dev";

pub const PROJECTS_DIRNAME: &str = "projects";
pub const DOTFILES_DIRNAME: &str = "dotfiles";
pub const DOCKERFILE_FILENAME: &str = "Dockerfile";
pub const ENTRYPOINT_FILENAME: &str = "entrypoint.sh";
pub const MACHINE_ID_FILENAME: &str = "machine-id";

pub const COMPOSE_FILENAME: &str = "docker-compose.yml";
pub const ENV_FILENAME: &str = ".env";
pub const LOCK_FILENAME: &str = "project.lock";
pub const BUILD_INFO_FILENAME: &str = "project.buildinfo";
pub const BUILD_LOCK_FILENAME: &str = ".build.lock";

/// Format of `project.lock` written by this binary.
pub const LOCK_FORMAT_VERSION: Version = Version::new(1, 0, 0);

/// Revision of the shared Dockerfile/entrypoint this binary materializes.
pub const BASE_IMAGE_DEFINITION_VERSION: Version = Version::new(1, 1, 0);

/// Format of `project.buildinfo` written by this binary.
pub const BUILD_STATE_FORMAT_VERSION: Version = Version::new(1, 0, 0);

/// Chunk size for streamed file copies.
pub const COPY_CHUNK_SIZE: usize = 64 * 1024;
