//! Implementation of the `devcell create` command.

use std::path::Path;

use anyhow::{Context as _, Result, bail};

use devcell_lib::project::{ComposeData, EnvData, ProjectName};

use super::Context;
use crate::output::{print_info, print_json, print_stat, print_success};

/// Write the compose, env and lock files for a new project mounting `path`.
pub fn cmd_create(ctx: &Context, name: &ProjectName, path: &Path, compose: &ComposeData) -> Result<()> {
  let host_path =
    dunce::canonicalize(path).with_context(|| format!("Cannot use {} as the project path", path.display()))?;
  if !host_path.is_dir() {
    bail!("Project path is not a directory: {}", host_path.display());
  }

  let env = EnvData::for_identity(&host_path, ctx.store.userfs().identity());
  let project = ctx
    .store
    .create_project_files(name, &env, compose)
    .with_context(|| format!("Failed to create project '{name}'"))?;

  if ctx.output.is_json() {
    return print_json(&project);
  }

  print_success(&format!("Created project {name}"));
  print_stat("Mounts", project.host_mount_path.display());
  print_stat("Compose", project.compose_file_path.display());
  print_stat("Env", project.env_file_path.display());
  print_info(&format!("Run `devcell build {name}` to build its image"));
  Ok(())
}
