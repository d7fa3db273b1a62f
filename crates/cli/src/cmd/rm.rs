//! Implementation of the `devcell rm` command.
//!
//! Removes the engine resources recovered for the project by name (containers
//! first, then the image, volumes and networks), then the project directory.

use anyhow::{Context as _, Result, bail};
use serde::Serialize;
use tracing::warn;

use devcell_lib::engine::EngineError;
use devcell_lib::project::ProjectName;
use devcell_lib::prompt;

use super::Context;
use crate::output::{print_info, print_json, print_removed, print_success, print_warning};

#[derive(Serialize, Default)]
struct RemovalReport {
  containers: Vec<String>,
  images: Vec<String>,
  volumes: Vec<String>,
  networks: Vec<String>,
  /// False when the engine could not be reached and only files were removed.
  engine_cleaned: bool,
}

pub async fn cmd_rm(ctx: &Context, name: &ProjectName, force: bool) -> Result<()> {
  if !ctx.store.project_dir(name).is_dir() {
    bail!("Project '{name}' does not exist");
  }

  let question = format!("Remove project {name} with its containers, image, volumes and networks?");
  if !prompt::confirm(&ctx.cancel, &question, force).await? {
    print_info("Nothing removed");
    return Ok(());
  }

  let mut report = RemovalReport::default();
  match remove_engine_resources(ctx, name, &mut report).await {
    Ok(()) => report.engine_cleaned = true,
    Err(EngineError::EngineUnavailable { program, .. }) => {
      warn!(project = %name, program = %program, "engine unavailable, removing files only");
      print_warning(&format!("'{program}' is not available; engine resources for {name} were left in place"));
    }
    Err(err) => return Err(err).with_context(|| format!("Failed to remove engine resources of '{name}'")),
  }

  ctx
    .store
    .remove_project(name)
    .with_context(|| format!("Failed to remove the files of '{name}'"))?;

  if ctx.output.is_json() {
    return print_json(&report);
  }

  let removed = [
    ("container", &report.containers),
    ("image", &report.images),
    ("volume", &report.volumes),
    ("network", &report.networks),
  ];
  for (kind, names) in removed {
    for resource in names {
      print_removed(&format!("{kind} {resource}"));
    }
  }
  print_success(&format!("Removed project {name}"));
  Ok(())
}

async fn remove_engine_resources(
  ctx: &Context,
  name: &ProjectName,
  report: &mut RemovalReport,
) -> Result<(), EngineError> {
  let engine = &ctx.engine;
  let cancel = &ctx.cancel;
  let owned = |project: &Option<ProjectName>| project.as_ref() == Some(name);

  for container in engine.list_containers(cancel).await? {
    if owned(&container.project) {
      engine.remove_container(cancel, &container.id).await?;
      report.containers.push(container.name);
    }
  }

  for image in engine.list_images(cancel).await? {
    if owned(&image.project) {
      let reference = image.reference();
      engine.remove_image(cancel, &reference).await?;
      report.images.push(reference);
    }
  }

  for volume in engine.list_volumes(cancel).await? {
    if owned(&volume.project) {
      engine.remove_volume(cancel, &volume.name).await?;
      report.volumes.push(volume.name);
    }
  }

  for network in engine.list_networks(cancel).await? {
    if owned(&network.project) {
      engine.remove_network(cancel, &network.name).await?;
      report.networks.push(network.name);
    }
  }

  Ok(())
}
