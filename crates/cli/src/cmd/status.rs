//! Implementation of the `devcell status` command.
//!
//! Combines what the project store knows (files, lock versions, build record)
//! with what the engine reports (image, containers) into one view.

use anyhow::{Context as _, Result};
use chrono::Utc;
use serde::Serialize;

use devcell_lib::engine::{ContainerInfo, EngineInfo, ImageInfo};
use devcell_lib::project::{BuildState, Project, ProjectLock, ProjectName};

use super::{Context, Freshness, freshness};
use crate::output::{format_age, print_info, print_json, print_stat, short_id};

#[derive(Serialize)]
struct StatusReport {
  project: Project,
  lock: ProjectLock,
  engine: EngineInfo,
  freshness: Freshness,
  build: Option<BuildState>,
  image: Option<ImageInfo>,
  containers: Vec<ContainerInfo>,
}

pub async fn cmd_status(ctx: &Context, name: &ProjectName) -> Result<()> {
  let project = ctx
    .store
    .read_project(name)
    .with_context(|| format!("Failed to read project '{name}'"))?;
  let lock = ctx.store.read_project_lock(name)?;

  let engine = ctx.engine.info(&ctx.cancel).await?;
  let (freshness, build) = freshness(ctx, name, &engine.name).await?;
  let image = ctx.engine.get_image_info(&ctx.cancel, name).await?;
  let containers: Vec<ContainerInfo> = ctx
    .engine
    .list_containers(&ctx.cancel)
    .await?
    .into_iter()
    .filter(|c| c.project.as_ref() == Some(name))
    .collect();

  let report = StatusReport {
    project,
    lock,
    engine,
    freshness,
    build,
    image,
    containers,
  };

  if ctx.output.is_json() {
    return print_json(&report);
  }

  print_text(&report);
  Ok(())
}

fn print_text(report: &StatusReport) {
  let project = &report.project;
  print_info(&format!("Project {}", project.name));
  print_stat("Mounts", project.host_mount_path.display());
  if let Some(dir) = project.dir() {
    print_stat("Files", dir.display());
  }
  print_stat(
    "Formats",
    format!(
      "lock {}, base image {}",
      report.lock.lock_format_version, report.lock.base_image_definition_version
    ),
  );

  let freshness = match report.freshness {
    Freshness::NeverBuilt => "never built".to_string(),
    Freshness::Stale(reason) => format!("needs rebuild: {reason}"),
    Freshness::Current => "up to date".to_string(),
  };
  print_stat("Image", freshness);

  if let Some(build) = &report.build {
    let age = (Utc::now() - build.built_at).to_std().unwrap_or_default();
    print_stat(
      "Built",
      format!(
        "{} ago with {} {}",
        format_age(age),
        build.engine_name,
        build.engine_version
      ),
    );
    print_stat("Compose hash", short_id(build.compose_hash.as_str()));
    print_stat("Env hash", short_id(build.env_hash.as_str()));
  }

  if let Some(image) = &report.image {
    print_stat("Image id", short_id(&image.id));
  }

  if report.containers.is_empty() {
    print_stat("Containers", "none");
  }
  for container in &report.containers {
    print_stat("Container", format!("{} ({})", container.name, container.status));
  }
}
