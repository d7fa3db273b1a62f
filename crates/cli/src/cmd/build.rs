//! Implementation of the `devcell build` command.
//!
//! Holds the project's build lock while it decides whether a build is needed,
//! stages the dotfiles, builds through the engine and records the result.

use std::time::Instant;

use anyhow::{Context as _, Result};
use serde::Serialize;
use tracing::info;

use devcell_lib::project::templates::image_reference;
use devcell_lib::project::{BuildState, ProjectName};

use super::{Context, Freshness, freshness};
use crate::output::{format_age, print_info, print_json, print_success};

#[derive(Serialize)]
struct BuildReport {
  project: ProjectName,
  built: bool,
  previous: Freshness,
  state: Option<BuildState>,
}

pub async fn cmd_build(ctx: &Context, name: &ProjectName, force: bool) -> Result<()> {
  let project = ctx
    .store
    .read_project(name)
    .with_context(|| format!("Failed to read project '{name}'"))?;
  let _lock = ctx.store.lock_build(name, "build")?;

  let engine = ctx.engine.info(&ctx.cancel).await?;
  let (previous, state) = freshness(ctx, name, &engine.name).await?;

  match previous {
    Freshness::Current if !force => {
      if ctx.output.is_json() {
        return print_json(&BuildReport {
          project: name.clone(),
          built: false,
          previous,
          state,
        });
      }
      print_info(&format!("Image for {name} is up to date (use --force to rebuild)"));
      return Ok(());
    }
    Freshness::Stale(reason) => {
      info!(project = %name, reason = ?reason, "rebuilding");
      if !ctx.output.is_json() {
        print_info(&format!("Rebuilding {name}: {reason}"));
      }
    }
    _ => {}
  }

  let dotfiles = ctx
    .store
    .stage_dotfiles(&ctx.cancel, ctx.dotfiles.as_deref())
    .context("Failed to stage dotfiles")?;

  let started = Instant::now();
  ctx
    .engine
    .build_image(&ctx.cancel, &project, &dotfiles)
    .await
    .with_context(|| format!("Failed to build the image for '{name}'"))?;

  let state = ctx
    .store
    .refresh_build_state(name, &engine.name, &engine.version)
    .context("Image built, but recording the build failed")?;

  if ctx.output.is_json() {
    return print_json(&BuildReport {
      project: name.clone(),
      built: true,
      previous,
      state: Some(state),
    });
  }

  print_success(&format!(
    "Built {} with {} in {}",
    image_reference(name),
    engine.name,
    format_age(started.elapsed())
  ));
  Ok(())
}
