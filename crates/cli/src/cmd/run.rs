//! Implementation of the `devcell run` command.

use anyhow::{Context as _, Result, bail};
use tracing::info;

use devcell_lib::engine::naming::leader_container_name;
use devcell_lib::project::ProjectName;

use super::{Context, Freshness, freshness};
use crate::output::print_warning;

/// Start a session in the project's container and return its exit code.
///
/// When the leader session is already running, the new session joins it
/// instead of starting another container.
pub async fn cmd_run(ctx: &Context, name: &ProjectName, args: &[String]) -> Result<i32> {
  let project = ctx
    .store
    .read_project(name)
    .with_context(|| format!("Failed to read project '{name}'"))?;

  let leader = leader_container_name(name);
  let containers = ctx.engine.list_containers(&ctx.cancel).await?;
  if let Some(container) = containers.iter().find(|c| c.name == leader && c.is_running()) {
    info!(project = %name, container = %container.id, "joining running session");
    return ctx
      .engine
      .join_container(&ctx.cancel, container, args)
      .await
      .with_context(|| format!("Failed to join the session of '{name}'"));
  }

  let engine = ctx.engine.info(&ctx.cancel).await?;
  match freshness(ctx, name, &engine.name).await?.0 {
    Freshness::NeverBuilt => bail!("Project '{name}' has not been built yet; run `devcell build {name}` first"),
    Freshness::Stale(reason) => print_warning(&format!(
      "Image for {name} is out of date ({reason}); run `devcell build {name}` to refresh it"
    )),
    Freshness::Current => {}
  }

  ctx
    .engine
    .run_container(&ctx.cancel, &project, args)
    .await
    .with_context(|| format!("Failed to run '{name}'"))
}
