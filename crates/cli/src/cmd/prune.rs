use anyhow::{Context as _, Result};

use super::Context;
use crate::output::print_success;

pub async fn cmd_prune(ctx: &Context) -> Result<()> {
  ctx
    .engine
    .prune_build_cache(&ctx.cancel)
    .await
    .context("Failed to prune the build cache")?;
  print_success("Pruned the build cache");
  Ok(())
}
