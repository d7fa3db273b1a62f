mod build;
mod create;
mod info;
mod list;
mod prune;
mod rm;
mod run;
mod status;

pub use build::cmd_build;
pub use create::cmd_create;
pub use info::cmd_info;
pub use list::cmd_list;
pub use prune::cmd_prune;
pub use rm::cmd_rm;
pub use run::cmd_run;
pub use status::cmd_status;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use serde::Serialize;
use tracing::debug;

use devcell_lib::cancel::Cancellation;
use devcell_lib::engine::{CliEngine, ContainerEngine, EngineKind};
use devcell_lib::platform::UserFs;
use devcell_lib::project::{BuildState, FileStore, ProjectName, RebuildReason};

use crate::output::OutputFormat;

/// Everything a command needs, resolved once per invocation.
pub struct Context {
  pub store: FileStore,
  pub engine: Box<dyn ContainerEngine>,
  pub cancel: Cancellation,
  pub output: OutputFormat,
  pub dotfiles: Option<PathBuf>,
}

impl Context {
  pub fn new(
    engine: EngineKind,
    output: OutputFormat,
    dotfiles: Option<PathBuf>,
    cancel: Cancellation,
  ) -> Result<Self> {
    let userfs = UserFs::detect().context("Failed to resolve the invoking user")?;
    if let Some(owner) = userfs.identity().owner {
      debug!(user = %userfs.identity().username, uid = owner.uid, "writing files on behalf of invoking user");
    }

    Ok(Self {
      store: FileStore::new(userfs),
      engine: Box::new(CliEngine::new(engine)),
      cancel,
      output,
      dotfiles,
    })
  }
}

/// How a project's image relates to its current files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "reason")]
pub enum Freshness {
  /// No image, or no build record this binary trusts.
  NeverBuilt,
  Stale(RebuildReason),
  Current,
}

/// Compare the project's image and build record against its files.
pub async fn freshness(ctx: &Context, name: &ProjectName, engine_name: &str) -> Result<(Freshness, Option<BuildState>)> {
  if !ctx.engine.has_been_built(&ctx.cancel, name).await? {
    return Ok((Freshness::NeverBuilt, None));
  }

  let state = match ctx.store.read_build_state(name) {
    Ok(state) => state,
    Err(err) if err.is_absent() => {
      debug!(project = %name, error = %err, "no usable build record");
      return Ok((Freshness::NeverBuilt, None));
    }
    Err(err) => return Err(err).context("Failed to read the build record"),
  };

  let reason = ctx
    .store
    .needs_rebuild(name, &state, engine_name)
    .context("Failed to compare the build record with the project files")?;
  let freshness = if reason.needs_rebuild() {
    Freshness::Stale(reason)
  } else {
    Freshness::Current
  };
  Ok((freshness, Some(state)))
}
