use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;

use devcell_lib::consts::{BASE_IMAGE_DEFINITION_VERSION, BUILD_STATE_FORMAT_VERSION, LOCK_FORMAT_VERSION};
use devcell_lib::engine::EngineInfo;
use devcell_lib::platform::Identity;
use devcell_lib::version::Version;

use super::Context;
use crate::output::{print_info, print_json, print_stat};

#[derive(Serialize)]
struct InfoReport {
  version: &'static str,
  identity: Identity,
  data_dir: PathBuf,
  config_dir: PathBuf,
  engine: Option<EngineInfo>,
  engine_error: Option<String>,
  formats: Formats,
}

#[derive(Serialize)]
struct Formats {
  lock: Version,
  base_image: Version,
  build_state: Version,
}

/// Report the running binary, identity and engine. An unreachable engine is
/// reported, not treated as a failure.
pub async fn cmd_info(ctx: &Context) -> Result<()> {
  let userfs = ctx.store.userfs();
  let (engine, engine_error) = match ctx.engine.info(&ctx.cancel).await {
    Ok(info) => (Some(info), None),
    Err(err) => (None, Some(err.to_string())),
  };

  let report = InfoReport {
    version: env!("CARGO_PKG_VERSION"),
    identity: userfs.identity().clone(),
    data_dir: ctx.store.root().to_path_buf(),
    config_dir: userfs.config_dir(),
    engine,
    engine_error,
    formats: Formats {
      lock: LOCK_FORMAT_VERSION,
      base_image: BASE_IMAGE_DEFINITION_VERSION,
      build_state: BUILD_STATE_FORMAT_VERSION,
    },
  };

  if ctx.output.is_json() {
    return print_json(&report);
  }

  print_info(&format!("devcell {}", report.version));
  let user = match report.identity.owner {
    Some(owner) => format!("{} (uid {}, via sudo)", report.identity.username, owner.uid),
    None => report.identity.username.clone(),
  };
  print_stat("User", user);
  print_stat("Data", report.data_dir.display());
  print_stat("Config", report.config_dir.display());
  match (&report.engine, &report.engine_error) {
    (Some(engine), _) => print_stat("Engine", format!("{} {}", engine.name, engine.version)),
    (None, Some(err)) => print_stat("Engine", format!("unavailable ({err})")),
    (None, None) => {}
  }
  print_stat(
    "Formats",
    format!(
      "lock {}, base image {}, build record {}",
      report.formats.lock, report.formats.base_image, report.formats.build_state
    ),
  );
  Ok(())
}
