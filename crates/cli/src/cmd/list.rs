use anyhow::{Context as _, Result};
use serde::Serialize;

use devcell_lib::project::Project;

use super::Context;
use crate::output::{print_info, print_json, print_stat, print_warning};

#[derive(Serialize)]
struct ListReport {
  projects: Vec<Project>,
  failures: Vec<FailureReport>,
}

#[derive(Serialize)]
struct FailureReport {
  name: String,
  error: String,
}

/// List projects from the store. Does not contact the engine.
pub fn cmd_list(ctx: &Context) -> Result<()> {
  let listing = ctx.store.get_all_projects().context("Failed to list projects")?;

  if ctx.output.is_json() {
    return print_json(&ListReport {
      projects: listing.projects,
      failures: listing
        .failures
        .into_iter()
        .map(|failure| FailureReport {
          name: failure.name,
          error: failure.error.to_string(),
        })
        .collect(),
    });
  }

  if listing.projects.is_empty() && listing.failures.is_empty() {
    print_info("No projects");
    return Ok(());
  }

  for project in &listing.projects {
    print_stat(project.name.as_str(), project.host_mount_path.display());
  }
  for failure in &listing.failures {
    print_warning(&format!("{}: {}", failure.name, failure.error));
  }
  Ok(())
}
