//! Engine resource names and the projects they belong to.
//!
//! | resource            | name                                                 |
//! |---------------------|------------------------------------------------------|
//! | image               | `devcell:<project>` (`localhost/devcell` on podman)  |
//! | leader container    | `devcell-<project>`                                  |
//! | compose containers  | `devcell-<project>-dev-<n>`, `devcell-<project>-dev-run-<id>` |
//! | volumes / networks  | `devcell-<project>_<name>`                           |
//!
//! Podman's compose uses `_` instead of `-` between the compose project, the
//! service and the index. A name that does not fit any of these shapes maps
//! to no project.

use crate::consts::{IMAGE_REPOSITORY, RESOURCE_PREFIX, SERVICE_NAME};
use crate::project::ProjectName;
use crate::project::templates::compose_project_name;

/// Name given to the interactive session other sessions join.
pub fn leader_container_name(name: &ProjectName) -> String {
  compose_project_name(name)
}

fn strip_prefix(resource: &str) -> Option<&str> {
  resource
    .trim_start_matches('/')
    .strip_prefix(RESOURCE_PREFIX)?
    .strip_prefix('-')
}

/// Recover the project from a container name.
///
/// Compose-generated suffixes are tried before treating the whole remainder
/// as a leader container name.
pub fn project_from_container(container: &str) -> Option<ProjectName> {
  let rest = strip_prefix(container)?;

  for sep in ['-', '_'] {
    if let Some(prefix) = strip_compose_suffix(rest, sep)
      && let Ok(project) = ProjectName::parse(prefix)
    {
      return Some(project);
    }
  }

  ProjectName::parse(rest).ok()
}

/// The part of `name` before a compose `<service>-<n>` or
/// `<service>-run-<id>` suffix joined with `sep`, if it has one.
pub(crate) fn strip_compose_suffix(name: &str, sep: char) -> Option<&str> {
  let marker = format!("{sep}{SERVICE_NAME}{sep}");
  let index = name.rfind(&marker)?;
  is_compose_suffix(&name[index + marker.len()..], sep).then(|| &name[..index])
}

fn is_compose_suffix(suffix: &str, sep: char) -> bool {
  if !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()) {
    return true;
  }
  suffix
    .strip_prefix("run")
    .and_then(|id| id.strip_prefix(sep))
    .is_some_and(|id| !id.is_empty() && id.bytes().all(|b| b.is_ascii_alphanumeric()))
}

/// Recover the project from an image's repository and tag.
pub fn project_from_image(repository: &str, tag: &str) -> Option<ProjectName> {
  let repository = repository.strip_prefix("localhost/").unwrap_or(repository);
  if repository != IMAGE_REPOSITORY {
    return None;
  }
  ProjectName::parse(tag).ok()
}

/// Recover the project from a compose-created volume or network name.
pub fn project_from_scoped(resource: &str) -> Option<ProjectName> {
  let rest = strip_prefix(resource)?;
  let (project, scoped) = rest.split_once('_')?;
  if scoped.is_empty() {
    return None;
  }
  ProjectName::parse(project).ok()
}

/// Split an image reference into repository and tag.
pub fn split_reference(reference: &str) -> (&str, &str) {
  match reference.rsplit_once(':') {
    Some((repository, tag)) if !tag.contains('/') => (repository, tag),
    _ => (reference, "latest"),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn project(name: &str) -> Option<ProjectName> {
    Some(ProjectName::parse(name).unwrap())
  }

  #[test]
  fn leader_name_matches_compose_project() {
    let name = ProjectName::parse("demo").unwrap();
    assert_eq!(leader_container_name(&name), "devcell-demo");
    assert_eq!(project_from_container("devcell-demo"), project("demo"));
    assert_eq!(project_from_container("/devcell-demo"), project("demo"));
  }

  #[test]
  fn compose_container_names() {
    assert_eq!(project_from_container("devcell-demo-dev-1"), project("demo"));
    assert_eq!(project_from_container("devcell-my-app-dev-run-3f2a9c1d0b7e"), project("my-app"));
    assert_eq!(project_from_container("devcell-demo_dev_1"), project("demo"));
    assert_eq!(project_from_container("devcell-demo_dev_run_ab12"), project("demo"));
  }

  #[test]
  fn compose_shaped_project_names_cannot_be_created() {
    for name in ["foo-dev-1", "foo-dev-run-ab12"] {
      assert!(ProjectName::parse(name).is_err(), "{name}");
    }
    // Leaders of the names that remain never read as another project's containers.
    for name in ["foo-dev", "dev-1", "foo-dev-x", "foo-dev-1-dev-x"] {
      let leader = leader_container_name(&ProjectName::parse(name).unwrap());
      assert_eq!(project_from_container(&leader), project(name), "{leader}");
    }
  }

  #[test]
  fn unrelated_containers_have_no_project() {
    assert_eq!(project_from_container("postgres"), None);
    assert_eq!(project_from_container("devcellar"), None);
    assert_eq!(project_from_container("devcell-"), None);
    assert_eq!(project_from_container("devcell-Upper"), None);
  }

  #[test]
  fn image_names() {
    assert_eq!(project_from_image("devcell", "demo"), project("demo"));
    assert_eq!(project_from_image("localhost/devcell", "demo"), project("demo"));
    assert_eq!(project_from_image("ubuntu", "24.04"), None);
    assert_eq!(project_from_image("devcell", "<none>"), None);
  }

  #[test]
  fn volume_and_network_names() {
    assert_eq!(project_from_scoped("devcell-demo_home"), project("demo"));
    assert_eq!(project_from_scoped("devcell-my-app_default"), project("my-app"));
    assert_eq!(project_from_scoped("devcell-demo"), None);
    assert_eq!(project_from_scoped("bridge"), None);
  }

  #[test]
  fn references_split_on_the_last_colon() {
    assert_eq!(split_reference("devcell:demo"), ("devcell", "demo"));
    assert_eq!(split_reference("localhost:5000/devcell"), ("localhost:5000/devcell", "latest"));
    assert_eq!(split_reference("devcell"), ("devcell", "latest"));
  }
}
