//! Parsers for the engine's templated listing output.
//!
//! Listings are requested with `--format` templates that emit one record per
//! line with tab-separated fields, which both docker and podman support.

use thiserror::Error;

use super::naming;
use super::{ContainerInfo, ImageInfo, NetworkInfo, VolumeInfo};

pub const CONTAINER_FORMAT: &str = "{{.ID}}\t{{.Names}}\t{{.Image}}\t{{.State}}\t{{.Status}}";
pub const IMAGE_FORMAT: &str = "{{.ID}}\t{{.Repository}}\t{{.Tag}}\t{{.CreatedAt}}\t{{.Size}}";
pub const VOLUME_FORMAT: &str = "{{.Name}}\t{{.Driver}}";
pub const NETWORK_FORMAT: &str = "{{.ID}}\t{{.Name}}\t{{.Driver}}";
pub const INSPECT_IMAGE_FORMAT: &str = "{{.Id}}\t{{.Created}}\t{{.Size}}";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
  #[error("expected {expected} tab-separated fields, found {found} in '{line}'")]
  FieldCount {
    line: String,
    expected: usize,
    found: usize,
  },

  #[error("no version in '{0}'")]
  MissingVersion(String),
}

fn records<const N: usize>(text: &str) -> impl Iterator<Item = Result<[&str; N], ParseError>> {
  text.lines().filter(|line| !line.trim().is_empty()).map(|line| {
    let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
    <[&str; N]>::try_from(fields.as_slice()).map_err(|_| ParseError::FieldCount {
      line: line.to_string(),
      expected: N,
      found: fields.len(),
    })
  })
}

pub fn parse_containers(text: &str) -> Result<Vec<ContainerInfo>, ParseError> {
  records::<5>(text)
    .map(|record| {
      let [id, names, image, state, status] = record?;
      // Docker lists every name a container has, comma-separated.
      let name = names.split(',').next().unwrap_or(names).trim_start_matches('/');
      Ok(ContainerInfo {
        id: id.to_string(),
        name: name.to_string(),
        image: image.to_string(),
        state: state.to_ascii_lowercase(),
        status: status.to_string(),
        project: naming::project_from_container(name),
      })
    })
    .collect()
}

pub fn parse_images(text: &str) -> Result<Vec<ImageInfo>, ParseError> {
  records::<5>(text)
    .map(|record| {
      let [id, repository, tag, created, size] = record?;
      Ok(ImageInfo {
        id: id.to_string(),
        repository: repository.to_string(),
        tag: tag.to_string(),
        created: created.to_string(),
        size: size.to_string(),
        project: naming::project_from_image(repository, tag),
      })
    })
    .collect()
}

pub fn parse_volumes(text: &str) -> Result<Vec<VolumeInfo>, ParseError> {
  records::<2>(text)
    .map(|record| {
      let [name, driver] = record?;
      Ok(VolumeInfo {
        name: name.to_string(),
        driver: driver.to_string(),
        project: naming::project_from_scoped(name),
      })
    })
    .collect()
}

pub fn parse_networks(text: &str) -> Result<Vec<NetworkInfo>, ParseError> {
  records::<3>(text)
    .map(|record| {
      let [id, name, driver] = record?;
      Ok(NetworkInfo {
        id: id.to_string(),
        name: name.to_string(),
        driver: driver.to_string(),
        project: naming::project_from_scoped(name),
      })
    })
    .collect()
}

/// Parse `image inspect` output for the image `repository:tag`.
pub fn parse_inspected_image(text: &str, repository: &str, tag: &str) -> Result<ImageInfo, ParseError> {
  let record = records::<3>(text).next().unwrap_or_else(|| {
    Err(ParseError::FieldCount {
      line: String::new(),
      expected: 3,
      found: 0,
    })
  });
  let [id, created, size] = record?;
  Ok(ImageInfo {
    id: id.to_string(),
    repository: repository.to_string(),
    tag: tag.to_string(),
    created: created.to_string(),
    size: size.to_string(),
    project: naming::project_from_image(repository, tag),
  })
}

/// Pull the version out of `--version` output, e.g.
/// `Docker version 27.3.1, build ce12230` or `podman version 5.2.3`.
pub fn parse_version_output(text: &str) -> Result<String, ParseError> {
  let mut words = text.split_whitespace();
  while let Some(word) = words.next() {
    if word.eq_ignore_ascii_case("version") {
      if let Some(version) = words.next() {
        let version = version.trim_end_matches(',');
        if !version.is_empty() {
          return Ok(version.to_string());
        }
      }
      break;
    }
  }
  Err(ParseError::MissingVersion(text.trim().to_string()))
}
