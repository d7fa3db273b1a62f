//! Content hashing for build-state change detection.
//!
//! Hashes are SHA-256 over the raw bytes, lowercase hex, with no
//! normalization: a whitespace or line-ending edit is a change.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};

/// A full 64-character SHA-256 hex digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ContentHash(pub String);

impl ContentHash {
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[derive(Debug, thiserror::Error)]
#[error("failed to hash {}: {source}", path.display())]
pub struct HashFileError {
  pub path: PathBuf,
  #[source]
  pub source: io::Error,
}

/// Hash a file's contents.
pub fn hash_file(path: &Path) -> Result<ContentHash, HashFileError> {
  let wrap = |source| HashFileError {
    path: path.to_path_buf(),
    source,
  };
  let mut file = fs::File::open(path).map_err(wrap)?;

  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];

  loop {
    let bytes_read = file.read(&mut buffer).map_err(wrap)?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(ContentHash(hex::encode(hasher.finalize())))
}

/// Hash arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> ContentHash {
  ContentHash(hex::encode(Sha256::digest(data)))
}
