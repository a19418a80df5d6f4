//! Build-complete marker written into the build directory after a
//! successful compile.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::util::fs::write_atomic;
use crate::util::hash::{DirHashError, hash_directory};

pub const BUILD_COMPLETE_MARKER: &str = ".kiln-complete";

/// Excluded when hashing build outputs. The marker is written after the
/// hash is taken.
const BUILD_HASH_EXCLUSIONS: &[&str] = &[BUILD_COMPLETE_MARKER];

const MARKER_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildMarker {
  pub version: u32,
  /// Always "complete".
  pub status: String,
  pub package_id: String,
  /// SHA-256 over the build directory, marker excluded.
  pub output_hash: String,
}

#[derive(Debug, Error)]
pub enum MarkerError {
  #[error("failed to hash build outputs: {0}")]
  Hash(#[from] DirHashError),

  #[error("failed to write build marker: {0}")]
  Write(#[source] io::Error),

  #[error("failed to read build marker: {0}")]
  Read(#[source] io::Error),

  #[error("failed to parse build marker: {0}")]
  Parse(#[source] serde_json::Error),

  #[error("failed to serialize build marker: {0}")]
  Serialize(#[source] serde_json::Error),
}

pub fn write_build_marker(build_dir: &Path, package_id: &str) -> Result<BuildMarker, MarkerError> {
  let output_hash = hash_directory(build_dir, BUILD_HASH_EXCLUSIONS)?;
  let marker = BuildMarker {
    version: MARKER_VERSION,
    status: "complete".to_string(),
    package_id: package_id.to_string(),
    output_hash: output_hash.0,
  };

  let mut content = serde_json::to_string(&marker).map_err(MarkerError::Serialize)?;
  content.push('\n');
  write_atomic(&build_dir.join(BUILD_COMPLETE_MARKER), content.as_bytes()).map_err(MarkerError::Write)?;
  debug!(build_dir = ?build_dir, hash = %marker.output_hash, "build marked complete");
  Ok(marker)
}

/// Returns `None` if the marker doesn't exist.
pub fn read_build_marker(build_dir: &Path) -> Result<Option<BuildMarker>, MarkerError> {
  let content = match fs::read_to_string(build_dir.join(BUILD_COMPLETE_MARKER)) {
    Ok(content) => content,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
    Err(e) => return Err(MarkerError::Read(e)),
  };
  serde_json::from_str(&content).map(Some).map_err(MarkerError::Parse)
}

/// Whether the build directory still hashes to what the marker recorded.
pub fn verify_build_marker(build_dir: &Path, marker: &BuildMarker) -> Result<bool, MarkerError> {
  let current = hash_directory(build_dir, BUILD_HASH_EXCLUSIONS)?;
  Ok(current.0 == marker.output_hash)
}
