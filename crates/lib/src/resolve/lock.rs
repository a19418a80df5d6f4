//! Lock file (`kiln.lock`) pinning the binaries a recipe resolved to.
//!
//! ```json
//! {
//!   "version": 1,
//!   "requires": {
//!     "fmt": {
//!       "version": "10.2.1",
//!       "package_id": "5ab84d6acfe1f23c4fae",
//!       "digest": "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::index::ResolvedDependency;
use crate::util::fs::write_atomic;

pub const LOCK_VERSION: u32 = 1;

pub const LOCK_FILENAME: &str = "kiln.lock";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockFile {
  pub version: u32,
  pub requires: BTreeMap<String, LockedRequirement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedRequirement {
  pub version: String,
  pub package_id: String,
  pub digest: String,
}

#[derive(Debug, Error)]
pub enum LockError {
  #[error("failed to read lock file: {0}")]
  Read(#[source] io::Error),

  #[error("failed to write lock file: {0}")]
  Write(#[source] io::Error),

  #[error("failed to parse lock file: {0}")]
  Parse(#[source] serde_json::Error),

  #[error("failed to serialize lock file: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("unsupported lock file version {0}, expected {LOCK_VERSION}")]
  UnsupportedVersion(u32),
}

impl Default for LockFile {
  fn default() -> Self {
    Self {
      version: LOCK_VERSION,
      requires: BTreeMap::new(),
    }
  }
}

impl LockFile {
  pub fn from_resolved(resolved: &[ResolvedDependency]) -> Self {
    let requires = resolved
      .iter()
      .map(|dep| {
        (
          dep.reference.name.clone(),
          LockedRequirement {
            version: dep.reference.version.clone(),
            package_id: dep.package_id.clone(),
            digest: dep.digest.0.clone(),
          },
        )
      })
      .collect();
    Self {
      version: LOCK_VERSION,
      requires,
    }
  }

  /// Returns `Ok(None)` if the file doesn't exist.
  pub fn load(path: &Path) -> Result<Option<Self>, LockError> {
    let content = match fs::read_to_string(path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
      Err(e) => return Err(LockError::Read(e)),
    };

    let lock: LockFile = serde_json::from_str(&content).map_err(LockError::Parse)?;
    if lock.version != LOCK_VERSION {
      return Err(LockError::UnsupportedVersion(lock.version));
    }
    Ok(Some(lock))
  }

  pub fn save(&self, path: &Path) -> Result<(), LockError> {
    let mut content = serde_json::to_string_pretty(self).map_err(LockError::Serialize)?;
    content.push('\n');
    write_atomic(path, content.as_bytes()).map_err(LockError::Write)
  }

  pub fn get(&self, name: &str) -> Option<&LockedRequirement> {
    self.requires.get(name)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::recipe::DependencyRef;
  use crate::util::hash::ContentHash;
  use tempfile::TempDir;

  fn resolved(name: &str, version: &str, package_id: &str) -> ResolvedDependency {
    ResolvedDependency {
      reference: DependencyRef::new(name, version),
      package_id: package_id.to_string(),
      root: format!("/cache/{name}").into(),
      include_dirs: vec![],
      lib_dirs: vec![],
      bin_dirs: vec![],
      libs: vec![],
      digest: ContentHash(format!("{package_id}-digest")),
    }
  }

  #[test]
  fn from_resolved_keys_by_name() {
    let lock = LockFile::from_resolved(&[resolved("fmt", "10.2.1", "a1"), resolved("spdlog", "1.14.1", "b2")]);
    assert_eq!(lock.requires.len(), 2);
    assert_eq!(lock.get("fmt").unwrap().package_id, "a1");
    assert_eq!(lock.get("spdlog").unwrap().version, "1.14.1");
  }

  #[test]
  fn save_and_load_roundtrip() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(LOCK_FILENAME);
    let lock = LockFile::from_resolved(&[resolved("fmt", "10.2.1", "a1")]);

    lock.save(&path).unwrap();
    assert_eq!(LockFile::load(&path).unwrap(), Some(lock));
  }

  #[test]
  fn missing_file_loads_as_none() {
    let temp = TempDir::new().unwrap();
    assert_eq!(LockFile::load(&temp.path().join(LOCK_FILENAME)).unwrap(), None);
  }

  #[test]
  fn unsupported_version_is_rejected() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(LOCK_FILENAME);
    fs::write(&path, r#"{ "version": 7, "requires": {} }"#).unwrap();
    assert!(matches!(LockFile::load(&path), Err(LockError::UnsupportedVersion(7))));
  }
}
