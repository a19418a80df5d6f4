//! Directory-backed package index.

use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::consts::PACKAGE_METADATA_FILENAME;
use crate::index::{BinaryEntry, IndexError, PackageEntry, PackageIndex, ResolvedDependency, select_binary};
use crate::recipe::DependencyRef;
use crate::settings::BuildSettings;
use crate::util::hash::{ContentHash, hash_bytes};

#[derive(Debug, Clone)]
pub struct LocalIndex {
  root: PathBuf,
}

impl LocalIndex {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn version_dir(&self, name: &str, version: &str) -> PathBuf {
    self.root.join(name).join(version)
  }

  /// Read the entry for `dep`, returning `Ok(None)` when the version is not
  /// present.
  pub async fn read_entry(&self, dep: &DependencyRef) -> Result<Option<PackageEntry>, IndexError> {
    let path = self.version_dir(&dep.name, &dep.version).join(PACKAGE_METADATA_FILENAME);
    let bytes = match tokio::fs::read(&path).await {
      Ok(bytes) => bytes,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
      Err(source) => return Err(IndexError::Cache { path, source }),
    };

    let entry: PackageEntry = serde_json::from_slice(&bytes).map_err(|e| IndexError::Corrupt {
      path: path.clone(),
      message: e.to_string(),
    })?;

    if entry.name != dep.name || entry.version != dep.version {
      return Err(IndexError::Corrupt {
        path,
        message: format!("entry describes {}/{}", entry.name, entry.version),
      });
    }

    Ok(Some(entry))
  }

  /// Versions of `name` present in the index, sorted.
  pub fn available_versions(&self, name: &str) -> Vec<String> {
    let Ok(dir) = std::fs::read_dir(self.root.join(name)) else {
      return Vec::new();
    };

    let mut versions: Vec<String> = dir
      .filter_map(Result::ok)
      .filter(|e| e.path().join(PACKAGE_METADATA_FILENAME).is_file())
      .filter_map(|e| e.file_name().to_str().map(str::to_string))
      .collect();
    versions.sort();
    versions
  }

  pub(crate) fn not_found(&self, dep: &DependencyRef) -> IndexError {
    if self.root.join(&dep.name).is_dir() {
      IndexError::VersionNotFound {
        name: dep.name.clone(),
        version: dep.version.clone(),
        available: self.available_versions(&dep.name),
      }
    } else {
      IndexError::NotFound(dep.name.clone())
    }
  }

  /// Resolve against a loaded entry; `None` when no binary is compatible.
  pub(crate) fn resolve_entry(
    &self,
    dep: &DependencyRef,
    entry: &PackageEntry,
    settings: &BuildSettings,
  ) -> Result<Option<ResolvedDependency>, IndexError> {
    let Some(binary) = select_binary(entry, settings) else {
      return Ok(None);
    };
    binary.check_paths().map_err(|message| IndexError::Corrupt {
      path: self.version_dir(&dep.name, &dep.version).join(PACKAGE_METADATA_FILENAME),
      message,
    })?;

    let digest = binary_digest(binary).map_err(|e| IndexError::Corrupt {
      path: self.version_dir(&dep.name, &dep.version),
      message: e.to_string(),
    })?;
    let version_dir = self.version_dir(&dep.name, &dep.version);
    let resolved = ResolvedDependency::from_binary(dep, binary, &version_dir, digest);
    if !resolved.root.is_dir() {
      return Err(IndexError::Corrupt {
        path: resolved.root,
        message: format!("binary {} of {} is listed but missing", binary.package_id, dep),
      });
    }

    trace!(dep = %dep, package_id = %resolved.package_id, "selected binary");
    Ok(Some(resolved))
  }
}

/// Digest of a single binary entry; stable when other binaries are added to
/// the same version.
pub(crate) fn binary_digest(binary: &BinaryEntry) -> Result<ContentHash, serde_json::Error> {
  Ok(hash_bytes(&serde_json::to_vec(binary)?))
}

impl PackageIndex for LocalIndex {
  async fn lookup(&self, dep: &DependencyRef, settings: &BuildSettings) -> Result<ResolvedDependency, IndexError> {
    debug!(dep = %dep, root = %self.root.display(), "local index lookup");

    let Some(entry) = self.read_entry(dep).await? else {
      return Err(self.not_found(dep));
    };

    self
      .resolve_entry(dep, &entry, settings)?
      .ok_or_else(|| IndexError::Incompatible {
        reference: dep.clone(),
        settings: settings.to_string(),
        candidates: entry.binaries.len(),
      })
  }
}
