use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::recipe::DependencyRef;
use crate::util::hash::ContentHash;

/// Contents of `kiln-package.json`: every published binary of one version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageEntry {
  pub name: String,
  pub version: String,
  #[serde(default)]
  pub binaries: Vec<BinaryEntry>,
}

/// One binary configuration of a package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryEntry {
  pub package_id: String,
  /// Settings the binary was built with; empty for header-only packages.
  #[serde(default)]
  pub settings: BTreeMap<String, String>,
  /// Directory of the binary relative to the version directory.
  /// Defaults to the package id.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub path: Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub include_dirs: Vec<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub lib_dirs: Vec<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub bin_dirs: Vec<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub libs: Vec<String>,
  /// SHA-256 of `<package_id>.tar.gz` on a remote index.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sha256: Option<String>,
}

impl BinaryEntry {
  pub fn relative_path(&self) -> &str {
    self.path.as_deref().unwrap_or(&self.package_id)
  }

  /// The package id and path name directories inside the version
  /// directory; reject anything that would resolve outside it.
  pub fn check_paths(&self) -> Result<(), String> {
    let id = Path::new(&self.package_id);
    let single = matches!(id.components().collect::<Vec<_>>().as_slice(), [Component::Normal(_)]);
    if !single || self.package_id.contains(['/', '\\']) {
      return Err(format!("package id '{}' is not a plain directory name", self.package_id));
    }

    if let Some(path) = &self.path {
      let rel = Path::new(path);
      let inside = rel.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        && rel.components().any(|c| matches!(c, Component::Normal(_)));
      if !inside || path.contains('\\') {
        return Err(format!("binary path '{path}' leaves the version directory"));
      }
    }
    Ok(())
  }
}

/// A dependency reference bound to a concrete binary on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedDependency {
  pub reference: DependencyRef,
  pub package_id: String,
  pub root: PathBuf,
  pub include_dirs: Vec<PathBuf>,
  pub lib_dirs: Vec<PathBuf>,
  pub bin_dirs: Vec<PathBuf>,
  pub libs: Vec<String>,
  /// Hash of the index entry the binary was selected from; pinned in the
  /// lock file.
  pub digest: ContentHash,
}

impl ResolvedDependency {
  pub(crate) fn from_binary(reference: &DependencyRef, binary: &BinaryEntry, version_dir: &Path, digest: ContentHash) -> Self {
    let root = version_dir.join(binary.relative_path());
    let join_all = |dirs: &[String]| dirs.iter().map(|d| root.join(d)).collect::<Vec<_>>();
    Self {
      reference: reference.clone(),
      package_id: binary.package_id.clone(),
      include_dirs: join_all(&binary.include_dirs),
      lib_dirs: join_all(&binary.lib_dirs),
      bin_dirs: join_all(&binary.bin_dirs),
      libs: binary.libs.clone(),
      root,
      digest,
    }
  }
}
