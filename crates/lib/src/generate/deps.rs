//! `kiln-deps.json`: a backend-neutral map of where every resolved
//! dependency lives, for build systems other than CMake.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::index::ResolvedDependency;
use crate::settings::BuildSettings;

pub const DEPS_MAP_FILENAME: &str = "kiln-deps.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyMap {
  pub version: u32,
  /// `name/version` of the package being built.
  pub package: String,
  pub package_id: String,
  pub settings: BTreeMap<String, String>,
  pub dependencies: BTreeMap<String, DependencyLocation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyLocation {
  pub version: String,
  pub package_id: String,
  pub root: PathBuf,
  pub include_dirs: Vec<PathBuf>,
  pub lib_dirs: Vec<PathBuf>,
  pub bin_dirs: Vec<PathBuf>,
  pub libs: Vec<String>,
}

impl DependencyMap {
  pub fn new(package: String, package_id: String, settings: &BuildSettings, deps: &[ResolvedDependency]) -> Self {
    let dependencies = deps
      .iter()
      .map(|dep| {
        (
          dep.reference.name.clone(),
          DependencyLocation {
            version: dep.reference.version.clone(),
            package_id: dep.package_id.clone(),
            root: dep.root.clone(),
            include_dirs: dep.include_dirs.clone(),
            lib_dirs: dep.lib_dirs.clone(),
            bin_dirs: dep.bin_dirs.clone(),
            libs: dep.libs.clone(),
          },
        )
      })
      .collect();

    Self {
      version: 1,
      package,
      package_id,
      settings: settings.to_map(),
      dependencies,
    }
  }

  pub fn render(&self) -> Result<String, serde_json::Error> {
    let mut out = serde_json::to_string_pretty(self)?;
    out.push('\n');
    Ok(out)
  }
}
