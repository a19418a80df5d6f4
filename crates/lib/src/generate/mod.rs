//! Generated toolchain files.
//!
//! Everything under `<build_dir>/generators/` is derived from the recipe,
//! the settings and the resolved dependencies, and is rewritten on every
//! run. Identical inputs produce byte-identical files.

pub mod cmake;
pub mod deps;

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::index::ResolvedDependency;
use crate::settings::BuildSettings;
use crate::util::fs::write_atomic;

pub use cmake::TOOLCHAIN_FILENAME;
pub use deps::{DEPS_MAP_FILENAME, DependencyLocation, DependencyMap};

#[derive(Debug, Error)]
pub enum GenerateError {
  #[error("failed to write {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to remove stale {path}: {source}")]
  Remove {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to serialize dependency map: {0}")]
  Serialize(#[from] serde_json::Error),
}

/// Inputs for one generator run.
pub struct GenerateInput<'a> {
  /// `name/version` of the package being built.
  pub package: String,
  pub package_id: String,
  pub settings: &'a BuildSettings,
  pub deps: &'a [ResolvedDependency],
  pub generators_dir: &'a Path,
  /// Target platform differs from the host.
  pub cross: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFiles {
  pub toolchain: PathBuf,
  pub deps_map: PathBuf,
  /// Per-dependency config and config-version files, in requirement order.
  pub configs: Vec<PathBuf>,
}

impl GeneratedFiles {
  pub fn all(&self) -> impl Iterator<Item = &PathBuf> {
    std::iter::once(&self.toolchain)
      .chain(std::iter::once(&self.deps_map))
      .chain(self.configs.iter())
  }
}

pub fn generate_files(input: &GenerateInput<'_>) -> Result<GeneratedFiles, GenerateError> {
  let dir = input.generators_dir;
  info!(dir = ?dir, deps = input.deps.len(), "generating toolchain files");

  let toolchain = dir.join(TOOLCHAIN_FILENAME);
  write(
    &toolchain,
    &cmake::render_toolchain(input.settings, dir, input.deps, input.cross),
  )?;

  let mut configs = Vec::with_capacity(input.deps.len() * 2);
  for dep in input.deps {
    let name = &dep.reference.name;
    let config = dir.join(cmake::config_filename(name));
    write(&config, &cmake::render_config(dep))?;
    let version = dir.join(cmake::config_version_filename(name));
    write(&version, &cmake::render_config_version(dep))?;
    configs.extend([config, version]);
  }

  remove_stale_configs(dir, &configs)?;

  let deps_map = dir.join(DEPS_MAP_FILENAME);
  let map = DependencyMap::new(input.package.clone(), input.package_id.clone(), input.settings, input.deps);
  write(&deps_map, &map.render()?)?;

  Ok(GeneratedFiles {
    toolchain,
    deps_map,
    configs,
  })
}

fn write(path: &Path, contents: &str) -> Result<(), GenerateError> {
  debug!(path = ?path, bytes = contents.len(), "writing");
  write_atomic(path, contents.as_bytes()).map_err(|source| GenerateError::Write {
    path: path.to_path_buf(),
    source,
  })
}

/// Delete config files left by earlier runs for dependencies that are no
/// longer required, so `find_package` cannot pick them up.
fn remove_stale_configs(dir: &Path, current: &[PathBuf]) -> Result<(), GenerateError> {
  let entries = match std::fs::read_dir(dir) {
    Ok(entries) => entries,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
    Err(source) => {
      return Err(GenerateError::Remove {
        path: dir.to_path_buf(),
        source,
      });
    }
  };

  for entry in entries.flatten() {
    let path = entry.path();
    let is_config = path
      .file_name()
      .and_then(|n| n.to_str())
      .is_some_and(cmake::is_config_filename);
    if !is_config || !path.is_file() || current.contains(&path) || !is_generated(&path) {
      continue;
    }
    debug!(path = ?path, "removing stale config");
    std::fs::remove_file(&path).map_err(|source| GenerateError::Remove { path, source })?;
  }
  Ok(())
}

fn is_generated(path: &Path) -> bool {
  std::fs::read_to_string(path).is_ok_and(|content| content.starts_with(cmake::HEADER))
}
