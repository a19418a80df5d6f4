//! Directory convention for one build.
//!
//! ```text
//! <recipe dir>/                 source dir
//! <recipe dir>/build/<Type>/    build dir
//!   generators/                 generated toolchain files
//!   .kiln-complete              build-complete marker
//! <recipe dir>/package/<Type>/  package dir
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::consts::GENERATORS_DIRNAME;
use crate::recipe::Recipe;
use crate::settings::BuildType;

#[derive(Debug, Error)]
pub enum LayoutError {
  #[error("cannot create {path}: {source}")]
  Create {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("{path} is not writable: {source}")]
  NotWritable {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("export pattern '{pattern}' matches nothing in {dir}")]
  UnmatchedExport { pattern: String, dir: PathBuf },

  #[error("invalid export pattern '{pattern}': {message}")]
  InvalidExport { pattern: String, message: String },
}

/// Optional overrides for the default directories. Relative paths are
/// taken relative to the recipe directory.
#[derive(Debug, Clone, Default)]
pub struct LayoutOptions {
  pub build_dir: Option<PathBuf>,
  pub package_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Layout {
  pub source_dir: PathBuf,
  pub build_dir: PathBuf,
  pub generators_dir: PathBuf,
  pub package_dir: PathBuf,
}

impl Layout {
  pub fn new(recipe: &Recipe, build_type: BuildType, options: &LayoutOptions) -> Self {
    let source_dir = recipe.dir.clone();
    let anchor = |path: &Path| {
      if path.is_absolute() {
        path.to_path_buf()
      } else {
        source_dir.join(path)
      }
    };

    let build_dir = options
      .build_dir
      .as_deref()
      .map(anchor)
      .unwrap_or_else(|| source_dir.join("build").join(build_type.as_str()));
    let package_dir = options
      .package_dir
      .as_deref()
      .map(anchor)
      .unwrap_or_else(|| source_dir.join("package").join(build_type.as_str()));

    Self {
      generators_dir: build_dir.join(GENERATORS_DIRNAME),
      source_dir,
      build_dir,
      package_dir,
    }
  }

  /// Create the build and generators directories and probe that the build
  /// and package locations accept new files.
  ///
  /// The package directory itself is not created; `package()` swaps it into
  /// place as a whole.
  pub fn prepare(&self) -> Result<(), LayoutError> {
    for dir in [&self.build_dir, &self.generators_dir] {
      fs::create_dir_all(dir).map_err(|source| LayoutError::Create {
        path: dir.clone(),
        source,
      })?;
    }
    probe_writable(&self.build_dir)?;

    let package_parent = self.package_dir.parent().unwrap_or(&self.source_dir);
    fs::create_dir_all(package_parent).map_err(|source| LayoutError::Create {
      path: package_parent.to_path_buf(),
      source,
    })?;
    probe_writable(package_parent)?;

    debug!(build_dir = ?self.build_dir, package_dir = ?self.package_dir, "layout ready");
    Ok(())
  }
}

fn probe_writable(dir: &Path) -> Result<(), LayoutError> {
  tempfile::Builder::new()
    .prefix(".kiln-probe")
    .tempfile_in(dir)
    .map(drop)
    .map_err(|source| LayoutError::NotWritable {
      path: dir.to_path_buf(),
      source,
    })
}

/// Expand every export pattern against the recipe directory.
///
/// Each pattern must match at least one existing path. Returns the matched
/// paths, sorted and relative to the recipe directory.
pub fn check_exports(recipe: &Recipe) -> Result<Vec<PathBuf>, LayoutError> {
  let base = glob::Pattern::escape(&recipe.dir.to_string_lossy());
  let mut matched = Vec::new();

  for pattern in &recipe.exports_sources {
    let full = format!("{base}/{pattern}");
    let paths = glob::glob(&full).map_err(|e| LayoutError::InvalidExport {
      pattern: pattern.clone(),
      message: e.msg.to_string(),
    })?;

    let before = matched.len();
    for path in paths.flatten() {
      if let Ok(rel) = path.strip_prefix(&recipe.dir) {
        matched.push(rel.to_path_buf());
      }
    }
    if matched.len() == before {
      return Err(LayoutError::UnmatchedExport {
        pattern: pattern.clone(),
        dir: recipe.dir.clone(),
      });
    }
  }

  matched.sort();
  matched.dedup();
  Ok(matched)
}
