//! Resolution of a recipe's requirements against a package index.
//!
//! Every requirement is looked up once, in declaration order; the first
//! failure aborts resolution. With a lock file the result must match the
//! pinned package ids and digests exactly.

pub mod lock;

pub use lock::{LOCK_FILENAME, LockError, LockFile, LockedRequirement};

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::generate::GenerateError;
use crate::index::{IndexError, PackageIndex, ResolvedDependency};
use crate::recipe::{DependencyRef, Recipe};
use crate::settings::BuildSettings;
use crate::util::hash::{Hashable, ObjectHash};

#[derive(Debug, Error)]
pub enum ResolutionError {
  #[error("cannot resolve {dep}: {source}")]
  Index {
    dep: DependencyRef,
    #[source]
    source: IndexError,
  },

  #[error("{name} is not pinned in the lock file")]
  NotLocked { name: String },

  #[error("{name} resolved to {resolved}, but the lock file pins {locked}")]
  LockMismatch {
    name: String,
    locked: String,
    resolved: String,
  },

  #[error("lock file pins {0}, which the recipe no longer requires")]
  StaleLock(String),

  #[error("--locked was given but {} does not exist", .0.display())]
  MissingLock(std::path::PathBuf),

  #[error(transparent)]
  Lock(#[from] LockError),

  #[error("failed to compute package id: {0}")]
  PackageId(#[source] serde_json::Error),

  #[error(transparent)]
  Generate(#[from] GenerateError),
}

/// Everything that distinguishes one binary of a package from another.
#[derive(Serialize)]
struct PackageIdInput<'a> {
  name: &'a str,
  version: String,
  package_type: &'static str,
  settings: BTreeMap<String, String>,
  requires: Vec<(String, &'a str)>,
}

impl Hashable for PackageIdInput<'_> {}

/// Package id of `recipe` built with `settings` against `resolved`.
///
/// Only the settings the recipe declares take part.
pub fn compute_package_id(
  recipe: &Recipe,
  settings: &BuildSettings,
  resolved: &[ResolvedDependency],
) -> Result<ObjectHash, ResolutionError> {
  PackageIdInput {
    name: &recipe.name,
    version: recipe.version.to_string(),
    package_type: recipe.package_type.as_str(),
    settings: settings.restrict(&recipe.settings),
    requires: resolved
      .iter()
      .map(|dep| (dep.reference.to_string(), dep.package_id.as_str()))
      .collect(),
  }
  .compute_hash()
  .map_err(ResolutionError::PackageId)
}

/// Resolve `requires` in order, optionally enforcing `lock`.
pub async fn resolve_requirements<I: PackageIndex>(
  index: &I,
  requires: &[DependencyRef],
  settings: &BuildSettings,
  lock: Option<&LockFile>,
) -> Result<Vec<ResolvedDependency>, ResolutionError> {
  info!(count = requires.len(), settings = %settings, "resolving requirements");

  if let Some(lock) = lock
    && let Some(stale) = lock.requires.keys().find(|name| !requires.iter().any(|dep| &dep.name == *name))
  {
    return Err(ResolutionError::StaleLock(stale.clone()));
  }

  let mut resolved = Vec::with_capacity(requires.len());
  for dep in requires {
    if let Some(lock) = lock {
      let pinned = lock.get(&dep.name).ok_or_else(|| ResolutionError::NotLocked {
        name: dep.name.clone(),
      })?;
      if pinned.version != dep.version {
        return Err(ResolutionError::LockMismatch {
          name: dep.name.clone(),
          locked: pinned.version.clone(),
          resolved: dep.version.clone(),
        });
      }
    }

    let found = index
      .lookup(dep, settings)
      .await
      .map_err(|source| ResolutionError::Index {
        dep: dep.clone(),
        source,
      })?;

    if let Some(pinned) = lock.and_then(|lock| lock.get(&dep.name))
      && (pinned.package_id != found.package_id || pinned.digest != found.digest.0)
    {
      return Err(ResolutionError::LockMismatch {
        name: dep.name.clone(),
        locked: format!("{}#{}", pinned.package_id, pinned.digest),
        resolved: format!("{}#{}", found.package_id, found.digest.0),
      });
    }

    debug!(dep = %dep, package_id = %found.package_id, root = %found.root.display(), "resolved");
    resolved.push(found);
  }

  Ok(resolved)
}
