//! Dependency index lookup: `(name, version)` → compatible binary location.
//!
//! # Layout
//!
//! ```text
//! <root>/<name>/<version>/kiln-package.json
//! <root>/<name>/<version>/<package_id>/{include,lib,bin}/...
//! ```
//!
//! `kiln-package.json` lists the available binaries of one version together
//! with the settings each was built for. A binary is usable iff every setting
//! it records matches the consumer's (see
//! [`BuildSettings::is_compatible_with`]).
//!
//! # Submodules
//!
//! - [`local`] - Directory-backed index (also the download cache)
//! - [`remote`] - HTTP index that fills the local cache on demand

pub mod local;
pub mod remote;
mod types;

pub use local::LocalIndex;
pub use remote::RemoteIndex;
pub use types::*;

use std::path::PathBuf;

use thiserror::Error;

use crate::recipe::DependencyRef;
use crate::settings::BuildSettings;

#[derive(Debug, Error)]
pub enum IndexError {
  #[error("package '{0}' not found in index")]
  NotFound(String),

  #[error("version {version} of '{name}' not found (available: {})", format_available(.available))]
  VersionNotFound {
    name: String,
    version: String,
    available: Vec<String>,
  },

  #[error("no binary of {reference} is compatible with {settings} ({candidates} candidate(s) checked)")]
  Incompatible {
    reference: DependencyRef,
    settings: String,
    candidates: usize,
  },

  #[error("corrupt index entry {path}: {message}")]
  Corrupt { path: PathBuf, message: String },

  #[error("fetch failed for {url}: {message}")]
  Fetch { url: String, message: String },

  #[error("hash mismatch for {url}: expected {expected}, got {actual}")]
  HashMismatch {
    url: String,
    expected: String,
    actual: String,
  },

  #[error("cache i/o error at {path}: {source}")]
  Cache {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

fn format_available(available: &[String]) -> String {
  if available.is_empty() {
    "none".to_string()
  } else {
    available.join(", ")
  }
}

/// A source of packages that dependency references are resolved against.
#[allow(async_fn_in_trait)]
pub trait PackageIndex {
  /// Find the binary of `dep` that is compatible with `settings`.
  async fn lookup(&self, dep: &DependencyRef, settings: &BuildSettings) -> Result<ResolvedDependency, IndexError>;
}

/// The indexes the command line can select between.
#[derive(Debug)]
pub enum AnyIndex {
  Local(LocalIndex),
  Remote(RemoteIndex),
}

impl PackageIndex for AnyIndex {
  async fn lookup(&self, dep: &DependencyRef, settings: &BuildSettings) -> Result<ResolvedDependency, IndexError> {
    match self {
      Self::Local(index) => index.lookup(dep, settings).await,
      Self::Remote(index) => index.lookup(dep, settings).await,
    }
  }
}

/// Pick the first binary in file order that `settings` can consume.
pub fn select_binary<'a>(entry: &'a PackageEntry, settings: &BuildSettings) -> Option<&'a BinaryEntry> {
  entry
    .binaries
    .iter()
    .find(|binary| settings.is_compatible_with(&binary.settings))
}
