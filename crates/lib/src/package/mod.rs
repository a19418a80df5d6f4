//! Packaging: moving build outputs into the package directory.
//!
//! Packaging either completes or leaves the package directory untouched.
//! Preconditions are checked before any side effect; the backend installs
//! into a fresh staging directory next to the package directory, and the
//! staging tree replaces the package directory with a rename only after
//! every declared artifact has been found in it.

pub mod marker;

pub use marker::{BUILD_COMPLETE_MARKER, BuildMarker, MarkerError, read_build_marker, verify_build_marker, write_build_marker};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::backend::BackendError;
use crate::consts::PACKAGE_METADATA_FILENAME;
use crate::index::{BinaryEntry, PackageEntry};
use crate::layout::Layout;
use crate::recipe::{ArtifactKind, Recipe};
use crate::settings::BuildSettings;
use crate::util::fs::write_atomic;

#[derive(Debug, Error)]
pub enum InstallError {
  #[error("build in {build_dir} is not complete: {reason}")]
  BuildIncomplete { build_dir: PathBuf, reason: String },

  #[error("expected {kind} artifact {path} is missing")]
  MissingArtifact { kind: &'static str, path: PathBuf },

  #[error("install step did not produce {path}")]
  MissingStagedArtifact { path: PathBuf },

  #[error(transparent)]
  Backend(#[from] BackendError),

  #[error(transparent)]
  Marker(#[from] MarkerError),

  #[error("{path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to serialize package metadata: {0}")]
  Metadata(#[source] serde_json::Error),
}

impl InstallError {
  fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
    move |source| InstallError::Io {
      path: path.to_path_buf(),
      source,
    }
  }
}

/// Check the build-complete marker and every declared artifact.
///
/// Touches nothing on disk.
pub fn check_preconditions(recipe: &Recipe, layout: &Layout) -> Result<BuildMarker, InstallError> {
  let incomplete = |reason: &str| InstallError::BuildIncomplete {
    build_dir: layout.build_dir.clone(),
    reason: reason.to_string(),
  };

  let marker = read_build_marker(&layout.build_dir)?.ok_or_else(|| incomplete("no build-complete marker"))?;
  if !verify_build_marker(&layout.build_dir, &marker)? {
    return Err(incomplete("build outputs changed after the build finished"));
  }

  for (kind, paths) in &recipe.artifacts {
    for rel in paths {
      let path = layout.build_dir.join(rel);
      if !path.exists() {
        return Err(InstallError::MissingArtifact {
          kind: kind.dir_name(),
          path,
        });
      }
    }
  }

  Ok(marker)
}

/// Where a declared artifact is expected after install.
pub fn staged_artifact_path(staging: &Path, kind: ArtifactKind, rel: &str) -> PathBuf {
  let dir = staging.join(kind.dir_name());
  match Path::new(rel).file_name() {
    Some(name) => dir.join(name),
    None => dir,
  }
}

/// Create an empty staging directory beside the package directory so the
/// final swap is a same-filesystem rename.
pub fn begin_staging(layout: &Layout) -> Result<TempDir, InstallError> {
  let parent = layout.package_dir.parent().unwrap_or(&layout.build_dir);
  fs::create_dir_all(parent).map_err(InstallError::io(parent))?;
  tempfile::Builder::new()
    .prefix(".kiln-staging-")
    .tempdir_in(parent)
    .map_err(InstallError::io(parent))
}

pub fn verify_staged(recipe: &Recipe, staging: &Path) -> Result<(), InstallError> {
  for (kind, paths) in &recipe.artifacts {
    for rel in paths {
      let path = staged_artifact_path(staging, *kind, rel);
      if !path.exists() {
        return Err(InstallError::MissingStagedArtifact { path });
      }
    }
  }
  Ok(())
}

/// Describe the staged tree as a single-binary index entry.
pub fn package_entry(recipe: &Recipe, settings: &BuildSettings, package_id: &str, staging: &Path) -> PackageEntry {
  let existing = |kind: ArtifactKind| {
    let dir = kind.dir_name();
    if staging.join(dir).is_dir() { vec![dir.to_string()] } else { Vec::new() }
  };

  let libs = recipe
    .artifacts
    .get(&ArtifactKind::Lib)
    .map(|paths| paths.iter().filter_map(|p| library_name(p)).collect())
    .unwrap_or_default();

  PackageEntry {
    name: recipe.name.clone(),
    version: recipe.version.to_string(),
    binaries: vec![BinaryEntry {
      package_id: package_id.to_string(),
      settings: settings.restrict(&recipe.settings),
      path: Some(".".to_string()),
      include_dirs: existing(ArtifactKind::Include),
      lib_dirs: existing(ArtifactKind::Lib),
      bin_dirs: existing(ArtifactKind::Bin),
      libs,
      sha256: None,
    }],
  }
}

/// `lib/libfoo.a` → `foo`, `foo.lib` → `foo`.
fn library_name(path: &str) -> Option<String> {
  let stem = Path::new(path).file_stem()?.to_str()?;
  let stem = stem.split('.').next().unwrap_or(stem);
  Some(stem.strip_prefix("lib").filter(|s| !s.is_empty()).unwrap_or(stem).to_string())
}

pub fn write_package_entry(entry: &PackageEntry, staging: &Path) -> Result<PathBuf, InstallError> {
  let path = staging.join(PACKAGE_METADATA_FILENAME);
  let mut content = serde_json::to_string_pretty(entry).map_err(InstallError::Metadata)?;
  content.push('\n');
  write_atomic(&path, content.as_bytes()).map_err(InstallError::io(&path))?;
  Ok(path)
}

/// Replace `package_dir` with the staging tree.
///
/// An existing package directory is moved aside first and restored if the
/// final rename fails.
pub fn commit(staging: TempDir, package_dir: &Path) -> Result<(), InstallError> {
  let staged = staging.keep();

  let backup = package_dir.with_file_name(format!(
    ".kiln-old-{}",
    package_dir.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
  ));
  if backup.exists() {
    fs::remove_dir_all(&backup).map_err(InstallError::io(&backup))?;
  }

  let had_previous = package_dir.exists();
  if had_previous {
    fs::rename(package_dir, &backup).map_err(InstallError::io(package_dir))?;
  }

  if let Err(source) = fs::rename(&staged, package_dir) {
    if had_previous && let Err(e) = fs::rename(&backup, package_dir) {
      warn!(error = %e, backup = ?backup, "failed to restore previous package");
    }
    let _ = fs::remove_dir_all(&staged);
    return Err(InstallError::Io {
      path: package_dir.to_path_buf(),
      source,
    });
  }

  if had_previous && let Err(e) = fs::remove_dir_all(&backup) {
    debug!(error = %e, backup = ?backup, "failed to remove previous package");
  }

  info!(package_dir = ?package_dir, "package committed");
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::layout::LayoutOptions;
  use crate::recipe::load_recipe;
  use crate::settings::SettingsBuilder;
  use crate::util::testutil::write_recipe;

  fn fixture(artifacts: &str) -> (TempDir, Recipe, Layout) {
    let temp = TempDir::new().unwrap();
    let path = write_recipe(
      temp.path(),
      &format!(
        r#"return {{ name = "app", version = "2.1.0", settings = {{ "os", "build_type" }}, artifacts = {artifacts} }}"#
      ),
    );
    let recipe = load_recipe(&path).unwrap();
    let layout = Layout::new(&recipe, crate::settings::BuildType::Release, &LayoutOptions::default());
    layout.prepare().unwrap();
    (temp, recipe, layout)
  }

  mod preconditions {
    use super::*;

    #[test]
    fn missing_marker_is_incomplete() {
      let (_temp, recipe, layout) = fixture("{}");
      let err = check_preconditions(&recipe, &layout).unwrap_err();
      assert!(matches!(err, InstallError::BuildIncomplete { .. }));
    }

    #[test]
    fn missing_artifact_is_reported() {
      let (_temp, recipe, layout) = fixture(r#"{ bin = { "app" } }"#);
      write_build_marker(&layout.build_dir, "id").unwrap();

      let err = check_preconditions(&recipe, &layout).unwrap_err();
      assert!(matches!(err, InstallError::MissingArtifact { kind: "bin", ref path } if path.ends_with("app")));
      assert!(!layout.package_dir.exists());
    }

    #[test]
    fn complete_build_passes() {
      let (_temp, recipe, layout) = fixture(r#"{ bin = { "app" } }"#);
      fs::write(layout.build_dir.join("app"), "binary").unwrap();
      let marker = write_build_marker(&layout.build_dir, "id").unwrap();

      assert_eq!(check_preconditions(&recipe, &layout).unwrap(), marker);
    }
  }

  #[test]
  fn staged_paths_use_kind_dir_and_file_name() {
    let staging = Path::new("/s");
    assert_eq!(
      staged_artifact_path(staging, ArtifactKind::Lib, "out/libfoo.a"),
      PathBuf::from("/s/lib/libfoo.a")
    );
  }

  #[test]
  fn library_names_drop_prefix_and_extension() {
    assert_eq!(library_name("out/libfoo.a").as_deref(), Some("foo"));
    assert_eq!(library_name("foo.lib").as_deref(), Some("foo"));
    assert_eq!(library_name("libbar.so.1").as_deref(), Some("bar"));
  }

  #[test]
  fn package_entry_describes_staged_dirs() {
    let (_temp, recipe, layout) = fixture(r#"{ lib = { "libapp.a" } }"#);
    let staging = begin_staging(&layout).unwrap();
    fs::create_dir_all(staging.path().join("lib")).unwrap();
    let settings = SettingsBuilder::new().set("os", "linux").unwrap().build().unwrap();

    let entry = package_entry(&recipe, &settings, "pid", staging.path());
    let binary = &entry.binaries[0];
    assert_eq!(entry.version, "2.1.0");
    assert_eq!(binary.lib_dirs, vec!["lib"]);
    assert!(binary.include_dirs.is_empty());
    assert_eq!(binary.libs, vec!["app"]);
    assert_eq!(binary.settings.keys().collect::<Vec<_>>(), vec!["build_type", "os"]);
  }

  mod commit {
    use super::*;

    #[test]
    fn replaces_previous_package() {
      let (_temp, _recipe, layout) = fixture("{}");
      fs::create_dir_all(layout.package_dir.join("bin")).unwrap();
      fs::write(layout.package_dir.join("bin/old"), "old").unwrap();

      let staging = begin_staging(&layout).unwrap();
      fs::create_dir_all(staging.path().join("bin")).unwrap();
      fs::write(staging.path().join("bin/new"), "new").unwrap();
      commit(staging, &layout.package_dir).unwrap();

      assert!(layout.package_dir.join("bin/new").is_file());
      assert!(!layout.package_dir.join("bin/old").exists());
      let leftovers: Vec<_> = fs::read_dir(layout.package_dir.parent().unwrap())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with(".kiln"))
        .collect();
      assert!(leftovers.is_empty(), "leftovers: {leftovers:?}");
    }

    #[test]
    fn dropped_staging_leaves_nothing() {
      let (_temp, _recipe, layout) = fixture("{}");
      let staging = begin_staging(&layout).unwrap();
      let path = staging.path().to_path_buf();
      drop(staging);

      assert!(!path.exists());
      assert!(!layout.package_dir.exists());
    }
  }
}
