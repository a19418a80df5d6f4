//! Test helpers for kiln-lib.

use std::fs;
use std::path::Path;

use serde_json::json;

/// Write a recipe file into `dir` and return its path.
pub fn write_recipe(dir: &Path, content: &str) -> std::path::PathBuf {
  let path = dir.join(crate::consts::RECIPE_FILENAME);
  fs::write(&path, content).unwrap();
  path
}

/// Publish a header-only package into a local index rooted at `index`.
///
/// The package gets an `include/<name>.h` header and one binary entry
/// with no settings, so it is compatible with every configuration.
pub fn publish_header_only(index: &Path, name: &str, version: &str) {
  let version_dir = index.join(name).join(version);
  let root = version_dir.join("any");
  fs::create_dir_all(root.join("include")).unwrap();
  fs::write(root.join("include").join(format!("{name}.h")), "#pragma once\n").unwrap();

  let entry = json!({
    "name": name,
    "version": version,
    "binaries": [{
      "package_id": "any",
      "settings": {},
      "path": "any",
      "include_dirs": ["include"],
    }],
  });
  fs::write(
    version_dir.join(crate::consts::PACKAGE_METADATA_FILENAME),
    serde_json::to_string_pretty(&entry).unwrap(),
  )
  .unwrap();
}

/// Publish a compiled package whose single binary records `settings`.
pub fn publish_binary(index: &Path, name: &str, version: &str, package_id: &str, settings: &[(&str, &str)]) {
  let version_dir = index.join(name).join(version);
  let root = version_dir.join(package_id);
  fs::create_dir_all(root.join("include")).unwrap();
  fs::create_dir_all(root.join("lib")).unwrap();
  fs::write(root.join("lib").join(format!("lib{name}.a")), "!<arch>\n").unwrap();

  let settings: serde_json::Map<String, serde_json::Value> = settings
    .iter()
    .map(|(k, v)| (k.to_string(), json!(v)))
    .collect();

  let entry = json!({
    "name": name,
    "version": version,
    "binaries": [{
      "package_id": package_id,
      "settings": settings,
      "path": package_id,
      "include_dirs": ["include"],
      "lib_dirs": ["lib"],
      "libs": [name],
    }],
  });
  fs::write(
    version_dir.join(crate::consts::PACKAGE_METADATA_FILENAME),
    serde_json::to_string_pretty(&entry).unwrap(),
  )
  .unwrap();
}
