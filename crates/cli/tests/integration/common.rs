//! Shared test helpers for CLI integration tests.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::json;
use tempfile::TempDir;

/// Get path to a fixture file.
pub fn fixture_path(name: &str) -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("tests")
    .join("fixtures")
    .join(name)
}

/// Read fixture content.
pub fn fixture_content(name: &str) -> String {
  std::fs::read_to_string(fixture_path(name)).unwrap_or_else(|e| panic!("Failed to load fixture {}: {}", name, e))
}

/// Isolated test environment.
///
/// Each test gets its own temporary directory holding a project with a
/// `kiln.lua`, a local package index and an isolated kiln home.
pub struct TestEnv {
  pub temp: TempDir,
  pub project: PathBuf,
}

impl TestEnv {
  /// Create a project from a fixture recipe, with `libA/1.0.0` published.
  pub fn from_fixture(name: &str) -> Self {
    let temp = TempDir::new().unwrap();
    let project = temp.path().join("project");
    std::fs::create_dir_all(project.join("src")).unwrap();
    std::fs::write(project.join("kiln.lua"), fixture_content(name)).unwrap();
    std::fs::write(project.join("src/hello.sh"), "#!/bin/sh\necho hello\n").unwrap();

    let env = Self {
      project: dunce::canonicalize(&project).unwrap_or(project),
      temp,
    };
    env.publish("libA", "1.0.0", "release", &[("build_type", "Release")]);
    env
  }

  pub fn index_path(&self) -> PathBuf {
    self.temp.path().join("index")
  }

  pub fn home_path(&self) -> PathBuf {
    let p = self.temp.path().join("home");
    std::fs::create_dir_all(&p).unwrap();
    p
  }

  pub fn config_path(&self) -> PathBuf {
    let p = self.temp.path().join("config");
    std::fs::create_dir_all(&p).unwrap();
    p
  }

  /// Publish a binary with an include and a lib directory.
  pub fn publish(&self, name: &str, version: &str, package_id: &str, settings: &[(&str, &str)]) {
    let version_dir = self.index_path().join(name).join(version);
    let root = version_dir.join(package_id);
    std::fs::create_dir_all(root.join("include")).unwrap();
    std::fs::create_dir_all(root.join("lib")).unwrap();

    let settings: serde_json::Map<_, _> = settings.iter().map(|(k, v)| (k.to_string(), json!(v))).collect();
    let entry = json!({
      "name": name,
      "version": version,
      "binaries": [{
        "package_id": package_id,
        "settings": settings,
        "include_dirs": ["include"],
        "lib_dirs": ["lib"],
        "libs": [name],
      }],
    });
    std::fs::write(
      version_dir.join("kiln-package.json"),
      serde_json::to_string_pretty(&entry).unwrap(),
    )
    .unwrap();
  }

  pub fn build_dir(&self) -> PathBuf {
    self.project.join("build").join("Release")
  }

  pub fn package_dir(&self) -> PathBuf {
    self.project.join("package").join("Release")
  }

  /// Get a pre-configured Command for the kiln binary.
  ///
  /// Sets environment variables for isolated testing:
  /// - `KILN_HOME`: isolated cache and index root
  /// - `XDG_CONFIG_HOME` / `APPDATA`: isolated profiles directory
  /// - `KILN_REMOTE` removed so no test reaches the network
  pub fn kiln_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("kiln");
    cmd.env("KILN_HOME", self.home_path());
    cmd.env("XDG_CONFIG_HOME", self.config_path());
    cmd.env("APPDATA", self.config_path());
    cmd.env_remove("KILN_REMOTE");
    cmd.env_remove("RUST_LOG");
    cmd
  }

  /// `kiln <subcommand> <project> --index <index> -s build_type=Release`.
  pub fn recipe_cmd(&self, subcommand: &str) -> Command {
    let mut cmd = self.kiln_cmd();
    cmd
      .arg(subcommand)
      .arg(&self.project)
      .arg("--index")
      .arg(self.index_path())
      .args(["-s", "build_type=Release"]);
    cmd
  }
}

pub fn read(path: &Path) -> String {
  std::fs::read_to_string(path).unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e))
}
