//! Create command integration tests.

use predicates::prelude::*;

use super::common::{TestEnv, read};

#[test]
fn create_packages_binary() {
  let env = TestEnv::from_fixture("hello.lua");

  env
    .recipe_cmd("create")
    .assert()
    .success()
    .stdout(predicate::str::contains("Packaged hello/1.0.0"));

  assert_eq!(read(&env.package_dir().join("bin/hello")), "#!/bin/sh\necho hello\n");
  assert!(env.build_dir().join(".kiln-complete").is_file());

  let metadata: serde_json::Value = serde_json::from_str(&read(&env.package_dir().join("kiln-package.json"))).unwrap();
  assert_eq!(metadata["name"], "hello");
  assert_eq!(metadata["binaries"][0]["settings"]["build_type"], "Release");
  assert_eq!(metadata["binaries"][0]["bin_dirs"][0], "bin");
}

#[test]
fn create_twice_replaces_package() {
  let env = TestEnv::from_fixture("hello.lua");

  env.recipe_cmd("create").assert().success();
  std::fs::write(env.package_dir().join("stale"), "old").unwrap();
  env.recipe_cmd("create").assert().success();

  assert!(env.package_dir().join("bin/hello").is_file());
  assert!(!env.package_dir().join("stale").exists());
}

#[test]
fn create_json_reports_package() {
  let env = TestEnv::from_fixture("hello.lua");

  let output = env.recipe_cmd("create").args(["--output", "json"]).output().unwrap();
  assert!(output.status.success());

  let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(report["package"], "hello/1.0.0");
  assert_eq!(report["package_id"].as_str().unwrap().len(), 20);
  assert_eq!(report["dependencies"][0]["reference"]["name"], "libA");
}

#[test]
fn missing_version_fails_in_generate() {
  let env = TestEnv::from_fixture("missing_version.lua");

  env
    .recipe_cmd("create")
    .assert()
    .failure()
    .stderr(predicate::str::contains("generate failed"))
    .stderr(predicate::str::contains("libA/9.9.9"));

  assert!(!env.build_dir().join("hello").exists());
  assert!(!env.package_dir().exists());
}

#[test]
fn incompatible_settings_fail_in_generate() {
  let env = TestEnv::from_fixture("hello.lua");

  env
    .kiln_cmd()
    .arg("create")
    .arg(&env.project)
    .arg("--index")
    .arg(env.index_path())
    .args(["-s", "build_type=Debug"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("generate failed"));
}

#[test]
fn compile_failure_surfaces_tool_output() {
  let env = TestEnv::from_fixture("broken_build.lua");

  env
    .recipe_cmd("create")
    .assert()
    .failure()
    .stderr(predicate::str::contains("build failed"))
    .stderr(predicate::str::contains("hello.c:2:1: error: expected declaration"));

  assert!(!env.package_dir().exists());
}

#[test]
fn missing_artifact_fails_in_package() {
  let env = TestEnv::from_fixture("no_output.lua");

  env
    .recipe_cmd("create")
    .assert()
    .failure()
    .stderr(predicate::str::contains("package failed"))
    .stderr(predicate::str::contains("hello"));

  assert!(!env.package_dir().exists());
}
