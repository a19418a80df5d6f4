//! Install command integration tests.

use predicates::prelude::*;

use super::common::{TestEnv, read};

#[test]
fn install_generates_toolchain_files() {
  let env = TestEnv::from_fixture("hello.lua");

  env
    .recipe_cmd("install")
    .assert()
    .success()
    .stdout(predicate::str::contains("libA/1.0.0"));

  let generators = env.build_dir().join("generators");
  let config = read(&generators.join("libA-config.cmake"));
  assert!(config.contains("add_library(libA::libA INTERFACE IMPORTED)"));
  assert!(config.contains("/libA/1.0.0/release/include"));
  assert!(generators.join("libA-config-version.cmake").is_file());
  assert!(read(&generators.join("kiln_toolchain.cmake")).contains("set(CMAKE_BUILD_TYPE Release"));

  let map: serde_json::Value = serde_json::from_str(&read(&generators.join("kiln-deps.json"))).unwrap();
  assert_eq!(map["dependencies"]["libA"]["version"], "1.0.0");

  assert!(!env.build_dir().join(".kiln-complete").exists());
  assert!(!env.package_dir().exists());
}

#[test]
fn install_is_idempotent() {
  let env = TestEnv::from_fixture("hello.lua");
  let generators = env.build_dir().join("generators");
  let files = [
    "kiln_toolchain.cmake",
    "libA-config.cmake",
    "libA-config-version.cmake",
    "kiln-deps.json",
  ];

  env.recipe_cmd("install").assert().success();
  let first: Vec<_> = files.iter().map(|f| std::fs::read(generators.join(f)).unwrap()).collect();
  env.recipe_cmd("install").assert().success();
  let second: Vec<_> = files.iter().map(|f| std::fs::read(generators.join(f)).unwrap()).collect();

  assert_eq!(first, second);
}

#[test]
fn build_dir_override_is_honored() {
  let env = TestEnv::from_fixture("hello.lua");
  let out = env.temp.path().join("out");

  env.recipe_cmd("install").arg("--build-dir").arg(&out).assert().success();

  assert!(out.join("generators/kiln_toolchain.cmake").is_file());
  assert!(!env.build_dir().exists());
}

#[test]
fn profile_supplies_settings() {
  let env = TestEnv::from_fixture("hello.lua");
  let profiles = env.config_path().join("kiln/profiles");
  std::fs::create_dir_all(&profiles).unwrap();
  std::fs::write(profiles.join("debug.toml"), "[settings]\nbuild_type = \"Debug\"\n").unwrap();
  env.publish("libA", "1.0.0", "debug", &[("build_type", "Debug")]);

  env
    .kiln_cmd()
    .arg("install")
    .arg(&env.project)
    .arg("--index")
    .arg(env.index_path())
    .args(["--profile", "debug"])
    .assert()
    .success();

  assert!(env.project.join("build/Debug/generators/libA-config.cmake").is_file());
}
