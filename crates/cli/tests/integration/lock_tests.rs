//! Lock file integration tests.

use predicates::prelude::*;

use super::common::{TestEnv, read};

#[test]
fn lock_pins_requirements() {
  let env = TestEnv::from_fixture("hello.lua");

  env
    .recipe_cmd("lock")
    .assert()
    .success()
    .stdout(predicate::str::contains("libA/1.0.0"));

  let lock: serde_json::Value = serde_json::from_str(&read(&env.project.join("kiln.lock"))).unwrap();
  assert_eq!(lock["version"], 1);
  assert_eq!(lock["requires"]["libA"]["package_id"], "release");
}

#[test]
fn locked_requires_lock_file() {
  let env = TestEnv::from_fixture("hello.lua");

  env
    .recipe_cmd("install")
    .arg("--locked")
    .assert()
    .failure()
    .stderr(predicate::str::contains("kiln.lock"));
}

#[test]
fn locked_accepts_matching_resolution() {
  let env = TestEnv::from_fixture("hello.lua");

  env.recipe_cmd("lock").assert().success();
  env.recipe_cmd("install").arg("--locked").assert().success();
}

#[test]
fn locked_rejects_republished_binary() {
  let env = TestEnv::from_fixture("hello.lua");
  env.recipe_cmd("lock").assert().success();

  env.publish("libA", "1.0.0", "rebuilt", &[("build_type", "Release")]);

  env
    .recipe_cmd("install")
    .arg("--locked")
    .assert()
    .failure()
    .stderr(predicate::str::contains("lock file pins"));
}
