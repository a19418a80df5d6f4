//! End-to-end pipeline tests through the public API.
//!
//! Recipes use the custom backend with `/bin/sh` commands, so these only
//! run on unix.

#![cfg(unix)]

use std::fs;
use std::path::Path;

use kiln_lib::index::{AnyIndex, LocalIndex};
use kiln_lib::orchestrator::{Orchestrator, OrchestratorOptions, PipelineError, PipelineState, Stage};
use kiln_lib::recipe::load_recipe;
use kiln_lib::settings::SettingsBuilder;
use serde_json::json;
use tempfile::TempDir;

const GREETER: &str = r#"
return {
  name = "greeter",
  version = "2.1.0",
  package_type = "library",
  settings = { "build_type" },
  requires = { "fmt/10.2.1" },
  exports_sources = { "src/*" },
  backend = {
    kind = "custom",
    build = "cp \"$KILN_SOURCE_DIR/src/greeter.h\" greeter.h && printf 'ar' > libgreeter.a",
  },
  artifacts = {
    include = { "greeter.h" },
    lib = { "libgreeter.a" },
  },
}
"#;

fn publish_fmt(index: &Path) {
  let version_dir = index.join("fmt").join("10.2.1");
  fs::create_dir_all(version_dir.join("any/include/fmt")).unwrap();
  fs::write(version_dir.join("any/include/fmt/core.h"), "#pragma once\n").unwrap();
  let entry = json!({
    "name": "fmt",
    "version": "10.2.1",
    "binaries": [{ "package_id": "any", "include_dirs": ["include"] }],
  });
  fs::write(version_dir.join("kiln-package.json"), entry.to_string()).unwrap();
}

fn setup(recipe: &str) -> (TempDir, Orchestrator) {
  let temp = TempDir::new().unwrap();
  let project = temp.path().join("greeter");
  fs::create_dir_all(project.join("src")).unwrap();
  fs::write(project.join("src/greeter.h"), "void greet(void);\n").unwrap();
  fs::write(project.join("kiln.lua"), recipe).unwrap();

  let index = temp.path().join("index");
  publish_fmt(&index);

  let recipe = load_recipe(&project.join("kiln.lua")).unwrap();
  let settings = SettingsBuilder::new().set("build_type", "Debug").unwrap().build().unwrap();
  let orchestrator = Orchestrator::for_recipe(
    recipe,
    settings,
    AnyIndex::Local(LocalIndex::new(index)),
    OrchestratorOptions::default(),
  )
  .unwrap();
  (temp, orchestrator)
}

#[test]
fn run_packages_library() {
  let (temp, mut orchestrator) = setup(GREETER);

  let report = orchestrator.run().unwrap();

  assert_eq!(orchestrator.state(), PipelineState::Packaged);
  let package_dir = temp.path().join("greeter/package/Debug");
  assert_eq!(report.package_dir, dunce::canonicalize(&package_dir).unwrap());
  assert_eq!(
    fs::read_to_string(package_dir.join("include/greeter.h")).unwrap(),
    "void greet(void);\n"
  );
  assert!(package_dir.join("lib/libgreeter.a").is_file());
  assert_eq!(report.entry.binaries[0].libs, vec!["greeter".to_string()]);
  assert_eq!(report.entry.binaries[0].settings.get("build_type").map(String::as_str), Some("Debug"));
}

#[test]
fn package_is_consumable_as_index_entry() {
  let (temp, mut orchestrator) = setup(GREETER);
  orchestrator.run().unwrap();

  let metadata = fs::read_to_string(temp.path().join("greeter/package/Debug/kiln-package.json")).unwrap();
  let entry: serde_json::Value = serde_json::from_str(&metadata).unwrap();

  assert_eq!(entry["name"], "greeter");
  assert_eq!(entry["version"], "2.1.0");
  assert_eq!(entry["binaries"][0]["package_id"], orchestrator.package_id().unwrap());
}

#[test]
fn failed_stage_is_terminal() {
  let broken = GREETER.replace("&& printf 'ar' > libgreeter.a", "&& exit 7");
  let (temp, mut orchestrator) = setup(&broken);

  orchestrator.layout().unwrap();
  orchestrator.generate().unwrap();
  let err = orchestrator.build().unwrap_err();

  assert_eq!(err.stage(), "build");
  assert!(err.to_string().contains("exited with code 7"));
  assert_eq!(orchestrator.state(), PipelineState::Failed(Stage::Build));
  assert!(matches!(orchestrator.package(), Err(PipelineError::State(_))));
  assert!(!temp.path().join("greeter/package/Debug").exists());
}

#[test]
fn rerun_produces_identical_generated_files() {
  let (_temp, mut first) = setup(GREETER);
  first.layout().unwrap();
  let generated = first.generate().unwrap();
  let before: Vec<Vec<u8>> = generated.all().map(|p| fs::read(p).unwrap()).collect();

  let recipe = first.recipe().clone();
  let settings = first.settings().clone();
  let index = first.current_layout().unwrap().source_dir.parent().unwrap().join("index");
  let mut second = Orchestrator::for_recipe(
    recipe,
    settings,
    AnyIndex::Local(LocalIndex::new(index)),
    OrchestratorOptions::default(),
  )
  .unwrap();
  second.layout().unwrap();
  let regenerated = second.generate().unwrap();
  let after: Vec<Vec<u8>> = regenerated.all().map(|p| fs::read(p).unwrap()).collect();

  assert_eq!(before, after);
}
