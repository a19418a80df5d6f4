//! `kiln install`: layout and generate only, for driving the build tool by
//! hand.

use anyhow::Result;
use serde_json::json;

use super::{orchestrator, stage_err};
use crate::BuildArgs;
use crate::output::{OutputFormat, print_item, print_json, print_stat, print_success};

pub fn cmd_install(args: &BuildArgs, format: OutputFormat) -> Result<()> {
  let mut orchestrator = orchestrator(args)?;
  let layout = orchestrator.layout().map_err(stage_err)?;
  let generated = orchestrator.generate().map_err(stage_err)?;

  if format.is_json() {
    return print_json(&json!({
      "package": orchestrator.recipe().reference().to_string(),
      "package_id": orchestrator.package_id(),
      "layout": layout,
      "toolchain": generated.toolchain,
      "deps_map": generated.deps_map,
      "dependencies": orchestrator.resolved(),
    }));
  }

  print_success(&format!(
    "Generated toolchain files for {}",
    orchestrator.recipe().reference()
  ));
  print_stat("Settings", &orchestrator.settings().to_string());
  print_stat("Toolchain", &generated.toolchain.display().to_string());
  print_stat("Dependency map", &generated.deps_map.display().to_string());
  if !orchestrator.resolved().is_empty() {
    println!();
    println!("Dependencies:");
    for dep in orchestrator.resolved() {
      print_item(&dep.reference.to_string(), &dep.root.display().to_string());
    }
  }
  Ok(())
}
