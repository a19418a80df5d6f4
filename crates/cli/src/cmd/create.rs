//! `kiln create`: the full pipeline.

use anyhow::Result;
use serde_json::json;

use super::{orchestrator, stage_err};
use crate::BuildArgs;
use crate::output::{OutputFormat, print_json, print_stat, print_success, truncate_hash};

pub fn cmd_create(args: &BuildArgs, format: OutputFormat) -> Result<()> {
  let mut orchestrator = orchestrator(args)?;
  let text = !format.is_json();
  let package = orchestrator.recipe().reference();

  let layout = orchestrator.layout().map_err(stage_err)?;
  if text {
    print_success(&format!("Layout ready for {package} ({})", orchestrator.settings()));
  }

  let generated = orchestrator.generate().map_err(stage_err)?;
  if text {
    print_success(&format!(
      "Resolved {} dependencies, generated {} files",
      orchestrator.resolved().len(),
      generated.all().count()
    ));
  }

  orchestrator.build().map_err(stage_err)?;
  if text {
    print_success(&format!("Built in {}", layout.build_dir.display()));
  }

  let report = orchestrator.package().map_err(stage_err)?;
  if format.is_json() {
    print_json(&json!({
      "package": package.to_string(),
      "package_id": report.package_id,
      "settings": orchestrator.settings().to_map(),
      "layout": layout,
      "package_dir": report.package_dir,
      "dependencies": orchestrator.resolved(),
    }))?;
  } else {
    print_success(&format!("Packaged {package}"));
    print_stat("Package id", truncate_hash(&report.package_id));
    print_stat("Package dir", &report.package_dir.display().to_string());
  }

  Ok(())
}
