use anyhow::Result;
use serde_json::json;

use super::load;
use crate::SettingsArgs;
use crate::output::{OutputFormat, print_item, print_json, print_stat, print_success};
use kiln_lib::recipe::BackendSpec;

pub fn cmd_inspect(args: &SettingsArgs, format: OutputFormat) -> Result<()> {
  let (recipe, settings) = load(args)?;

  if format.is_json() {
    return print_json(&json!({
      "recipe": recipe,
      "settings": settings.to_map(),
      "binary_settings": settings.restrict(&recipe.settings),
    }));
  }

  print_success(&recipe.reference().to_string());
  print_stat("Type", recipe.package_type.as_str());
  print_stat("License", recipe.license.as_deref().unwrap_or("none"));
  print_stat("Directory", &recipe.dir.display().to_string());
  let declared: Vec<_> = recipe.settings.iter().map(|k| k.as_str()).collect();
  print_stat("Settings", &declared.join(", "));
  print_stat("Exports", &recipe.exports_sources.join(", "));
  let backend = match &recipe.backend {
    BackendSpec::Cmake { generator: Some(g), .. } => format!("cmake ({g})"),
    BackendSpec::Cmake { .. } => "cmake".to_string(),
    BackendSpec::Custom { .. } => "custom".to_string(),
  };
  print_stat("Backend", &backend);

  if !recipe.requires.is_empty() {
    println!();
    println!("Requires:");
    for dep in &recipe.requires {
      print_item(&dep.name, &dep.version);
    }
  }
  Ok(())
}
