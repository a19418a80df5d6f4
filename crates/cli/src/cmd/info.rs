use anyhow::{Context, Result};
use serde_json::json;

use kiln_lib::platform::paths::{config_dir, index_dir, kiln_home, profiles_dir};
use kiln_lib::platform::platform_triple;
use kiln_lib::settings::SettingsBuilder;

use crate::output::{OutputFormat, print_info, print_json, print_stat};

pub fn cmd_info(format: OutputFormat) -> Result<()> {
  let settings = SettingsBuilder::new()
    .build()
    .context("Failed to detect host settings")?;

  if format.is_json() {
    return print_json(&json!({
      "platform": platform_triple(),
      "settings": settings.to_map(),
      "home": kiln_home(),
      "index": index_dir(),
      "config": config_dir(),
      "profiles": profiles_dir(),
    }));
  }

  println!("System:");
  match platform_triple() {
    Some(triple) => print_stat("Platform", &triple),
    None => print_info("Could not detect platform."),
  }
  print_stat("Settings", &settings.to_string());
  println!();
  println!("Directories:");
  print_stat("Home", &kiln_home().display().to_string());
  print_stat("Index", &index_dir().display().to_string());
  print_stat("Profiles", &profiles_dir().display().to_string());
  Ok(())
}
