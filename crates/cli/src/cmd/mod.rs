mod create;
mod info;
mod inspect;
mod install;
mod lock;

pub use create::cmd_create;
pub use info::cmd_info;
pub use inspect::cmd_inspect;
pub use install::cmd_install;
pub use lock::cmd_lock;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::debug;

use kiln_lib::consts::RECIPE_FILENAME;
use kiln_lib::index::{AnyIndex, LocalIndex, RemoteIndex};
use kiln_lib::layout::LayoutOptions;
use kiln_lib::orchestrator::{Orchestrator, OrchestratorOptions, PipelineError};
use kiln_lib::platform::paths::index_dir;
use kiln_lib::recipe::{Recipe, load_recipe};
use kiln_lib::settings::{BuildSettings, Profile, SettingsBuilder, resolve_profile_path};

use crate::{BuildArgs, SettingsArgs};

/// Tag a pipeline error with its stage. The library error already carries
/// the tool's output, so only its display is kept.
pub fn stage_err(e: PipelineError) -> anyhow::Error {
  anyhow!("{} failed: {}", e.stage(), e)
}

pub fn recipe_path(arg: &Path) -> PathBuf {
  if arg.is_dir() { arg.join(RECIPE_FILENAME) } else { arg.to_path_buf() }
}

pub fn load(args: &SettingsArgs) -> Result<(Recipe, BuildSettings)> {
  let path = recipe_path(&args.recipe);
  let recipe = load_recipe(&path).with_context(|| format!("Failed to load recipe {}", path.display()))?;

  let mut builder = SettingsBuilder::new();
  if let Some(profile) = &args.profile {
    let profile_path = resolve_profile_path(profile);
    let loaded = Profile::load(&profile_path).with_context(|| format!("Failed to load profile '{profile}'"))?;
    builder = builder
      .profile(&loaded)
      .with_context(|| format!("Invalid profile '{profile}'"))?;
  }
  for raw in &args.settings {
    builder = builder
      .override_str(raw)
      .with_context(|| format!("Invalid setting override '{raw}'"))?;
  }
  let settings = builder.build().context("Failed to determine build settings")?;

  Ok((recipe, settings))
}

fn open_index(args: &BuildArgs) -> AnyIndex {
  let local = LocalIndex::new(args.index.clone().unwrap_or_else(index_dir));
  match &args.remote {
    Some(url) => AnyIndex::Remote(RemoteIndex::new(url, local)),
    None => AnyIndex::Local(local),
  }
}

/// Relative directory flags are taken relative to the working directory.
fn absolute(path: &Option<PathBuf>) -> Result<Option<PathBuf>> {
  match path {
    Some(p) if p.is_relative() => Ok(Some(std::env::current_dir().context("Failed to read working directory")?.join(p))),
    other => Ok(other.clone()),
  }
}

pub fn orchestrator(args: &BuildArgs) -> Result<Orchestrator> {
  let (recipe, settings) = load(&args.settings)?;
  debug!(recipe = %recipe.reference(), settings = %settings, locked = args.locked, "loaded recipe");
  let options = OrchestratorOptions {
    layout: LayoutOptions {
      build_dir: absolute(&args.build_dir)?,
      package_dir: absolute(&args.package_dir)?,
    },
    jobs: args.jobs,
    locked: args.locked,
  };
  Orchestrator::for_recipe(recipe, settings, open_index(args), options).context("Failed to create async runtime")
}
