use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::{debug, info};

use super::{BackendContext, BackendError, BuildBackend};
use crate::consts::SOURCE_DATE_EPOCH;
use crate::execute::{ToolInvocation, run_tool};
use crate::util::fs::copy_dir_all;

/// Recipe-supplied shell commands, run in the build directory.
#[derive(Debug, Clone)]
pub struct CustomBackend {
  configure: Option<String>,
  build: String,
  install: Option<String>,
}

impl CustomBackend {
  pub fn new(configure: Option<String>, build: String, install: Option<String>) -> Self {
    Self {
      configure,
      build,
      install,
    }
  }

  fn env(ctx: &BackendContext<'_>) -> BTreeMap<String, String> {
    let layout = ctx.layout;
    let mut env = BTreeMap::new();
    env.insert("KILN_SOURCE_DIR".to_string(), layout.source_dir.display().to_string());
    env.insert("KILN_BUILD_DIR".to_string(), layout.build_dir.display().to_string());
    env.insert(
      "KILN_GENERATORS_DIR".to_string(),
      layout.generators_dir.display().to_string(),
    );
    env.insert("KILN_BUILD_TYPE".to_string(), ctx.settings.build_type.to_string());
    env.insert("SOURCE_DATE_EPOCH".to_string(), SOURCE_DATE_EPOCH.to_string());
    if let Some(jobs) = ctx.jobs {
      env.insert("KILN_JOBS".to_string(), jobs.to_string());
    }
    env
  }

  async fn run(ctx: &BackendContext<'_>, script: &str, env: &BTreeMap<String, String>) -> Result<(), BackendError> {
    let invocation = ToolInvocation::shell(script, &ctx.layout.build_dir).envs(env);
    run_tool(&invocation).await?;
    Ok(())
  }
}

impl BuildBackend for CustomBackend {
  fn name(&self) -> &'static str {
    "custom"
  }

  async fn configure(&self, ctx: &BackendContext<'_>) -> Result<(), BackendError> {
    match &self.configure {
      Some(script) => Self::run(ctx, script, &Self::env(ctx)).await,
      None => {
        debug!("no configure command");
        Ok(())
      }
    }
  }

  async fn compile(&self, ctx: &BackendContext<'_>) -> Result<(), BackendError> {
    Self::run(ctx, &self.build, &Self::env(ctx)).await
  }

  async fn install(&self, ctx: &BackendContext<'_>, staging: &Path) -> Result<(), BackendError> {
    if let Some(script) = &self.install {
      let mut env = Self::env(ctx);
      env.insert("KILN_PACKAGE_DIR".to_string(), staging.display().to_string());
      return Self::run(ctx, script, &env).await;
    }

    info!(staging = ?staging, "copying declared artifacts");
    stage_artifacts(ctx, staging)
  }
}

/// Copy every declared artifact from the build directory to
/// `<staging>/<kind>/<file name>`.
fn stage_artifacts(ctx: &BackendContext<'_>, staging: &Path) -> Result<(), BackendError> {
  for (kind, paths) in &ctx.recipe.artifacts {
    let dest_dir = staging.join(kind.dir_name());
    fs::create_dir_all(&dest_dir).map_err(|source| BackendError::Stage {
      path: dest_dir.clone(),
      source,
    })?;

    for rel in paths {
      let src = ctx.layout.build_dir.join(rel);
      let Some(file_name) = src.file_name() else {
        continue;
      };
      let dest = dest_dir.join(file_name);
      let copied = if src.is_dir() {
        copy_dir_all(&src, &dest)
      } else {
        fs::copy(&src, &dest).map(drop)
      };
      copied.map_err(|source| BackendError::Stage { path: src.clone(), source })?;
      debug!(from = ?src, to = ?dest, "staged");
    }
  }
  Ok(())
}
