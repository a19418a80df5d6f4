use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{BackendContext, BackendError, BuildBackend};
use crate::consts::SOURCE_DATE_EPOCH;
use crate::execute::{ToolInvocation, find_program, run_tool};
use crate::generate::TOOLCHAIN_FILENAME;

/// Environment variable naming the `cmake` executable to use.
pub const CMAKE_ENV: &str = "KILN_CMAKE";

#[derive(Debug, Clone, Default)]
pub struct CmakeBackend {
  generator: Option<String>,
  definitions: BTreeMap<String, String>,
}

impl CmakeBackend {
  pub fn new(generator: Option<String>, definitions: BTreeMap<String, String>) -> Self {
    Self { generator, definitions }
  }

  pub fn configure_args(&self, ctx: &BackendContext<'_>) -> Vec<String> {
    let layout = ctx.layout;
    let mut args = vec![
      "-S".to_string(),
      layout.source_dir.display().to_string(),
      "-B".to_string(),
      layout.build_dir.display().to_string(),
      format!(
        "-DCMAKE_TOOLCHAIN_FILE={}",
        layout.generators_dir.join(TOOLCHAIN_FILENAME).display()
      ),
      format!("-DCMAKE_BUILD_TYPE={}", ctx.settings.build_type),
    ];
    if let Some(generator) = &self.generator {
      args.extend(["-G".to_string(), generator.clone()]);
    }
    args.extend(self.definitions.iter().map(|(k, v)| format!("-D{k}={v}")));
    args
  }

  pub fn compile_args(&self, ctx: &BackendContext<'_>) -> Vec<String> {
    let mut args = vec![
      "--build".to_string(),
      ctx.layout.build_dir.display().to_string(),
      "--config".to_string(),
      ctx.settings.build_type.to_string(),
    ];
    if let Some(jobs) = ctx.jobs {
      args.extend(["--parallel".to_string(), jobs.to_string()]);
    }
    args
  }

  pub fn install_args(&self, ctx: &BackendContext<'_>, staging: &Path) -> Vec<String> {
    vec![
      "--install".to_string(),
      ctx.layout.build_dir.display().to_string(),
      "--config".to_string(),
      ctx.settings.build_type.to_string(),
      "--prefix".to_string(),
      staging.display().to_string(),
    ]
  }

  fn invocation(&self, ctx: &BackendContext<'_>, args: Vec<String>) -> Result<ToolInvocation, BackendError> {
    let program: PathBuf = find_program("cmake", CMAKE_ENV)?;
    debug!(program = ?program, "using cmake");
    Ok(
      ToolInvocation::new(program, &ctx.layout.build_dir)
        .args(args)
        .env("SOURCE_DATE_EPOCH", SOURCE_DATE_EPOCH),
    )
  }
}

impl BuildBackend for CmakeBackend {
  fn name(&self) -> &'static str {
    "cmake"
  }

  async fn configure(&self, ctx: &BackendContext<'_>) -> Result<(), BackendError> {
    run_tool(&self.invocation(ctx, self.configure_args(ctx))?).await?;
    Ok(())
  }

  async fn compile(&self, ctx: &BackendContext<'_>) -> Result<(), BackendError> {
    run_tool(&self.invocation(ctx, self.compile_args(ctx))?).await?;
    Ok(())
  }

  async fn install(&self, ctx: &BackendContext<'_>, staging: &Path) -> Result<(), BackendError> {
    run_tool(&self.invocation(ctx, self.install_args(ctx, staging))?).await?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::layout::{Layout, LayoutOptions};
  use crate::recipe::load_recipe;
  use crate::settings::{BuildSettings, SettingsBuilder};
  use crate::util::testutil::write_recipe;
  use tempfile::TempDir;

  fn fixture() -> (TempDir, crate::recipe::Recipe, BuildSettings) {
    let temp = TempDir::new().unwrap();
    let path = write_recipe(temp.path(), r#"return { name = "app", version = "1.0.0" }"#);
    let recipe = load_recipe(&path).unwrap();
    let settings = SettingsBuilder::new()
      .set("os", "linux")
      .unwrap()
      .set("arch", "x86_64")
      .unwrap()
      .set("compiler", "gcc")
      .unwrap()
      .set("build_type", "RelWithDebInfo")
      .unwrap()
      .build()
      .unwrap();
    (temp, recipe, settings)
  }

  #[test]
  fn configure_passes_toolchain_type_generator_and_definitions() {
    let (_temp, recipe, settings) = fixture();
    let layout = Layout::new(&recipe, settings.build_type, &LayoutOptions::default());
    let ctx = BackendContext {
      recipe: &recipe,
      settings: &settings,
      layout: &layout,
      jobs: None,
    };
    let backend = CmakeBackend::new(
      Some("Ninja".to_string()),
      BTreeMap::from([("BUILD_TESTING".to_string(), "OFF".to_string())]),
    );

    let args = backend.configure_args(&ctx);
    let toolchain = layout.generators_dir.join("kiln_toolchain.cmake");
    assert_eq!(
      args,
      vec![
        "-S".to_string(),
        recipe.dir.display().to_string(),
        "-B".to_string(),
        layout.build_dir.display().to_string(),
        format!("-DCMAKE_TOOLCHAIN_FILE={}", toolchain.display()),
        "-DCMAKE_BUILD_TYPE=RelWithDebInfo".to_string(),
        "-G".to_string(),
        "Ninja".to_string(),
        "-DBUILD_TESTING=OFF".to_string(),
      ]
    );
  }

  #[test]
  fn compile_forwards_jobs() {
    let (_temp, recipe, settings) = fixture();
    let layout = Layout::new(&recipe, settings.build_type, &LayoutOptions::default());
    let ctx = BackendContext {
      recipe: &recipe,
      settings: &settings,
      layout: &layout,
      jobs: Some(8),
    };

    let args = CmakeBackend::default().compile_args(&ctx);
    assert_eq!(&args[2..], &["--config", "RelWithDebInfo", "--parallel", "8"]);
  }

  #[test]
  fn install_targets_staging_prefix() {
    let (temp, recipe, settings) = fixture();
    let layout = Layout::new(&recipe, settings.build_type, &LayoutOptions::default());
    let ctx = BackendContext {
      recipe: &recipe,
      settings: &settings,
      layout: &layout,
      jobs: None,
    };
    let staging = temp.path().join("staging");

    let args = CmakeBackend::default().install_args(&ctx, &staging);
    assert_eq!(args[0], "--install");
    assert_eq!(args.last().unwrap(), &staging.display().to_string());
  }

  #[tokio::test]
  #[serial_test::serial]
  async fn missing_cmake_fails_configure() {
    let (_temp, recipe, settings) = fixture();
    let layout = Layout::new(&recipe, settings.build_type, &LayoutOptions::default());
    layout.prepare().unwrap();
    let ctx = BackendContext {
      recipe: &recipe,
      settings: &settings,
      layout: &layout,
      jobs: None,
    };

    let result = temp_env::async_with_vars([(CMAKE_ENV, Some("/nonexistent/cmake"))], async {
      CmakeBackend::default().configure(&ctx).await
    })
    .await;
    assert!(matches!(result, Err(BackendError::Tool(crate::execute::ToolError::NotFound { .. }))));
  }
}
