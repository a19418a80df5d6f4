//! Downstream build tools.
//!
//! A backend exposes exactly three capabilities, run in order by the
//! orchestrator: `configure` reads the generated toolchain files, `compile`
//! produces the build outputs, and `install` copies them into a staging
//! directory.

mod cmake;
mod custom;

pub use cmake::CmakeBackend;
pub use custom::CustomBackend;

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::execute::ToolError;
use crate::layout::Layout;
use crate::recipe::{BackendSpec, Recipe};
use crate::settings::BuildSettings;

#[derive(Debug, Error)]
pub enum BackendError {
  #[error(transparent)]
  Tool(#[from] ToolError),

  #[error("failed to stage {path}: {source}")]
  Stage {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

impl BackendError {
  /// The failing tool's output, when a tool ran.
  pub fn diagnostics(&self) -> Option<String> {
    match self {
      BackendError::Tool(e) => e.diagnostics(),
      BackendError::Stage { .. } => None,
    }
  }
}

/// Everything a backend may read while running a stage.
pub struct BackendContext<'a> {
  pub recipe: &'a Recipe,
  pub settings: &'a BuildSettings,
  pub layout: &'a Layout,
  /// Parallelism hint forwarded to the tool.
  pub jobs: Option<usize>,
}

#[allow(async_fn_in_trait)]
pub trait BuildBackend {
  fn name(&self) -> &'static str;

  async fn configure(&self, ctx: &BackendContext<'_>) -> Result<(), BackendError>;

  async fn compile(&self, ctx: &BackendContext<'_>) -> Result<(), BackendError>;

  /// Install build outputs under `staging`, which exists and is empty.
  async fn install(&self, ctx: &BackendContext<'_>, staging: &Path) -> Result<(), BackendError>;
}

/// The backend a recipe selects.
#[derive(Debug, Clone)]
pub enum Backend {
  Cmake(CmakeBackend),
  Custom(CustomBackend),
}

impl Backend {
  pub fn from_spec(spec: &BackendSpec) -> Self {
    match spec {
      BackendSpec::Cmake { generator, definitions } => Backend::Cmake(CmakeBackend::new(generator.clone(), definitions.clone())),
      BackendSpec::Custom {
        configure,
        build,
        install,
      } => Backend::Custom(CustomBackend::new(configure.clone(), build.clone(), install.clone())),
    }
  }
}

impl BuildBackend for Backend {
  fn name(&self) -> &'static str {
    match self {
      Backend::Cmake(b) => b.name(),
      Backend::Custom(b) => b.name(),
    }
  }

  async fn configure(&self, ctx: &BackendContext<'_>) -> Result<(), BackendError> {
    match self {
      Backend::Cmake(b) => b.configure(ctx).await,
      Backend::Custom(b) => b.configure(ctx).await,
    }
  }

  async fn compile(&self, ctx: &BackendContext<'_>) -> Result<(), BackendError> {
    match self {
      Backend::Cmake(b) => b.compile(ctx).await,
      Backend::Custom(b) => b.compile(ctx).await,
    }
  }

  async fn install(&self, ctx: &BackendContext<'_>, staging: &Path) -> Result<(), BackendError> {
    match self {
      Backend::Cmake(b) => b.install(ctx, staging).await,
      Backend::Custom(b) => b.install(ctx, staging).await,
    }
  }
}
