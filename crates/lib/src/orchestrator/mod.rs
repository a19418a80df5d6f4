//! The build pipeline: `layout → generate → build → package`.
//!
//! [`Orchestrator`] owns the recipe, the settings and a current-thread
//! runtime. Each public stage method blocks until the stage finishes and
//! advances the [`PipelineState`]; calling a stage out of order returns a
//! [`StateError`] without running it, and any stage failure leaves the
//! pipeline in the terminal `Failed` state.

mod error;
mod state;

pub use error::{PipelineError, StateError};
pub use state::{PipelineState, Stage};

use std::io;
use std::path::PathBuf;

use serde::Serialize;
use tokio::runtime::Runtime;
use tracing::{error, info};

use crate::backend::{Backend, BackendContext, BuildBackend};
use crate::generate::{GenerateInput, GeneratedFiles, generate_files};
use crate::index::{AnyIndex, PackageEntry, PackageIndex, ResolvedDependency};
use crate::layout::{Layout, LayoutError, LayoutOptions, check_exports};
use crate::package::{self, InstallError};
use crate::platform::Platform;
use crate::recipe::Recipe;
use crate::resolve::{LOCK_FILENAME, LockFile, ResolutionError, compute_package_id, resolve_requirements};
use crate::settings::BuildSettings;

#[derive(Debug, Clone, Default)]
pub struct OrchestratorOptions {
  pub layout: LayoutOptions,
  /// Parallelism hint for the compile step.
  pub jobs: Option<usize>,
  /// Require `kiln.lock` and reject any resolution that differs from it.
  pub locked: bool,
}

/// Result of a successful `package()`.
#[derive(Debug, Clone, Serialize)]
pub struct PackageReport {
  pub package_dir: PathBuf,
  pub package_id: String,
  pub entry: PackageEntry,
}

pub struct Orchestrator<B = Backend, I = AnyIndex> {
  recipe: Recipe,
  settings: BuildSettings,
  backend: B,
  index: I,
  options: OrchestratorOptions,
  runtime: Runtime,
  state: PipelineState,
  layout: Option<Layout>,
  resolved: Vec<ResolvedDependency>,
  package_id: Option<String>,
  generated: Option<GeneratedFiles>,
}

impl<I: PackageIndex> Orchestrator<Backend, I> {
  /// Orchestrator using the backend the recipe selects.
  pub fn for_recipe(recipe: Recipe, settings: BuildSettings, index: I, options: OrchestratorOptions) -> io::Result<Self> {
    let backend = Backend::from_spec(&recipe.backend);
    Self::new(recipe, settings, backend, index, options)
  }
}

impl<B: BuildBackend, I: PackageIndex> Orchestrator<B, I> {
  pub fn new(recipe: Recipe, settings: BuildSettings, backend: B, index: I, options: OrchestratorOptions) -> io::Result<Self> {
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    Ok(Self {
      recipe,
      settings,
      backend,
      index,
      options,
      runtime,
      state: PipelineState::Unconfigured,
      layout: None,
      resolved: Vec::new(),
      package_id: None,
      generated: None,
    })
  }

  pub fn state(&self) -> PipelineState {
    self.state
  }

  pub fn recipe(&self) -> &Recipe {
    &self.recipe
  }

  pub fn settings(&self) -> &BuildSettings {
    &self.settings
  }

  pub fn current_layout(&self) -> Option<&Layout> {
    self.layout.as_ref()
  }

  pub fn resolved(&self) -> &[ResolvedDependency] {
    &self.resolved
  }

  pub fn package_id(&self) -> Option<&str> {
    self.package_id.as_deref()
  }

  pub fn generated(&self) -> Option<&GeneratedFiles> {
    self.generated.as_ref()
  }

  pub fn lock_path(&self) -> PathBuf {
    self.recipe.dir.join(LOCK_FILENAME)
  }

  /// Establish and create the directory layout.
  pub fn layout(&mut self) -> Result<Layout, PipelineError> {
    self.enter(Stage::Layout)?;
    let result = self.prepare_layout();
    let layout = self.finish(Stage::Layout, result.map_err(PipelineError::from))?;
    self.layout = Some(layout.clone());
    Ok(layout)
  }

  /// Resolve every requirement and write the generated toolchain files.
  pub fn generate(&mut self) -> Result<GeneratedFiles, PipelineError> {
    self.enter(Stage::Generate)?;
    let result = match &self.layout {
      Some(layout) => self.resolve_and_generate(layout).map_err(PipelineError::from),
      None => Err(self.state_error(Stage::Generate)),
    };
    let (resolved, package_id, generated) = self.finish(Stage::Generate, result)?;
    info!(package_id = %package_id, deps = resolved.len(), "dependencies resolved");
    self.resolved = resolved;
    self.package_id = Some(package_id);
    self.generated = Some(generated.clone());
    Ok(generated)
  }

  /// Configure, then compile, then mark the build complete.
  pub fn build(&mut self) -> Result<(), PipelineError> {
    self.enter(Stage::Build)?;
    info!(backend = self.backend.name(), jobs = ?self.options.jobs, "configuring and compiling");

    let configured = match self.backend_context() {
      Some(ctx) => self
        .runtime
        .block_on(self.backend.configure(&ctx))
        .map_err(PipelineError::Configure),
      None => Err(self.state_error(Stage::Build)),
    };
    self.finish(Stage::Build, configured)?;
    self.state = PipelineState::Configured;

    let compiled = match self.backend_context() {
      Some(ctx) => self
        .runtime
        .block_on(self.backend.compile(&ctx))
        .map_err(PipelineError::Compile),
      None => Err(self.state_error(Stage::Build)),
    };
    self.finish(Stage::Build, compiled)?;

    let marked = match (&self.layout, &self.package_id) {
      (Some(layout), Some(package_id)) => package::write_build_marker(&layout.build_dir, package_id).map_err(PipelineError::from),
      _ => Err(self.state_error(Stage::Build)),
    };
    self.finish(Stage::Build, marked)?;
    self.state = PipelineState::Built;
    Ok(())
  }

  /// Install the build outputs into the package directory.
  pub fn package(&mut self) -> Result<PackageReport, PipelineError> {
    self.enter(Stage::Package)?;
    let result = self.install_package();
    self.finish(Stage::Package, result.map_err(PipelineError::from))
  }

  /// Drive all four stages.
  pub fn run(&mut self) -> Result<PackageReport, PipelineError> {
    self.layout()?;
    self.generate()?;
    self.build()?;
    self.package()
  }

  /// Resolve the requirements without enforcing any existing lock and
  /// write `kiln.lock`. Does not change the pipeline state.
  pub fn write_lock(&self) -> Result<(PathBuf, LockFile), PipelineError> {
    let resolved = self
      .runtime
      .block_on(resolve_requirements(&self.index, &self.recipe.requires, &self.settings, None))?;
    let lock = LockFile::from_resolved(&resolved);
    let path = self.lock_path();
    lock.save(&path).map_err(ResolutionError::from)?;
    info!(path = ?path, "lock file written");
    Ok((path, lock))
  }

  fn enter(&self, stage: Stage) -> Result<(), StateError> {
    if self.state != stage.requires() {
      return Err(StateError {
        stage,
        state: self.state,
      });
    }
    info!(stage = %stage, "starting stage");
    Ok(())
  }

  /// Record the outcome of `stage`.
  fn finish<T>(&mut self, stage: Stage, result: Result<T, PipelineError>) -> Result<T, PipelineError> {
    match result {
      Ok(value) => {
        self.state = stage.completes();
        Ok(value)
      }
      Err(e) => {
        error!(stage = %stage, error = %e, "stage failed");
        self.state = PipelineState::Failed(stage);
        Err(e)
      }
    }
  }

  fn state_error(&self, stage: Stage) -> PipelineError {
    PipelineError::State(StateError {
      stage,
      state: self.state,
    })
  }

  fn prepare_layout(&self) -> Result<Layout, LayoutError> {
    check_exports(&self.recipe)?;
    let layout = Layout::new(&self.recipe, self.settings.build_type, &self.options.layout);
    layout.prepare()?;
    Ok(layout)
  }

  fn resolve_and_generate(&self, layout: &Layout) -> Result<(Vec<ResolvedDependency>, String, GeneratedFiles), ResolutionError> {
    let lock = if self.options.locked {
      let path = self.lock_path();
      Some(LockFile::load(&path)?.ok_or(ResolutionError::MissingLock(path))?)
    } else {
      None
    };

    let resolved = self.runtime.block_on(resolve_requirements(
      &self.index,
      &self.recipe.requires,
      &self.settings,
      lock.as_ref(),
    ))?;
    let package_id = compute_package_id(&self.recipe, &self.settings, &resolved)?.0;

    let target = Platform::new(self.settings.arch, self.settings.os);
    let generated = generate_files(&GenerateInput {
      package: self.recipe.reference().to_string(),
      package_id: package_id.clone(),
      settings: &self.settings,
      deps: &resolved,
      generators_dir: &layout.generators_dir,
      cross: Platform::current() != Some(target),
    })?;

    Ok((resolved, package_id, generated))
  }

  fn backend_context(&self) -> Option<BackendContext<'_>> {
    Some(BackendContext {
      recipe: &self.recipe,
      settings: &self.settings,
      layout: self.layout.as_ref()?,
      jobs: self.options.jobs,
    })
  }

  fn install_package(&self) -> Result<PackageReport, InstallError> {
    let (Some(ctx), Some(package_id)) = (self.backend_context(), &self.package_id) else {
      return Err(InstallError::BuildIncomplete {
        build_dir: self.recipe.dir.clone(),
        reason: "the pipeline has no layout".to_string(),
      });
    };
    let layout = ctx.layout;

    package::check_preconditions(&self.recipe, layout)?;

    let staging = package::begin_staging(layout)?;
    info!(backend = self.backend.name(), staging = ?staging.path(), "installing into staging");
    self.runtime.block_on(self.backend.install(&ctx, staging.path()))?;
    package::verify_staged(&self.recipe, staging.path())?;

    let entry = package::package_entry(&self.recipe, &self.settings, package_id, staging.path());
    package::write_package_entry(&entry, staging.path())?;
    package::commit(staging, &layout.package_dir)?;

    Ok(PackageReport {
      package_dir: layout.package_dir.clone(),
      package_id: package_id.clone(),
      entry,
    })
  }
}
