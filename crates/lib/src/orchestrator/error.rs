use thiserror::Error;

use super::state::{PipelineState, Stage};
use crate::backend::BackendError;
use crate::layout::LayoutError;
use crate::package::{InstallError, MarkerError};
use crate::resolve::ResolutionError;

/// A stage was invoked out of order, or after a failure.
#[derive(Debug, Clone, Error)]
#[error("cannot run {stage} while the pipeline is {state}")]
pub struct StateError {
  pub stage: Stage,
  pub state: PipelineState,
}

#[derive(Debug, Error)]
pub enum PipelineError {
  #[error(transparent)]
  Layout(#[from] LayoutError),

  #[error(transparent)]
  Resolution(#[from] ResolutionError),

  #[error(transparent)]
  Configure(BackendError),

  #[error(transparent)]
  Compile(BackendError),

  #[error("failed to record build completion: {0}")]
  Marker(#[from] MarkerError),

  #[error(transparent)]
  Install(#[from] InstallError),

  #[error(transparent)]
  State(#[from] StateError),
}

impl PipelineError {
  /// Name of the stage that raised the error.
  pub fn stage(&self) -> &'static str {
    match self {
      PipelineError::Layout(_) => "layout",
      PipelineError::Resolution(_) => "generate",
      PipelineError::Configure(_) => "configure",
      PipelineError::Compile(_) | PipelineError::Marker(_) => "build",
      PipelineError::Install(_) => "package",
      PipelineError::State(e) => e.stage.as_str(),
    }
  }

  /// The failing tool's verbatim output, for configure and compile
  /// failures.
  pub fn diagnostics(&self) -> Option<String> {
    match self {
      PipelineError::Configure(e) | PipelineError::Compile(e) => e.diagnostics(),
      PipelineError::Install(InstallError::Backend(e)) => e.diagnostics(),
      _ => None,
    }
  }
}
