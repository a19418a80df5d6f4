use std::fmt;

use serde::Serialize;

/// One of the four pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
  Layout,
  Generate,
  Build,
  Package,
}

impl Stage {
  pub fn as_str(&self) -> &'static str {
    match self {
      Stage::Layout => "layout",
      Stage::Generate => "generate",
      Stage::Build => "build",
      Stage::Package => "package",
    }
  }

  /// State the pipeline must be in before this stage may run.
  pub fn requires(&self) -> PipelineState {
    match self {
      Stage::Layout => PipelineState::Unconfigured,
      Stage::Generate => PipelineState::LayoutReady,
      Stage::Build => PipelineState::DependenciesResolved,
      Stage::Package => PipelineState::Built,
    }
  }

  /// State the pipeline is in once this stage succeeds.
  pub fn completes(&self) -> PipelineState {
    match self {
      Stage::Layout => PipelineState::LayoutReady,
      Stage::Generate => PipelineState::DependenciesResolved,
      Stage::Build => PipelineState::Built,
      Stage::Package => PipelineState::Packaged,
    }
  }
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Strictly linear; `Failed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "stage", rename_all = "snake_case")]
pub enum PipelineState {
  Unconfigured,
  LayoutReady,
  DependenciesResolved,
  /// The backend's configure step succeeded; compile has not.
  Configured,
  Built,
  Packaged,
  Failed(Stage),
}

impl fmt::Display for PipelineState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PipelineState::Unconfigured => f.write_str("unconfigured"),
      PipelineState::LayoutReady => f.write_str("layout ready"),
      PipelineState::DependenciesResolved => f.write_str("dependencies resolved"),
      PipelineState::Configured => f.write_str("configured"),
      PipelineState::Built => f.write_str("built"),
      PipelineState::Packaged => f.write_str("packaged"),
      PipelineState::Failed(stage) => write!(f, "failed during {stage}"),
    }
  }
}
