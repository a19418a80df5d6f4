//! Recipes: the package descriptor and its pinned requirements.
//!
//! A recipe is a Lua file (`kiln.lua`) returning a table:
//!
//! ```lua
//! return {
//!   name = "opendxa",
//!   version = "1.0.0",
//!   license = "MIT",
//!   package_type = "application",
//!   settings = { "os", "arch", "compiler", "build_type" },
//!   requires = { "spdlog/1.14.1", "fmt/10.2.1" },
//!   exports_sources = { "CMakeLists.txt", "include/*", "src/*" },
//! }
//! ```
//!
//! Loading produces an immutable [`Recipe`] that every pipeline stage
//! receives explicitly.
//!
//! # Submodules
//!
//! - [`lua`] - Lua evaluation of recipe files

pub mod lua;
mod types;

pub use lua::load_recipe;
pub use types::*;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecipeError {
  #[error("recipe not found: {0}")]
  NotFound(PathBuf),

  #[error("failed to read recipe {path}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to evaluate recipe {path}: {message}")]
  Lua { path: PathBuf, message: String },

  #[error("invalid recipe field '{field}': {message}")]
  Invalid { field: &'static str, message: String },

  #[error("invalid requirement '{0}', expected name/version")]
  InvalidRequirement(String),

  #[error("requirement '{0}' is declared more than once")]
  DuplicateRequirement(String),
}

impl RecipeError {
  pub(crate) fn invalid(field: &'static str, message: impl Into<String>) -> Self {
    Self::Invalid {
      field,
      message: message.into(),
    }
  }
}
