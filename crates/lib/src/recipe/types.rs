use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::recipe::RecipeError;
use crate::settings::SettingKey;

/// A pinned `(name, version)` requirement. Identity is the name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DependencyRef {
  pub name: String,
  pub version: String,
}

impl DependencyRef {
  pub fn new(name: &str, version: &str) -> Self {
    Self {
      name: name.to_string(),
      version: version.to_string(),
    }
  }
}

impl FromStr for DependencyRef {
  type Err = RecipeError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (name, version) = s
      .split_once('/')
      .ok_or_else(|| RecipeError::InvalidRequirement(s.to_string()))?;
    if !is_valid_name(name)
      || version.is_empty()
      || is_only_dots(version)
      || version.contains(['/', '\\'])
      || version.contains(char::is_whitespace)
    {
      return Err(RecipeError::InvalidRequirement(s.to_string()));
    }
    Ok(Self::new(name, version))
  }
}

impl fmt::Display for DependencyRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.name, self.version)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageType {
  Application,
  #[default]
  Library,
  HeaderLibrary,
}

impl PackageType {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Application => "application",
      Self::Library => "library",
      Self::HeaderLibrary => "header-library",
    }
  }
}

impl FromStr for PackageType {
  type Err = RecipeError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "application" => Ok(Self::Application),
      "library" => Ok(Self::Library),
      "header-library" => Ok(Self::HeaderLibrary),
      other => Err(RecipeError::invalid(
        "package_type",
        format!("'{other}' is not one of application, library, header-library"),
      )),
    }
  }
}

/// Where a declared artifact lands inside the package directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
  Bin,
  Lib,
  Include,
  Share,
}

impl ArtifactKind {
  pub fn dir_name(&self) -> &'static str {
    match self {
      Self::Bin => "bin",
      Self::Lib => "lib",
      Self::Include => "include",
      Self::Share => "share",
    }
  }
}

impl FromStr for ArtifactKind {
  type Err = RecipeError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "bin" => Ok(Self::Bin),
      "lib" => Ok(Self::Lib),
      "include" => Ok(Self::Include),
      "share" => Ok(Self::Share),
      other => Err(RecipeError::invalid(
        "artifacts",
        format!("'{other}' is not one of bin, lib, include, share"),
      )),
    }
  }
}

/// Which downstream build tool drives configure, compile and install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendSpec {
  Cmake {
    #[serde(skip_serializing_if = "Option::is_none")]
    generator: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    definitions: BTreeMap<String, String>,
  },
  Custom {
    #[serde(skip_serializing_if = "Option::is_none")]
    configure: Option<String>,
    build: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    install: Option<String>,
  },
}

impl Default for BackendSpec {
  fn default() -> Self {
    Self::Cmake {
      generator: None,
      definitions: BTreeMap::new(),
    }
  }
}

/// The package descriptor: identity, requirements and export rules.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recipe {
  pub name: String,
  pub version: semver::Version,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub license: Option<String>,
  pub package_type: PackageType,
  pub settings: Vec<SettingKey>,
  pub requires: Vec<DependencyRef>,
  pub exports_sources: Vec<String>,
  pub backend: BackendSpec,
  #[serde(skip_serializing_if = "BTreeMap::is_empty")]
  pub artifacts: BTreeMap<ArtifactKind, Vec<String>>,
  /// Directory the recipe was loaded from; export globs are relative to it.
  pub dir: PathBuf,
}

impl Recipe {
  pub fn reference(&self) -> DependencyRef {
    DependencyRef::new(&self.name, &self.version.to_string())
  }

  /// Check the invariants that do not depend on the filesystem.
  pub fn validate(&self) -> Result<(), RecipeError> {
    if !is_valid_name(&self.name) {
      return Err(RecipeError::invalid(
        "name",
        format!("'{}' must be non-empty and use only letters, digits, '_', '.', '+', '-'", self.name),
      ));
    }

    if let Some(license) = &self.license
      && !is_valid_license(license)
    {
      return Err(RecipeError::invalid("license", format!("'{license}' is not an SPDX expression")));
    }

    let mut seen = HashSet::new();
    for dep in &self.requires {
      if !seen.insert(dep.name.as_str()) {
        return Err(RecipeError::DuplicateRequirement(dep.name.clone()));
      }
      if dep.name == self.name {
        return Err(RecipeError::invalid("requires", format!("'{}' requires itself", self.name)));
      }
    }

    for pattern in &self.exports_sources {
      if pattern.is_empty() || std::path::Path::new(pattern).is_absolute() || pattern.split(['/', '\\']).any(|c| c == "..") {
        return Err(RecipeError::invalid(
          "exports_sources",
          format!("'{pattern}' must be a relative path inside the recipe directory"),
        ));
      }
      glob::Pattern::new(pattern).map_err(|e| RecipeError::invalid("exports_sources", format!("'{pattern}': {e}")))?;
    }

    if let BackendSpec::Custom { build, .. } = &self.backend
      && build.trim().is_empty()
    {
      return Err(RecipeError::invalid("backend", "custom backend needs a build command"));
    }

    Ok(())
  }
}

pub(crate) fn is_valid_name(name: &str) -> bool {
  !name.is_empty()
    && !is_only_dots(name)
    && name
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '+' | '-'))
}

/// `.` and `..` would name the index directory or its parent.
fn is_only_dots(s: &str) -> bool {
  s.chars().all(|c| c == '.')
}

/// Loose SPDX expression check: identifiers joined by AND/OR/WITH and
/// parentheses.
fn is_valid_license(license: &str) -> bool {
  !license.trim().is_empty()
    && license
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+' | '(' | ')' | ' ' | ':'))
}
