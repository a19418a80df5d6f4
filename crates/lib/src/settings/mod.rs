//! Build settings: the `(os, arch, compiler, build_type)` tuple that decides
//! binary compatibility of resolved dependencies.
//!
//! Settings are assembled once per invocation (host detection, then an
//! optional profile, then `key=value` overrides) and are immutable after
//! that. See [`SettingsBuilder`].

mod profile;
mod types;

pub use profile::{Profile, resolve_profile_path};
pub use types::*;

use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

use crate::platform::arch::Arch;
use crate::platform::os::Os;

#[derive(Debug, Error)]
pub enum SettingsError {
  #[error("host platform {os}/{arch} is not supported; set os and arch explicitly")]
  UnsupportedHost { os: &'static str, arch: &'static str },

  #[error("unknown setting '{0}' (expected one of: os, arch, compiler, compiler.version, build_type)")]
  UnknownKey(String),

  #[error("invalid value '{value}' for setting '{key}'")]
  InvalidValue { key: String, value: String },

  #[error("malformed setting override '{0}', expected key=value")]
  MalformedOverride(String),

  #[error("profile not found: {0}")]
  ProfileNotFound(PathBuf),

  #[error("failed to read profile {path}")]
  ProfileRead {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse profile {path}")]
  ProfileParse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },
}

/// Assembles [`BuildSettings`] from host detection, a profile and overrides.
///
/// Later sources win; the host only fills in what nothing else set.
#[derive(Debug, Default)]
pub struct SettingsBuilder {
  values: BTreeMap<String, String>,
}

impl SettingsBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  /// Apply every setting from a profile.
  pub fn profile(mut self, profile: &Profile) -> Result<Self, SettingsError> {
    for (key, value) in &profile.settings {
      self = self.set(key, value)?;
    }
    Ok(self)
  }

  /// Apply a single `key=value` override as typed on the command line.
  pub fn override_str(self, raw: &str) -> Result<Self, SettingsError> {
    let (key, value) = raw
      .split_once('=')
      .ok_or_else(|| SettingsError::MalformedOverride(raw.to_string()))?;
    let (key, value) = (key.trim(), value.trim());
    if key.is_empty() || value.is_empty() {
      return Err(SettingsError::MalformedOverride(raw.to_string()));
    }
    self.set(key, value)
  }

  pub fn set(mut self, key: &str, value: &str) -> Result<Self, SettingsError> {
    validate(key, value)?;
    self.values.insert(key.to_string(), value.to_string());
    Ok(self)
  }

  /// Fill the remaining settings from the host and freeze the result.
  pub fn build(self) -> Result<BuildSettings, SettingsError> {
    let value = |key: &str| self.values.get(key).map(String::as_str);

    let os = match value("os") {
      Some(os) => parse(SettingKey::Os.as_str(), os)?,
      None => host_os()?,
    };
    let arch = match value("arch") {
      Some(arch) => parse(SettingKey::Arch.as_str(), arch)?,
      None => host_arch()?,
    };
    let kind = match value("compiler") {
      Some(kind) => parse(SettingKey::Compiler.as_str(), kind)?,
      None => CompilerKind::detect(os),
    };
    let build_type = match value("build_type") {
      Some(bt) => parse(SettingKey::BuildType.as_str(), bt)?,
      None => BuildType::default(),
    };

    let settings = BuildSettings {
      os,
      arch,
      compiler: Compiler {
        kind,
        version: value("compiler.version").map(str::to_string),
      },
      build_type,
    };
    debug!(settings = %settings, "build settings assembled");
    Ok(settings)
  }
}

fn validate(key: &str, value: &str) -> Result<(), SettingsError> {
  match key {
    "os" => parse::<Os>(key, value).map(|_| ()),
    "arch" => parse::<Arch>(key, value).map(|_| ()),
    "compiler" => parse::<CompilerKind>(key, value).map(|_| ()),
    "build_type" => parse::<BuildType>(key, value).map(|_| ()),
    "compiler.version" if !value.trim().is_empty() => Ok(()),
    "compiler.version" => Err(SettingsError::InvalidValue {
      key: key.to_string(),
      value: value.to_string(),
    }),
    _ => Err(SettingsError::UnknownKey(key.to_string())),
  }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, SettingsError> {
  value.parse().map_err(|_| SettingsError::InvalidValue {
    key: key.to_string(),
    value: value.to_string(),
  })
}

fn host_os() -> Result<Os, SettingsError> {
  Os::current().ok_or(SettingsError::UnsupportedHost {
    os: std::env::consts::OS,
    arch: std::env::consts::ARCH,
  })
}

fn host_arch() -> Result<Arch, SettingsError> {
  Arch::current().ok_or(SettingsError::UnsupportedHost {
    os: std::env::consts::OS,
    arch: std::env::consts::ARCH,
  })
}
