use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::platform::arch::Arch;
use crate::platform::os::Os;

/// A setting a recipe can declare as part of its binary identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingKey {
  Os,
  Arch,
  Compiler,
  BuildType,
}

impl SettingKey {
  pub const ALL: [SettingKey; 4] = [Self::Os, Self::Arch, Self::Compiler, Self::BuildType];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Os => "os",
      Self::Arch => "arch",
      Self::Compiler => "compiler",
      Self::BuildType => "build_type",
    }
  }
}

impl FromStr for SettingKey {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::ALL
      .into_iter()
      .find(|key| key.as_str() == s)
      .ok_or_else(|| s.to_string())
  }
}

impl fmt::Display for SettingKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CompilerKind {
  Gcc,
  Clang,
  AppleClang,
  Msvc,
}

impl CompilerKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Gcc => "gcc",
      Self::Clang => "clang",
      Self::AppleClang => "apple-clang",
      Self::Msvc => "msvc",
    }
  }

  /// Guess the compiler for `os` from `CC`, falling back to the platform's
  /// usual system compiler.
  pub fn detect(os: Os) -> Self {
    let from_cc = std::env::var("CC").ok().and_then(|cc| {
      let name = std::path::Path::new(&cc)
        .file_stem()
        .map(|s| s.to_string_lossy().to_ascii_lowercase())?;
      if name.contains("clang") {
        Some(if os == Os::MacOs { Self::AppleClang } else { Self::Clang })
      } else if name.contains("gcc") {
        Some(Self::Gcc)
      } else if name == "cl" {
        Some(Self::Msvc)
      } else {
        None
      }
    });

    from_cc.unwrap_or(match os {
      Os::Linux => Self::Gcc,
      Os::MacOs => Self::AppleClang,
      Os::Windows => Self::Msvc,
    })
  }

  /// C and C++ driver names, when the compiler has conventional ones.
  pub fn drivers(&self) -> Option<(&'static str, &'static str)> {
    match self {
      Self::Gcc => Some(("gcc", "g++")),
      Self::Clang => Some(("clang", "clang++")),
      Self::AppleClang | Self::Msvc => None,
    }
  }
}

impl FromStr for CompilerKind {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "gcc" => Ok(Self::Gcc),
      "clang" => Ok(Self::Clang),
      "apple-clang" | "apple_clang" => Ok(Self::AppleClang),
      "msvc" => Ok(Self::Msvc),
      _ => Err(s.to_string()),
    }
  }
}

impl TryFrom<String> for CompilerKind {
  type Error = String;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<CompilerKind> for String {
  fn from(kind: CompilerKind) -> Self {
    kind.as_str().to_string()
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Compiler {
  pub kind: CompilerKind,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub version: Option<String>,
}

impl fmt::Display for Compiler {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.version {
      Some(version) => write!(f, "{}-{}", self.kind.as_str(), version),
      None => f.write_str(self.kind.as_str()),
    }
  }
}

/// CMake-style build configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BuildType {
  Debug,
  #[default]
  Release,
  RelWithDebInfo,
  MinSizeRel,
}

impl BuildType {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Debug => "Debug",
      Self::Release => "Release",
      Self::RelWithDebInfo => "RelWithDebInfo",
      Self::MinSizeRel => "MinSizeRel",
    }
  }
}

impl FromStr for BuildType {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "debug" => Ok(Self::Debug),
      "release" => Ok(Self::Release),
      "relwithdebinfo" => Ok(Self::RelWithDebInfo),
      "minsizerel" => Ok(Self::MinSizeRel),
      _ => Err(s.to_string()),
    }
  }
}

impl TryFrom<String> for BuildType {
  type Error = String;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<BuildType> for String {
  fn from(bt: BuildType) -> Self {
    bt.as_str().to_string()
  }
}

impl fmt::Display for BuildType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// The immutable settings for one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildSettings {
  pub os: Os,
  pub arch: Arch,
  pub compiler: Compiler,
  pub build_type: BuildType,
}

impl BuildSettings {
  /// Look up a setting by its flat key (`compiler.version` included).
  pub fn value(&self, key: &str) -> Option<String> {
    match key {
      "os" => Some(self.os.as_str().to_string()),
      "arch" => Some(self.arch.as_str().to_string()),
      "compiler" => Some(self.compiler.kind.as_str().to_string()),
      "compiler.version" => self.compiler.version.clone(),
      "build_type" => Some(self.build_type.as_str().to_string()),
      _ => None,
    }
  }

  /// Flat map of all settings.
  pub fn to_map(&self) -> BTreeMap<String, String> {
    self.restrict(&SettingKey::ALL)
  }

  /// Flat map restricted to the declared keys; `compiler.version` follows
  /// `compiler`.
  pub fn restrict(&self, keys: &[SettingKey]) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for key in keys {
      if let Some(value) = self.value(key.as_str()) {
        map.insert(key.as_str().to_string(), value);
      }
      if *key == SettingKey::Compiler
        && let Some(version) = &self.compiler.version
      {
        map.insert("compiler.version".to_string(), version.clone());
      }
    }
    map
  }

  /// A binary built with `recorded` settings can be linked into a build
  /// with these settings iff every recorded value matches ours.
  pub fn is_compatible_with(&self, recorded: &BTreeMap<String, String>) -> bool {
    recorded
      .iter()
      .all(|(key, value)| self.value(key).as_deref() == Some(value.as_str()))
  }
}

impl fmt::Display for BuildSettings {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}-{} {} {}", self.arch, self.os, self.compiler, self.build_type)
  }
}
