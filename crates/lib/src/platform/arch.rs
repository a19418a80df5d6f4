use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::platform::UnknownPlatformValue;

/// CPU architectures a build can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Arch {
  X86,
  X86_64,
  Aarch64,
}

impl Arch {
  /// Detect the host CPU architecture
  pub fn current() -> Option<Self> {
    match std::env::consts::ARCH {
      "x86" => Some(Self::X86),
      "x86_64" => Some(Self::X86_64),
      "aarch64" => Some(Self::Aarch64),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::X86 => "x86",
      Self::X86_64 => "x86_64",
      Self::Aarch64 => "aarch64",
    }
  }

  /// Value for `CMAKE_SYSTEM_PROCESSOR` when cross compiling
  pub fn cmake_processor(&self) -> &'static str {
    match self {
      Self::X86 => "i686",
      Self::X86_64 => "x86_64",
      Self::Aarch64 => "aarch64",
    }
  }
}

impl FromStr for Arch {
  type Err = UnknownPlatformValue;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "x86" | "i686" => Ok(Self::X86),
      "x86_64" | "amd64" => Ok(Self::X86_64),
      "aarch64" | "arm64" | "armv8" => Ok(Self::Aarch64),
      _ => Err(UnknownPlatformValue {
        kind: "arch",
        value: s.to_string(),
      }),
    }
  }
}

impl TryFrom<String> for Arch {
  type Error = UnknownPlatformValue;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<Arch> for String {
  fn from(arch: Arch) -> Self {
    arch.as_str().to_string()
  }
}

impl fmt::Display for Arch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}
