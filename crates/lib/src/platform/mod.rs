//! Host platform detection and application directories.

pub mod arch;
pub mod os;
pub mod paths;

use std::fmt;

pub use arch::Arch;
pub use os::Os;

/// A setting value that does not name a supported OS or architecture.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported {kind} '{value}'")]
pub struct UnknownPlatformValue {
  pub kind: &'static str,
  pub value: String,
}

/// Platform identifier combining architecture and OS (e.g., "x86_64-linux")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
  pub arch: Arch,
  pub os: Os,
}

impl Platform {
  pub fn new(arch: Arch, os: Os) -> Self {
    Self { arch, os }
  }

  /// Detect the host platform
  ///
  /// Returns `None` if the OS or architecture is not supported
  pub fn current() -> Option<Self> {
    Some(Self {
      arch: Arch::current()?,
      os: Os::current()?,
    })
  }

  pub fn triple(&self) -> String {
    format!("{}-{}", self.arch, self.os)
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.triple())
  }
}

/// Returns the platform triple for the host (e.g., "aarch64-macos")
pub fn platform_triple() -> Option<String> {
  Platform::current().map(|p| p.triple())
}
