//! Application directories.
//!
//! Everything kiln persists between invocations lives under two roots:
//! the config dir (profiles) and the home dir (package cache and local
//! index). `KILN_HOME` relocates the latter, which tests rely on.

use std::path::PathBuf;

use crate::consts::APP_NAME;

/// Returns the user's home directory
pub fn home_dir() -> PathBuf {
  dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Returns the directory for configuration files (profiles)
#[cfg(windows)]
pub fn config_dir() -> PathBuf {
  std::env::var("APPDATA")
    .map(PathBuf::from)
    .unwrap_or_else(|_| home_dir().join("AppData").join("Roaming"))
    .join(APP_NAME)
}

/// Returns the directory for configuration files (profiles)
#[cfg(not(windows))]
pub fn config_dir() -> PathBuf {
  let config_home = std::env::var("XDG_CONFIG_HOME")
    .map(PathBuf::from)
    .unwrap_or_else(|_| home_dir().join(".config"));
  config_home.join(APP_NAME)
}

/// Returns the default cache directory
#[cfg(windows)]
pub fn cache_dir() -> PathBuf {
  std::env::var("LOCALAPPDATA")
    .map(PathBuf::from)
    .unwrap_or_else(|_| home_dir().join("AppData").join("Local"))
    .join(APP_NAME)
    .join("Cache")
}

/// Returns the default cache directory
#[cfg(not(windows))]
pub fn cache_dir() -> PathBuf {
  let cache_home = std::env::var("XDG_CACHE_HOME")
    .map(PathBuf::from)
    .unwrap_or_else(|_| home_dir().join(".cache"));
  cache_home.join(APP_NAME)
}

/// Root of kiln's persistent package data.
///
/// `KILN_HOME` takes precedence over the platform cache directory.
pub fn kiln_home() -> PathBuf {
  match std::env::var("KILN_HOME") {
    Ok(path) if !path.is_empty() => PathBuf::from(path),
    _ => cache_dir(),
  }
}

/// Local package index (also the download cache of the remote index).
pub fn index_dir() -> PathBuf {
  kiln_home().join("p")
}

pub fn profiles_dir() -> PathBuf {
  config_dir().join("profiles")
}
