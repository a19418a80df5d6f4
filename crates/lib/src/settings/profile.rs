//! Settings profiles: TOML files with a `[settings]` table.
//!
//! ```toml
//! [settings]
//! os = "linux"
//! arch = "x86_64"
//! compiler = "gcc"
//! "compiler.version" = "13"
//! build_type = "Release"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::platform::paths::profiles_dir;
use crate::settings::SettingsError;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Profile {
  #[serde(default)]
  pub settings: BTreeMap<String, String>,
}

impl Profile {
  pub fn load(path: &Path) -> Result<Self, SettingsError> {
    let content = match fs::read_to_string(path) {
      Ok(content) => content,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        return Err(SettingsError::ProfileNotFound(path.to_path_buf()));
      }
      Err(source) => {
        return Err(SettingsError::ProfileRead {
          path: path.to_path_buf(),
          source,
        });
      }
    };

    toml::from_str(&content).map_err(|source| SettingsError::ProfileParse {
      path: path.to_path_buf(),
      source,
    })
  }
}

/// Map a `--profile` argument to a file.
///
/// Anything that looks like a path is used as-is; a bare name refers to
/// `<config_dir>/profiles/<name>.toml`.
pub fn resolve_profile_path(arg: &str) -> PathBuf {
  let as_path = Path::new(arg);
  if as_path.components().count() > 1 || as_path.extension().is_some() {
    as_path.to_path_buf()
  } else {
    profiles_dir().join(format!("{arg}.toml"))
  }
}
