//! Crate-wide constants.

/// Application name, used for directory names under the XDG base dirs.
pub const APP_NAME: &str = "kiln";

/// Default recipe file name looked up in a project directory.
pub const RECIPE_FILENAME: &str = "kiln.lua";

/// Package metadata file written into index entries and package directories.
pub const PACKAGE_METADATA_FILENAME: &str = "kiln-package.json";

/// Subdirectory of the build directory that receives generated files.
pub const GENERATORS_DIRNAME: &str = "generators";

/// Length of the truncated hex digest used for package ids.
pub const OBJ_HASH_PREFIX_LEN: usize = 20;

/// `SOURCE_DATE_EPOCH` handed to build tools (1980-01-01, the ZIP epoch).
pub const SOURCE_DATE_EPOCH: &str = "315532800";
