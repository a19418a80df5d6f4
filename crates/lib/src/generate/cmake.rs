//! CMake toolchain and package-config rendering.
//!
//! Every renderer is a pure function of its inputs; paths are written with
//! forward slashes so the output is the same on every host.

use std::fmt::Write as _;
use std::path::Path;

use crate::index::ResolvedDependency;
use crate::settings::BuildSettings;

pub const TOOLCHAIN_FILENAME: &str = "kiln_toolchain.cmake";

pub(crate) const HEADER: &str = "# Generated by kiln. Do not edit.\n";

pub fn config_filename(name: &str) -> String {
  format!("{name}-config.cmake")
}

pub fn config_version_filename(name: &str) -> String {
  format!("{name}-config-version.cmake")
}

/// Whether `file_name` has the shape of a generated config or
/// config-version file.
pub fn is_config_filename(file_name: &str) -> bool {
  file_name.ends_with("-config.cmake") || file_name.ends_with("-config-version.cmake")
}

/// CMake path literal: forward slashes, quoted.
pub fn cmake_path(path: &Path) -> String {
  format!("\"{}\"", path.to_string_lossy().replace('\\', "/"))
}

fn cmake_list(paths: &[std::path::PathBuf]) -> String {
  paths.iter().map(|p| cmake_path(p)).collect::<Vec<_>>().join(" ")
}

/// Render the toolchain file.
///
/// `cross` marks a target that differs from the host; only then is
/// `CMAKE_SYSTEM_NAME` set, since setting it switches CMake into
/// cross-compiling mode.
pub fn render_toolchain(settings: &BuildSettings, generators_dir: &Path, deps: &[ResolvedDependency], cross: bool) -> String {
  let mut out = String::from(HEADER);

  let _ = writeln!(out, "set(KILN_OS {})", settings.os);
  let _ = writeln!(out, "set(KILN_ARCH {})", settings.arch);
  let _ = writeln!(out, "set(KILN_COMPILER {})", settings.compiler.kind.as_str());
  if let Some(version) = &settings.compiler.version {
    let _ = writeln!(out, "set(KILN_COMPILER_VERSION {version})");
  }
  out.push('\n');

  if cross {
    let _ = writeln!(out, "set(CMAKE_SYSTEM_NAME {})", settings.os.cmake_system_name());
    let _ = writeln!(out, "set(CMAKE_SYSTEM_PROCESSOR {})", settings.arch.cmake_processor());
  }
  if let Some((cc, cxx)) = settings.compiler.kind.drivers() {
    let _ = writeln!(out, "set(CMAKE_C_COMPILER {cc})");
    let _ = writeln!(out, "set(CMAKE_CXX_COMPILER {cxx})");
  }
  let _ = writeln!(
    out,
    "set(CMAKE_BUILD_TYPE {} CACHE STRING \"Build type\")",
    settings.build_type
  );
  out.push('\n');

  let _ = writeln!(out, "list(PREPEND CMAKE_PREFIX_PATH {})", cmake_path(generators_dir));
  let _ = writeln!(out, "list(PREPEND CMAKE_MODULE_PATH {})", cmake_path(generators_dir));
  let _ = writeln!(out, "set(CMAKE_FIND_PACKAGE_PREFER_CONFIG ON)");
  for dep in deps {
    let _ = writeln!(out, "set({}_DIR {})", dep.reference.name, cmake_path(generators_dir));
  }

  out
}

/// Render `<name>-config.cmake`, defining `<name>::<name>` as an imported
/// interface target.
pub fn render_config(dep: &ResolvedDependency) -> String {
  let name = &dep.reference.name;
  let target = format!("{name}::{name}");
  let mut out = String::from(HEADER);

  let _ = writeln!(out, "if(TARGET {target})\n  return()\nendif()\n");
  let _ = writeln!(out, "set({name}_FOUND TRUE)");
  let _ = writeln!(out, "set({name}_VERSION {})", dep.reference.version);
  let _ = writeln!(out, "set({name}_PACKAGE_ID {})", dep.package_id);
  let _ = writeln!(out, "set({name}_ROOT {})", cmake_path(&dep.root));
  let _ = writeln!(out, "set({name}_INCLUDE_DIRS {})", cmake_list(&dep.include_dirs));
  let _ = writeln!(out, "set({name}_LIB_DIRS {})", cmake_list(&dep.lib_dirs));
  let _ = writeln!(out, "set({name}_BIN_DIRS {})", cmake_list(&dep.bin_dirs));
  let _ = writeln!(out, "set({name}_LIBRARIES {})", dep.libs.join(" "));
  out.push('\n');

  let _ = writeln!(out, "add_library({target} INTERFACE IMPORTED)");
  let _ = writeln!(out, "set_target_properties({target} PROPERTIES");
  let _ = writeln!(out, "  INTERFACE_INCLUDE_DIRECTORIES \"${{{name}_INCLUDE_DIRS}}\"");
  let _ = writeln!(out, "  INTERFACE_LINK_DIRECTORIES \"${{{name}_LIB_DIRS}}\"");
  let _ = writeln!(out, "  INTERFACE_LINK_LIBRARIES \"${{{name}_LIBRARIES}}\"");
  let _ = writeln!(out, ")");

  out
}

/// Render `<name>-config-version.cmake`. Any requested version up to the
/// pinned one is accepted.
pub fn render_config_version(dep: &ResolvedDependency) -> String {
  let mut out = String::from(HEADER);
  let _ = writeln!(out, "set(PACKAGE_VERSION \"{}\")\n", dep.reference.version);
  out.push_str(
    "if(PACKAGE_FIND_VERSION AND PACKAGE_VERSION VERSION_LESS PACKAGE_FIND_VERSION)\n  \
     set(PACKAGE_VERSION_COMPATIBLE FALSE)\nelse()\n  \
     set(PACKAGE_VERSION_COMPATIBLE TRUE)\n  \
     if(PACKAGE_FIND_VERSION STREQUAL PACKAGE_VERSION)\n    \
     set(PACKAGE_VERSION_EXACT TRUE)\n  \
     endif()\nendif()\n",
  );
  out
}
