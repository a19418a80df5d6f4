//! Lua evaluation of recipe files.
//!
//! The recipe runs in a fresh Lua state with a read-only `kiln` global:
//!
//! - `kiln.dir`: absolute directory of the recipe
//! - `kiln.os`, `kiln.arch`: host platform (recipes may branch on them)
//! - `kiln.version`: version of kiln evaluating the recipe

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use mlua::FromLua;
use mlua::prelude::*;
use tracing::{debug, info};

use crate::platform::Platform;
use crate::recipe::{ArtifactKind, BackendSpec, DependencyRef, PackageType, Recipe, RecipeError};
use crate::settings::SettingKey;

/// Evaluate the recipe at `path` and validate the result.
pub fn load_recipe(path: &Path) -> Result<Recipe, RecipeError> {
  let path = dunce::canonicalize(path).map_err(|source| {
    if source.kind() == std::io::ErrorKind::NotFound {
      RecipeError::NotFound(path.to_path_buf())
    } else {
      RecipeError::Read {
        path: path.to_path_buf(),
        source,
      }
    }
  })?;
  let dir = path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));

  let content = std::fs::read_to_string(&path).map_err(|source| RecipeError::Read {
    path: path.clone(),
    source,
  })?;

  info!(recipe = %path.display(), "loading recipe");

  let lua_err = |e: LuaError| RecipeError::Lua {
    path: path.clone(),
    message: e.to_string(),
  };

  let lua = Lua::new();
  register_globals(&lua, &dir).map_err(lua_err)?;

  let value = lua
    .load(&content)
    .set_name(format!("@{}", path.display()))
    .eval::<LuaValue>()
    .map_err(lua_err)?;

  let table = match value {
    LuaValue::Table(table) => table,
    other => {
      return Err(RecipeError::Lua {
        path: path.clone(),
        message: format!("recipe must return a table, got {}", other.type_name()),
      });
    }
  };

  let recipe = recipe_from_table(&lua, &table, dir).map_err(|e| match e {
    FieldError::Recipe(e) => e,
    FieldError::Lua(e) => lua_err(e),
  })?;
  recipe.validate()?;

  debug!(
    name = %recipe.name,
    version = %recipe.version,
    requires = recipe.requires.len(),
    "recipe loaded"
  );
  Ok(recipe)
}

fn register_globals(lua: &Lua, dir: &Path) -> LuaResult<()> {
  let kiln = lua.create_table()?;
  kiln.set("dir", dir.to_string_lossy().to_string())?;
  kiln.set("version", env!("CARGO_PKG_VERSION"))?;
  if let Some(platform) = Platform::current() {
    kiln.set("os", platform.os.as_str())?;
    kiln.set("arch", platform.arch.as_str())?;
  }

  let meta = lua.create_table()?;
  meta.set("__index", kiln)?;
  meta.set(
    "__newindex",
    lua.create_function(|_, (_, key, _): (LuaValue, String, LuaValue)| {
      Err::<(), _>(LuaError::RuntimeError(format!("kiln.{key} is read-only")))
    })?,
  )?;
  meta.set("__metatable", false)?;

  let setmetatable: LuaFunction = lua.globals().get("setmetatable")?;
  let proxy: LuaTable = setmetatable.call((lua.create_table()?, meta))?;
  lua.globals().set("kiln", proxy)
}

enum FieldError {
  Recipe(RecipeError),
  Lua(LuaError),
}

impl From<RecipeError> for FieldError {
  fn from(e: RecipeError) -> Self {
    Self::Recipe(e)
  }
}

impl From<LuaError> for FieldError {
  fn from(e: LuaError) -> Self {
    Self::Lua(e)
  }
}

fn recipe_from_table(lua: &Lua, table: &LuaTable, dir: PathBuf) -> Result<Recipe, FieldError> {
  let name = required_string(lua, table, "name")?;

  let version_str = required_string(lua, table, "version")?;
  let version = semver::Version::parse(&version_str)
    .map_err(|e| RecipeError::invalid("version", format!("'{version_str}' is not a semantic version: {e}")))?;

  let license = optional_string(lua, table, "license")?;

  let package_type = match optional_string(lua, table, "package_type")? {
    Some(s) => s.parse()?,
    None => PackageType::default(),
  };

  let settings = string_list(lua, table, "settings")?
    .into_iter()
    .map(|s| {
      s.parse::<SettingKey>()
        .map_err(|bad| RecipeError::invalid("settings", format!("unknown setting '{bad}'")))
    })
    .collect::<Result<Vec<_>, _>>()?;

  let requires = string_list(lua, table, "requires")?
    .iter()
    .map(|s| s.parse::<DependencyRef>())
    .collect::<Result<Vec<_>, _>>()?;

  let exports_sources = string_list(lua, table, "exports_sources")?;
  let backend = backend_from_value(lua, table.get::<LuaValue>("backend")?)?;
  let artifacts = artifacts_from_value(lua, table.get::<LuaValue>("artifacts")?)?;

  Ok(Recipe {
    name,
    version,
    license,
    package_type,
    settings,
    requires,
    exports_sources,
    backend,
    artifacts,
    dir,
  })
}

fn required_string(lua: &Lua, table: &LuaTable, field: &'static str) -> Result<String, FieldError> {
  optional_string(lua, table, field)?.ok_or_else(|| RecipeError::invalid(field, "is required").into())
}

fn optional_string(lua: &Lua, table: &LuaTable, field: &'static str) -> Result<Option<String>, FieldError> {
  match table.get::<LuaValue>(field)? {
    LuaValue::Nil => Ok(None),
    value @ LuaValue::String(_) => Ok(Some(String::from_lua(value, lua)?)),
    other => Err(RecipeError::invalid(field, format!("expected a string, got {}", other.type_name())).into()),
  }
}

/// A field that may be a single string or a sequence of strings.
fn string_list(lua: &Lua, table: &LuaTable, field: &'static str) -> Result<Vec<String>, FieldError> {
  value_to_string_list(lua, table.get::<LuaValue>(field)?, field)
}

fn value_to_string_list(lua: &Lua, value: LuaValue, field: &'static str) -> Result<Vec<String>, FieldError> {
  match value {
    LuaValue::Nil => Ok(Vec::new()),
    value @ LuaValue::String(_) => Ok(vec![String::from_lua(value, lua)?]),
    LuaValue::Table(list) => {
      let mut items = Vec::new();
      for item in list.sequence_values::<LuaValue>() {
        match item? {
          value @ LuaValue::String(_) => items.push(String::from_lua(value, lua)?),
          other => {
            return Err(RecipeError::invalid(field, format!("list items must be strings, got {}", other.type_name())).into());
          }
        }
      }
      Ok(items)
    }
    other => Err(RecipeError::invalid(field, format!("expected a string or list, got {}", other.type_name())).into()),
  }
}

fn backend_from_value(lua: &Lua, value: LuaValue) -> Result<BackendSpec, FieldError> {
  let table = match value {
    LuaValue::Nil => return Ok(BackendSpec::default()),
    value @ LuaValue::String(_) => {
      let kind = String::from_lua(value, lua)?;
      return match kind.as_str() {
        "cmake" => Ok(BackendSpec::default()),
        "custom" => Err(RecipeError::invalid("backend", "custom backend must be a table with a build command").into()),
        other => Err(RecipeError::invalid("backend", format!("unknown backend '{other}'")).into()),
      };
    }
    LuaValue::Table(table) => table,
    other => {
      return Err(RecipeError::invalid("backend", format!("expected a string or table, got {}", other.type_name())).into());
    }
  };

  let kind = optional_string(lua, &table, "kind")?.unwrap_or_else(|| "cmake".to_string());
  match kind.as_str() {
    "cmake" => {
      let mut definitions = BTreeMap::new();
      if let LuaValue::Table(defs) = table.get::<LuaValue>("definitions")? {
        for pair in defs.pairs::<String, LuaValue>() {
          let (key, value) = pair?;
          let value = match value {
            LuaValue::Boolean(b) => (if b { "ON" } else { "OFF" }).to_string(),
            other => String::from_lua(other, lua)?,
          };
          definitions.insert(key, value);
        }
      }
      Ok(BackendSpec::Cmake {
        generator: optional_string(lua, &table, "generator")?,
        definitions,
      })
    }
    "custom" => Ok(BackendSpec::Custom {
      configure: optional_string(lua, &table, "configure")?,
      build: required_string(lua, &table, "build")?,
      install: optional_string(lua, &table, "install")?,
    }),
    other => Err(RecipeError::invalid("backend", format!("unknown backend '{other}'")).into()),
  }
}

fn artifacts_from_value(lua: &Lua, value: LuaValue) -> Result<BTreeMap<ArtifactKind, Vec<String>>, FieldError> {
  let table = match value {
    LuaValue::Nil => return Ok(BTreeMap::new()),
    LuaValue::Table(table) => table,
    other => {
      return Err(RecipeError::invalid("artifacts", format!("expected a table, got {}", other.type_name())).into());
    }
  };

  let mut artifacts = BTreeMap::new();
  for pair in table.pairs::<String, LuaValue>() {
    let (kind, paths) = pair?;
    let kind: ArtifactKind = kind.parse()?;
    artifacts.insert(kind, value_to_string_list(lua, paths, "artifacts")?);
  }
  Ok(artifacts)
}
