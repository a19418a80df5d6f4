//! HTTP package index.
//!
//! Entries are fetched from `<base>/<name>/<version>/kiln-package.json` and
//! binaries from `<base>/<name>/<version>/<package_id>.tar.gz`. Every binary
//! listed remotely must carry a `sha256`; archives are verified before they
//! are unpacked into the local cache. The cache is append-only: a binary
//! directory that already exists is never replaced.

use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::consts::PACKAGE_METADATA_FILENAME;
use crate::index::{BinaryEntry, IndexError, LocalIndex, PackageEntry, PackageIndex, ResolvedDependency, select_binary};
use crate::recipe::DependencyRef;
use crate::settings::BuildSettings;
use crate::util::fs::write_atomic;

#[derive(Debug, Clone)]
pub struct RemoteIndex {
  base_url: String,
  client: reqwest::Client,
  cache: LocalIndex,
}

impl RemoteIndex {
  pub fn new(base_url: &str, cache: LocalIndex) -> Self {
    Self {
      base_url: base_url.trim_end_matches('/').to_string(),
      client: reqwest::Client::new(),
      cache,
    }
  }

  pub fn cache(&self) -> &LocalIndex {
    &self.cache
  }

  fn entry_url(&self, dep: &DependencyRef) -> String {
    format!("{}/{}/{}/{}", self.base_url, dep.name, dep.version, PACKAGE_METADATA_FILENAME)
  }

  fn archive_url(&self, dep: &DependencyRef, package_id: &str) -> String {
    format!("{}/{}/{}/{}.tar.gz", self.base_url, dep.name, dep.version, package_id)
  }

  async fn get(&self, url: &str) -> Result<Option<Vec<u8>>, IndexError> {
    let fetch_err = |message: String| IndexError::Fetch {
      url: url.to_string(),
      message,
    };

    let response = self.client.get(url).send().await.map_err(|e| fetch_err(e.to_string()))?;
    if response.status() == reqwest::StatusCode::NOT_FOUND {
      return Ok(None);
    }
    if !response.status().is_success() {
      return Err(fetch_err(format!("HTTP {}", response.status())));
    }
    let body = response.bytes().await.map_err(|e| fetch_err(e.to_string()))?;
    Ok(Some(body.to_vec()))
  }

  async fn fetch_entry(&self, dep: &DependencyRef) -> Result<PackageEntry, IndexError> {
    let url = self.entry_url(dep);
    info!(url = %url, "fetching index entry");

    let Some(body) = self.get(&url).await? else {
      return Err(IndexError::VersionNotFound {
        name: dep.name.clone(),
        version: dep.version.clone(),
        available: self.cache.available_versions(&dep.name),
      });
    };

    let entry: PackageEntry = serde_json::from_slice(&body).map_err(|e| IndexError::Fetch {
      url: url.clone(),
      message: format!("invalid entry: {e}"),
    })?;
    if entry.name != dep.name || entry.version != dep.version {
      return Err(IndexError::Fetch {
        url,
        message: format!("entry describes {}/{}", entry.name, entry.version),
      });
    }
    Ok(entry)
  }

  /// Download, verify and unpack one binary into the cache.
  async fn fetch_binary(&self, dep: &DependencyRef, binary: &BinaryEntry) -> Result<(), IndexError> {
    binary.check_paths().map_err(|message| IndexError::Fetch {
      url: self.entry_url(dep),
      message,
    })?;
    let url = self.archive_url(dep, &binary.package_id);
    let expected = binary.sha256.as_deref().ok_or_else(|| IndexError::Fetch {
      url: url.clone(),
      message: format!("binary {} has no sha256", binary.package_id),
    })?;

    info!(url = %url, "downloading binary");
    let body = self.get(&url).await?.ok_or_else(|| IndexError::Fetch {
      url: url.clone(),
      message: "HTTP 404 Not Found".to_string(),
    })?;

    let actual = hex::encode(Sha256::digest(&body));
    if actual != expected {
      return Err(IndexError::HashMismatch {
        url,
        expected: expected.to_string(),
        actual,
      });
    }

    let version_dir = self.cache.version_dir(&dep.name, &dep.version);
    let target = version_dir.join(&binary.package_id);
    let package_id = binary.package_id.clone();

    tokio::task::spawn_blocking(move || unpack_into_cache(&body, &version_dir, &target))
      .await
      .map_err(|e| IndexError::Fetch {
        url: url.clone(),
        message: format!("unpack task failed: {e}"),
      })??;

    debug!(package_id = %package_id, "binary unpacked into cache");
    Ok(())
  }

  /// Merge `binary` into the cached entry for `dep`, keeping existing ones.
  async fn record_in_cache(&self, dep: &DependencyRef, binary: &BinaryEntry) -> Result<(), IndexError> {
    let mut entry = self.cache.read_entry(dep).await?.unwrap_or_else(|| PackageEntry {
      name: dep.name.clone(),
      version: dep.version.clone(),
      binaries: Vec::new(),
    });

    if entry.binaries.iter().any(|b| b.package_id == binary.package_id) {
      return Ok(());
    }

    let mut cached = binary.clone();
    cached.path = None;
    entry.binaries.push(cached);

    let path = self
      .cache
      .version_dir(&dep.name, &dep.version)
      .join(PACKAGE_METADATA_FILENAME);
    let json = serde_json::to_vec_pretty(&entry).map_err(|e| IndexError::Corrupt {
      path: path.clone(),
      message: e.to_string(),
    })?;
    write_atomic(&path, &json).map_err(|source| IndexError::Cache { path, source })
  }
}

fn unpack_into_cache(archive: &[u8], version_dir: &Path, target: &Path) -> Result<(), IndexError> {
  let cache_err = |path: &Path| {
    let path = path.to_path_buf();
    move |source: std::io::Error| IndexError::Cache { path, source }
  };

  std::fs::create_dir_all(version_dir).map_err(cache_err(version_dir))?;
  if target.exists() {
    return Ok(());
  }

  let staging = tempfile::Builder::new()
    .prefix(".unpack-")
    .tempdir_in(version_dir)
    .map_err(cache_err(version_dir))?;

  let decoder = flate2::read::GzDecoder::new(archive);
  tar::Archive::new(decoder)
    .unpack(staging.path())
    .map_err(cache_err(staging.path()))?;

  let staged = staging.keep();
  if let Err(source) = std::fs::rename(&staged, target) {
    let _ = std::fs::remove_dir_all(&staged);
    if !target.exists() {
      return Err(IndexError::Cache {
        path: target.to_path_buf(),
        source,
      });
    }
  }
  Ok(())
}

impl PackageIndex for RemoteIndex {
  async fn lookup(&self, dep: &DependencyRef, settings: &BuildSettings) -> Result<ResolvedDependency, IndexError> {
    if let Some(entry) = self.cache.read_entry(dep).await?
      && let Some(resolved) = self.cache.resolve_entry(dep, &entry, settings)?
    {
      debug!(dep = %dep, "resolved from cache");
      return Ok(resolved);
    }

    let entry = self.fetch_entry(dep).await?;
    let binary = select_binary(&entry, settings).ok_or_else(|| IndexError::Incompatible {
      reference: dep.clone(),
      settings: settings.to_string(),
      candidates: entry.binaries.len(),
    })?;

    self.fetch_binary(dep, binary).await?;
    self.record_in_cache(dep, binary).await?;

    let cached = self.cache.read_entry(dep).await?.ok_or_else(|| self.cache.not_found(dep))?;
    self
      .cache
      .resolve_entry(dep, &cached, settings)?
      .ok_or_else(|| IndexError::Incompatible {
        reference: dep.clone(),
        settings: settings.to_string(),
        candidates: cached.binaries.len(),
      })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::settings::SettingsBuilder;
  use flate2::Compression;
  use flate2::write::GzEncoder;
  use tempfile::TempDir;

  fn settings() -> BuildSettings {
    SettingsBuilder::new()
      .set("os", "linux")
      .unwrap()
      .set("arch", "x86_64")
      .unwrap()
      .set("compiler", "gcc")
      .unwrap()
      .set("build_type", "Release")
      .unwrap()
      .build()
      .unwrap()
  }

  fn archive_with_header(name: &str) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    let content = b"#pragma once\n";
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
      .append_data(&mut header, format!("include/{name}.h"), &content[..])
      .unwrap();
    builder.into_inner().unwrap().finish().unwrap()
  }

  fn entry_json(sha256: &str) -> String {
    serde_json::json!({
      "name": "fmt",
      "version": "10.2.1",
      "binaries": [
        { "package_id": "dbg", "settings": { "build_type": "Debug" }, "sha256": "00" },
        { "package_id": "rel", "settings": { "os": "linux", "build_type": "Release" },
          "include_dirs": ["include"], "libs": ["fmt"], "sha256": sha256 },
      ],
    })
    .to_string()
  }

  #[tokio::test]
  async fn downloads_verifies_and_caches_binary() {
    let mut server = mockito::Server::new_async().await;
    let archive = archive_with_header("fmt");
    let sha = hex::encode(Sha256::digest(&archive));

    let entry_mock = server
      .mock("GET", "/fmt/10.2.1/kiln-package.json")
      .with_body(entry_json(&sha))
      .expect(1)
      .create_async()
      .await;
    let archive_mock = server
      .mock("GET", "/fmt/10.2.1/rel.tar.gz")
      .with_body(archive)
      .expect(1)
      .create_async()
      .await;

    let temp = TempDir::new().unwrap();
    let index = RemoteIndex::new(&server.url(), LocalIndex::new(temp.path()));
    let dep = DependencyRef::new("fmt", "10.2.1");

    let first = index.lookup(&dep, &settings()).await.unwrap();
    assert_eq!(first.package_id, "rel");
    assert!(first.include_dirs[0].join("fmt.h").is_file());

    // Served from the cache the second time: the mocks expect one hit each.
    let second = index.lookup(&dep, &settings()).await.unwrap();
    assert_eq!(first, second);

    entry_mock.assert_async().await;
    archive_mock.assert_async().await;
  }

  #[tokio::test]
  async fn hash_mismatch_leaves_cache_untouched() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("GET", "/fmt/10.2.1/kiln-package.json")
      .with_body(entry_json(&"ab".repeat(32)))
      .create_async()
      .await;
    server
      .mock("GET", "/fmt/10.2.1/rel.tar.gz")
      .with_body(archive_with_header("fmt"))
      .create_async()
      .await;

    let temp = TempDir::new().unwrap();
    let index = RemoteIndex::new(&server.url(), LocalIndex::new(temp.path()));

    let err = index
      .lookup(&DependencyRef::new("fmt", "10.2.1"), &settings())
      .await
      .unwrap_err();
    assert!(matches!(err, IndexError::HashMismatch { .. }));
    assert!(!temp.path().join("fmt/10.2.1/rel").exists());
  }

  #[tokio::test]
  async fn package_id_cannot_leave_cache() {
    let mut server = mockito::Server::new_async().await;
    let archive = archive_with_header("fmt");
    let sha = hex::encode(Sha256::digest(&archive));
    let entry = serde_json::json!({
      "name": "fmt",
      "version": "10.2.1",
      "binaries": [{ "package_id": "../../../escaped", "include_dirs": ["include"], "sha256": sha }],
    });
    server
      .mock("GET", "/fmt/10.2.1/kiln-package.json")
      .with_body(entry.to_string())
      .create_async()
      .await;
    let archive_mock = server
      .mock("GET", mockito::Matcher::Regex(r"\.tar\.gz$".to_string()))
      .with_body(archive)
      .expect(0)
      .create_async()
      .await;

    let temp = TempDir::new().unwrap();
    let cache = temp.path().join("cache");
    let index = RemoteIndex::new(&server.url(), LocalIndex::new(&cache));

    let err = index
      .lookup(&DependencyRef::new("fmt", "10.2.1"), &settings())
      .await
      .unwrap_err();

    assert!(matches!(err, IndexError::Fetch { ref message, .. } if message.contains("../../../escaped")));
    assert!(!temp.path().join("escaped").exists());
    assert!(!cache.join("escaped").exists());
    assert!(!cache.join("fmt/10.2.1").join(PACKAGE_METADATA_FILENAME).exists());
    archive_mock.assert_async().await;
  }

  #[tokio::test]
  async fn missing_remote_version_is_version_not_found() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("GET", "/libA/9.9.9/kiln-package.json")
      .with_status(404)
      .create_async()
      .await;

    let temp = TempDir::new().unwrap();
    let index = RemoteIndex::new(&server.url(), LocalIndex::new(temp.path()));

    let err = index
      .lookup(&DependencyRef::new("libA", "9.9.9"), &settings())
      .await
      .unwrap_err();
    assert!(matches!(err, IndexError::VersionNotFound { .. }));
  }

  #[tokio::test]
  async fn server_error_is_fetch_error() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("GET", "/libA/1.0.0/kiln-package.json")
      .with_status(500)
      .create_async()
      .await;

    let temp = TempDir::new().unwrap();
    let index = RemoteIndex::new(&server.url(), LocalIndex::new(temp.path()));

    let err = index
      .lookup(&DependencyRef::new("libA", "1.0.0"), &settings())
      .await
      .unwrap_err();
    assert!(matches!(err, IndexError::Fetch { .. }));
  }
}
