//! Filesystem helpers shared by the generators and the packager.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use walkdir::WalkDir;

/// Write `contents` to `path` through a sibling temp file and a rename, so
/// readers never observe a half-written file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
  let dir = path
    .parent()
    .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent directory"))?;
  fs::create_dir_all(dir)?;

  let mut tmp = NamedTempFile::new_in(dir)?;
  tmp.write_all(contents)?;
  tmp.flush()?;
  tmp.persist(path).map_err(|e| e.error)?;
  Ok(())
}

/// Recursively copy the contents of `from` into `to`, preserving symlinks.
pub fn copy_dir_all(from: &Path, to: &Path) -> io::Result<()> {
  for entry in WalkDir::new(from).follow_links(false) {
    let entry = entry.map_err(io::Error::other)?;
    let rel = entry.path().strip_prefix(from).map_err(io::Error::other)?;
    let dest = to.join(rel);
    let file_type = entry.file_type();

    if file_type.is_dir() {
      fs::create_dir_all(&dest)?;
    } else if file_type.is_symlink() {
      let target = fs::read_link(entry.path())?;
      if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
      }
      symlink(&target, &dest)?;
    } else {
      if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
      }
      fs::copy(entry.path(), &dest)?;
    }
  }
  Ok(())
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
  std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
  if target.is_dir() {
    std::os::windows::fs::symlink_dir(target, link)
  } else {
    std::os::windows::fs::symlink_file(target, link)
  }
}
