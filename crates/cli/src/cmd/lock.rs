//! `kiln lock`: resolve requirements and pin them in `kiln.lock`.

use anyhow::Result;

use super::{orchestrator, stage_err};
use crate::BuildArgs;
use crate::output::{OutputFormat, print_item, print_json, print_success, print_warning, truncate_hash};

pub fn cmd_lock(args: &BuildArgs, format: OutputFormat) -> Result<()> {
  let orchestrator = orchestrator(args)?;
  let (path, lock) = orchestrator.write_lock().map_err(stage_err)?;

  if format.is_json() {
    return print_json(&lock);
  }

  if lock.requires.is_empty() {
    print_warning("Recipe has no requirements; wrote an empty lock file");
  }
  print_success(&format!("Wrote {}", path.display()));
  for (name, pinned) in &lock.requires {
    print_item(
      &format!("{name}/{}", pinned.version),
      truncate_hash(&pinned.package_id),
    );
  }
  Ok(())
}
