//! `muuk remove`: drop a dependency and rewrite the lockfile.

use std::path::Path;

use anyhow::Result;

use crate::lockgen::LockGenerator;
use crate::manifest::MUUK_LOCK;
use crate::sources::installer;

pub fn execute(root: &Path, name: &str) -> Result<()> {
    installer::remove(name, root)?;

    // Re-resolve so the lockfile reflects the edited manifest.
    match LockGenerator::create(root) {
        Ok(generator) => generator.write_lockfile(&root.join(MUUK_LOCK))?,
        Err(e) => tracing::warn!("lockfile not regenerated after removal: {e:#}"),
    }

    Ok(())
}
