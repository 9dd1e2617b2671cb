//! `muuk install`: resolve, write the lockfile, fetch pinned packages.

use std::path::Path;

use anyhow::{Context, Result};

use crate::lockgen::LockGenerator;
use crate::manifest::MUUK_LOCK;
use crate::sources::installer;

pub fn execute(root: &Path) -> Result<()> {
    let generator = LockGenerator::create(root).with_context(|| "failed to generate lockfile")?;

    let lock_path = root.join(MUUK_LOCK);
    generator.write_lockfile(&lock_path)?;

    installer::install(&lock_path)
}
