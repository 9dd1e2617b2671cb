//! `muuk clean`: remove the build tree.

use std::path::Path;

use anyhow::Result;

use crate::util::fs::remove_dir_all_if_exists;

pub fn execute(root: &Path) -> Result<()> {
    let build_dir = root.join("build");
    remove_dir_all_if_exists(&build_dir)?;
    tracing::info!("removed {}", build_dir.display());
    Ok(())
}
