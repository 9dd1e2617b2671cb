//! `muuk run`: execute a `[scripts]` entry from the manifest.

use std::path::Path;

use anyhow::{anyhow, Result};

use crate::manifest::{self, MUUK_TOML};
use crate::util::process::ProcessBuilder;

pub fn execute(root: &Path, script: &str, args: &[String]) -> Result<()> {
    let data = manifest::parse_toml_file(&root.join(MUUK_TOML))?;

    let command = data
        .get("scripts")
        .and_then(|scripts| scripts.get(script))
        .and_then(|value| value.as_str())
        .ok_or_else(|| anyhow!("script '{script}' not found in [scripts]"))?;

    let mut parts = command.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| anyhow!("script '{script}' is empty"))?;

    ProcessBuilder::new(program)
        .args(parts)
        .args(args)
        .cwd(root)
        .status()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_script_errors() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("muuk.toml"),
            "[package]\nname = \"a\"\nversion = \"1\"\n",
        )
        .unwrap();

        let err = execute(tmp.path(), "lint", &[]).unwrap_err();
        assert!(err.to_string().contains("lint"));
    }

    #[test]
    fn test_runs_declared_script() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("muuk.toml"),
            "[package]\nname = \"a\"\nversion = \"1\"\n\n[scripts]\ncheck = \"true\"\n",
        )
        .unwrap();

        execute(tmp.path(), "check", &[]).unwrap();
    }
}
