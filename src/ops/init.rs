//! `muuk init`: scaffold a manifest and starter sources in the current
//! directory.

use std::path::Path;

use anyhow::{bail, Result};

use crate::manifest::validate::is_valid_dependency_name;
use crate::manifest::MUUK_TOML;
use crate::util::fs::write_string;

/// Default manifest for a new project.
pub fn default_manifest(name: &str) -> String {
    format!(
        r#"[package]
name = "{name}"
version = "0.1.0"
cxx_standard = "20"

[library]
include = ["include"]
sources = ["src/*.cpp"]

[[build]]
name = "{name}"
sources = ["src/main.cpp"]
dependencies = [{{ name = "{name}", version = "0.1.0" }}]

[profile.debug]
default = true
cflags = ["-g", "-O0"]

[profile.release]
cflags = ["-O2"]
defines = ["NDEBUG"]
"#
    )
}

const DEFAULT_MAIN: &str = r#"#include <iostream>

int main() {
    std::cout << "Hello from muuk!\n";
    return 0;
}
"#;

pub fn execute(root: &Path, name: Option<&str>) -> Result<()> {
    let manifest_path = root.join(MUUK_TOML);
    if manifest_path.exists() {
        bail!("muuk.toml already exists in {}", root.display());
    }

    let dir_name;
    let name = match name {
        Some(name) => name,
        None => {
            dir_name = root
                .canonicalize()
                .ok()
                .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
                .unwrap_or_else(|| "package".to_string());
            &dir_name
        }
    };
    if !is_valid_dependency_name(name) {
        bail!("`{name}` is not a valid package name");
    }

    write_string(&manifest_path, &default_manifest(name))?;
    let main_path = root.join("src").join("main.cpp");
    if !main_path.exists() {
        write_string(&main_path, DEFAULT_MAIN)?;
    }

    tracing::info!("initialized package '{}'", name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_scaffolds_project() {
        let tmp = TempDir::new().unwrap();
        execute(tmp.path(), Some("demo")).unwrap();

        assert!(tmp.path().join("muuk.toml").exists());
        assert!(tmp.path().join("src/main.cpp").exists());

        // The scaffold passes its own validation.
        let data = crate::manifest::load_manifest(&tmp.path().join("muuk.toml")).unwrap();
        assert_eq!(
            data.get("package").and_then(|p| p.get("name")).and_then(|v| v.as_str()),
            Some("demo")
        );
    }

    #[test]
    fn test_init_refuses_existing_manifest() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("muuk.toml"), "[package]\n").unwrap();
        let err = execute(tmp.path(), Some("demo")).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_init_rejects_bad_name() {
        let tmp = TempDir::new().unwrap();
        assert!(execute(tmp.path(), Some("-bad")).is_err());
    }
}
