//! `muuk add`: insert a dependency into the manifest, preserving its
//! formatting.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};

use crate::manifest::validate::is_valid_dependency_name;
use crate::manifest::MUUK_TOML;

/// Options of `muuk add`.
#[derive(Debug, Clone, Default)]
pub struct AddOptions {
    /// `<author>/<repo>`, or a bare package name with `--git`.
    pub spec: String,

    /// Pinned version (commit SHA, tag, or version string).
    pub version: Option<String>,

    /// Explicit git URL; defaults to GitHub based on the spec.
    pub git: Option<String>,

    /// Local directory carrying the dependency's `muuk.toml`.
    pub muuk_path: Option<String>,

    /// Resolve against the ambient toolchain instead of fetching.
    pub system: bool,

    /// Add to a named `[[build]]` entry's dependency list as well.
    pub target: Option<String>,
}

pub fn execute(root: &Path, options: &AddOptions) -> Result<()> {
    let (author, name) = match options.spec.split_once('/') {
        Some((author, name)) => (Some(author), name),
        None => (None, options.spec.as_str()),
    };

    if !is_valid_dependency_name(name) {
        bail!("invalid dependency name: `{name}`");
    }

    let git_url = match (&options.git, author) {
        (Some(url), _) => {
            url::Url::parse(url).with_context(|| format!("invalid git URL: {url}"))?;
            Some(url.clone())
        }
        (None, Some(author)) => Some(format!("https://github.com/{author}/{name}.git")),
        (None, None) => None,
    };
    if git_url.is_none() && options.muuk_path.is_none() && !options.system {
        bail!("dependency `{name}` needs `<author>/<repo>`, --git, --muuk-path, or --sys");
    }

    let version = options.version.clone().unwrap_or_else(|| "latest".to_string());

    let manifest_path = root.join(MUUK_TOML);
    let content = fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    let mut doc: toml_edit::DocumentMut =
        content.parse().with_context(|| "failed to parse muuk.toml")?;

    if doc
        .get("dependencies")
        .and_then(|item| item.as_table())
        .is_some_and(|table| table.contains_key(name))
    {
        bail!("dependency `{name}` is already present in muuk.toml");
    }

    let mut entry = toml_edit::InlineTable::new();
    entry.insert("version", version.as_str().into());
    if let Some(url) = &git_url {
        entry.insert("git", url.as_str().into());
    }
    if let Some(path) = &options.muuk_path {
        entry.insert("path", path.as_str().into());
    }
    if options.system {
        entry.insert("system", true.into());
    }

    if doc.get("dependencies").is_none() {
        let mut table = toml_edit::Table::new();
        table.set_implicit(false);
        doc.insert("dependencies", toml_edit::Item::Table(table));
    }
    let deps = doc["dependencies"]
        .as_table_mut()
        .ok_or_else(|| anyhow!("[dependencies] is not a table"))?;
    deps.insert(
        name,
        toml_edit::Item::Value(toml_edit::Value::InlineTable(entry)),
    );

    // Optionally reference the dependency from a [[build]] entry.
    if let Some(target) = &options.target {
        let builds = doc
            .get_mut("build")
            .and_then(|item| item.as_array_of_tables_mut())
            .ok_or_else(|| anyhow!("manifest has no [[build]] entries"))?;
        let build = builds
            .iter_mut()
            .find(|table| {
                table
                    .get("name")
                    .and_then(|item| item.as_str())
                    .is_some_and(|n| n == target)
            })
            .ok_or_else(|| anyhow!("no [[build]] entry named '{target}'"))?;

        let deps_item = build.entry("dependencies").or_insert_with(|| {
            toml_edit::Item::Value(toml_edit::Value::Array(toml_edit::Array::new()))
        });
        let deps_array = deps_item
            .as_value_mut()
            .and_then(|value| value.as_array_mut())
            .ok_or_else(|| anyhow!("[[build]] dependencies of '{target}' is not an array"))?;

        let mut reference = toml_edit::InlineTable::new();
        reference.insert("name", name.into());
        reference.insert("version", version.as_str().into());
        deps_array.push(toml_edit::Value::InlineTable(reference));
    }

    fs::write(&manifest_path, doc.to_string())
        .with_context(|| format!("failed to write {}", manifest_path.display()))?;

    tracing::info!("added dependency '{}' @ {}", name, version);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project(manifest: &str) -> TempDir {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("muuk.toml"), manifest).unwrap();
        tmp
    }

    const BASE: &str = "[package]\nname = \"app\"\nversion = \"0.1\"\n";

    #[test]
    fn test_add_github_spec() {
        let tmp = project(BASE);
        execute(
            tmp.path(),
            &AddOptions {
                spec: "fmtlib/fmt".into(),
                version: Some("11.0.2".into()),
                ..Default::default()
            },
        )
        .unwrap();

        let manifest = fs::read_to_string(tmp.path().join("muuk.toml")).unwrap();
        assert!(manifest.contains("[dependencies]"));
        assert!(manifest.contains("version = \"11.0.2\""));
        assert!(manifest.contains("git = \"https://github.com/fmtlib/fmt.git\""));
    }

    #[test]
    fn test_add_preserves_existing_formatting() {
        let original = "[package]\nname = \"app\"  # comment\nversion = \"0.1\"\n";
        let tmp = project(original);
        execute(
            tmp.path(),
            &AddOptions {
                spec: "user/lib".into(),
                ..Default::default()
            },
        )
        .unwrap();

        let manifest = fs::read_to_string(tmp.path().join("muuk.toml")).unwrap();
        assert!(manifest.contains("# comment"));
        assert!(manifest.contains("version = \"latest\""));
    }

    #[test]
    fn test_add_then_remove_is_identity() {
        let tmp = project(BASE);
        let before = fs::read_to_string(tmp.path().join("muuk.toml")).unwrap();

        execute(
            tmp.path(),
            &AddOptions {
                spec: "user/lib".into(),
                ..Default::default()
            },
        )
        .unwrap();
        crate::sources::installer::remove("lib", tmp.path()).unwrap();

        let after = fs::read_to_string(tmp.path().join("muuk.toml")).unwrap();
        // Modulo the (possibly empty) dependencies table header.
        assert_eq!(
            before.replace(char::is_whitespace, ""),
            after.replace("[dependencies]", "").replace(char::is_whitespace, "")
        );
    }

    #[test]
    fn test_add_duplicate_fails() {
        let tmp = project("[package]\nname = \"a\"\nversion = \"1\"\n\n[dependencies]\nfmt = \"1.0\"\n");
        let err = execute(
            tmp.path(),
            &AddOptions {
                spec: "fmtlib/fmt".into(),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("already present"));
    }

    #[test]
    fn test_add_rejects_malformed_git_url() {
        let tmp = project(BASE);
        let err = execute(
            tmp.path(),
            &AddOptions {
                spec: "lib".into(),
                git: Some("not a url".into()),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("invalid git URL"));
    }

    #[test]
    fn test_add_invalid_name_fails() {
        let tmp = project(BASE);
        assert!(execute(
            tmp.path(),
            &AddOptions {
                spec: "user/-bad".into(),
                ..Default::default()
            },
        )
        .is_err());
    }

    #[test]
    fn test_add_system_dependency() {
        let tmp = project(BASE);
        execute(
            tmp.path(),
            &AddOptions {
                spec: "zlib".into(),
                system: true,
                ..Default::default()
            },
        )
        .unwrap();

        let manifest = fs::read_to_string(tmp.path().join("muuk.toml")).unwrap();
        assert!(manifest.contains("system = true"));
    }

    #[test]
    fn test_add_to_build_target() {
        let tmp = project(
            "[package]\nname = \"app\"\nversion = \"0.1\"\n\n[[build]]\nname = \"app\"\nsources = [\"src/main.cpp\"]\n",
        );
        execute(
            tmp.path(),
            &AddOptions {
                spec: "user/lib".into(),
                version: Some("1.0".into()),
                target: Some("app".into()),
                ..Default::default()
            },
        )
        .unwrap();

        let manifest = fs::read_to_string(tmp.path().join("muuk.toml")).unwrap();
        assert!(manifest.contains("name = \"lib\""));
        let build_section = manifest.find("[[build]]").unwrap();
        let reference = manifest.rfind("name = \"lib\"").unwrap();
        assert!(reference > build_section);
    }
}
