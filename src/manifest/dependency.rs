//! Dependency records.
//!
//! A dependency names another package at an exact, opaque version (commit
//! SHA, tag, or version string). The same `(name, version)` pair may be
//! cited by many packages; the resolver deduplicates records behind shared
//! handles so feature accumulation is observed by every citing package.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use crate::error::{Error, Result};

/// A single dependency edge as written in a manifest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dependency {
    pub name: String,

    /// Git repository URL, when fetched from git.
    pub git_url: String,

    /// Local directory override; takes precedence over URL-based fetch.
    pub path: String,

    /// Exact version string, treated opaquely.
    pub version: String,

    /// Features the depending package requests.
    pub enabled_features: BTreeSet<String>,

    /// Resolved against the ambient toolchain rather than fetched.
    pub system: bool,

    /// Library names supplied for system dependencies.
    pub libs: Vec<String>,
}

/// `name -> version -> Dependency`. A dependency may appear in multiple
/// versions.
pub type DependencyMap = BTreeMap<String, BTreeMap<String, Dependency>>;

/// Shared handle into the resolver's deduplicated dependency registry.
pub type SharedDependency = Rc<RefCell<Dependency>>;

/// `name -> version -> shared handle`.
pub type SharedDependencyMap = BTreeMap<String, BTreeMap<String, SharedDependency>>;

impl Dependency {
    /// Parse a dependency from its manifest value.
    ///
    /// Accepts the short form (`foo = "1.2.3"`) and the detailed table form
    /// (`foo = { version = "...", git = "...", path = "...",
    /// features = [...], libs = [...], system = false }`).
    pub fn load(name: &str, value: &toml::Value) -> Result<Dependency> {
        if let Some(version) = value.as_str() {
            return Ok(Dependency {
                name: name.to_string(),
                version: version.to_string(),
                ..Default::default()
            });
        }

        let table = value.as_table().ok_or_else(|| {
            Error::type_mismatch(
                &format!("dependencies.{name}"),
                "string or table",
                value.type_str(),
            )
        })?;

        let get_str = |key: &str| -> String {
            table
                .get(key)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };

        let enabled_features = table
            .get("features")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let libs = table
            .get("libs")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Dependency {
            name: name.to_string(),
            git_url: get_str("git"),
            path: get_str("path"),
            version: get_str("version"),
            enabled_features,
            system: table.get("system").and_then(|v| v.as_bool()).unwrap_or(false),
            libs,
        })
    }

    /// Render as an inline table for the lock cache
    /// (`{ name = "...", version = "...", ... }`).
    pub fn to_inline_table(&self) -> toml_edit::InlineTable {
        let mut out = toml_edit::InlineTable::new();
        out.insert("name", self.name.as_str().into());
        if !self.git_url.is_empty() {
            out.insert("git", self.git_url.as_str().into());
        }
        if !self.path.is_empty() {
            out.insert("path", self.path.as_str().into());
        }
        if !self.version.is_empty() {
            out.insert("version", self.version.as_str().into());
        }
        if !self.enabled_features.is_empty() {
            let mut features = toml_edit::Array::new();
            for feature in &self.enabled_features {
                features.push(feature.as_str());
            }
            out.insert("features", toml_edit::Value::Array(features));
        }
        if !self.libs.is_empty() {
            let mut libs = toml_edit::Array::new();
            for lib in &self.libs {
                libs.push(lib.as_str());
            }
            out.insert("libs", toml_edit::Value::Array(libs));
        }
        out
    }
}

/// Insert a dependency into a map, unioning `enabled_features` when the
/// same `(name, version)` is already present. Non-empty fields of the
/// existing record are never clobbered.
pub fn insert_dependency(map: &mut DependencyMap, dep: Dependency) {
    let versions = map.entry(dep.name.clone()).or_default();
    match versions.get_mut(&dep.version) {
        Some(existing) => {
            existing
                .enabled_features
                .extend(dep.enabled_features.iter().cloned());
            if existing.git_url.is_empty() {
                existing.git_url = dep.git_url;
            }
            if existing.path.is_empty() {
                existing.path = dep.path;
            }
        }
        None => {
            versions.insert(dep.version.clone(), dep);
        }
    }
}

/// Union `other` into `map`, feature-merging duplicate `(name, version)`
/// entries.
pub fn merge_dependency_maps(map: &mut DependencyMap, other: &DependencyMap) {
    for versions in other.values() {
        for dep in versions.values() {
            insert_dependency(map, dep.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(s: &str) -> toml::Value {
        s.parse().unwrap()
    }

    #[test]
    fn test_load_short_form() {
        let dep = Dependency::load("fmt", &toml::Value::String("11.0.2".into())).unwrap();
        assert_eq!(dep.name, "fmt");
        assert_eq!(dep.version, "11.0.2");
        assert!(dep.git_url.is_empty());
        assert!(!dep.system);
    }

    #[test]
    fn test_load_detailed_form() {
        let v = value(
            r#"
            version = "abc123"
            git = "https://github.com/fmtlib/fmt.git"
            features = ["header-only"]
            "#,
        );
        let dep = Dependency::load("fmt", &v).unwrap();
        assert_eq!(dep.version, "abc123");
        assert_eq!(dep.git_url, "https://github.com/fmtlib/fmt.git");
        assert!(dep.enabled_features.contains("header-only"));
    }

    #[test]
    fn test_load_system_dependency() {
        let v = value(
            r#"
            version = "system"
            system = true
            libs = ["z", "ssl"]
            "#,
        );
        let dep = Dependency::load("zlib", &v).unwrap();
        assert!(dep.system);
        assert_eq!(dep.libs, vec!["z", "ssl"]);
    }

    #[test]
    fn test_load_rejects_non_table() {
        let result = Dependency::load("x", &toml::Value::Integer(3));
        assert!(result.is_err());
    }

    #[test]
    fn test_insert_unions_features() {
        let mut map = DependencyMap::new();
        insert_dependency(
            &mut map,
            Dependency {
                name: "fmt".into(),
                version: "1.0".into(),
                enabled_features: ["a".to_string()].into(),
                ..Default::default()
            },
        );
        insert_dependency(
            &mut map,
            Dependency {
                name: "fmt".into(),
                version: "1.0".into(),
                enabled_features: ["b".to_string()].into(),
                git_url: "https://example.com/fmt.git".into(),
                ..Default::default()
            },
        );

        let dep = &map["fmt"]["1.0"];
        assert!(dep.enabled_features.contains("a"));
        assert!(dep.enabled_features.contains("b"));
        assert_eq!(dep.git_url, "https://example.com/fmt.git");
    }

    #[test]
    fn test_distinct_versions_coexist() {
        let mut map = DependencyMap::new();
        for version in ["1.0", "2.0"] {
            insert_dependency(
                &mut map,
                Dependency {
                    name: "fmt".into(),
                    version: version.into(),
                    ..Default::default()
                },
            );
        }
        assert_eq!(map["fmt"].len(), 2);
    }

    #[test]
    fn test_inline_table_rendering() {
        let dep = Dependency {
            name: "fmt".into(),
            version: "1.0".into(),
            enabled_features: ["fast".to_string()].into(),
            ..Default::default()
        };
        let rendered = dep.to_inline_table().to_string();
        assert!(rendered.contains("name = \"fmt\""));
        assert!(rendered.contains("version = \"1.0\""));
        assert!(rendered.contains("features = [\"fast\"]"));
    }
}
