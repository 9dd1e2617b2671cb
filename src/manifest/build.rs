//! Top-level `[[build]]` outputs declared in the base manifest.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::core::BuildLinkType;
use crate::error::Result;
use crate::manifest::base::{BaseFields, FieldSet};
use crate::manifest::dependency::{insert_dependency, Dependency, SharedDependency};
use crate::manifest::package::Package;

/// A buildable output: an executable or a library variant of the base
/// package. Compiler/platform sub-trees are disabled here; compiler and
/// platform selection is global.
#[derive(Debug, Clone, Default)]
pub struct Build {
    pub name: String,
    pub base: BaseFields,
    pub profiles: BTreeSet<String>,
    pub link_type: BuildLinkType,

    /// Every dependency reachable from this build, resolved to shared
    /// registry handles. Keyed by `(name, version)`.
    pub all_dependencies: BTreeMap<(String, String), SharedDependency>,
}

impl Build {
    /// Parse a `[[build]]` entry.
    ///
    /// `dependencies` is accepted in two shapes: the array-of-tables form
    /// (`[{ name = "fmt", version = "1.0" }]`, as the lock cache writes)
    /// and the map form (`{ fmt = "1.0" }`).
    pub fn load(name: &str, value: &toml::Value, base_path: &Path) -> Result<Build> {
        let mut base = BaseFields::load(value, base_path, FieldSet::ALL)?;

        if let Some(entries) = value.get("dependencies").and_then(|v| v.as_array()) {
            for entry in entries {
                if let Some(table) = entry.as_table() {
                    let dep_name = table
                        .get("name")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default();
                    if dep_name.is_empty() {
                        continue;
                    }
                    let mut dep = Dependency::load(dep_name, entry)?;
                    dep.name = dep_name.to_string();
                    insert_dependency(&mut base.dependencies, dep);
                }
            }
        }

        let profiles = value
            .get("profiles")
            .or_else(|| value.get("profile"))
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let link_type = value
            .get("link")
            .and_then(|v| v.as_str())
            .map(BuildLinkType::parse)
            .unwrap_or_default();

        Ok(Build {
            name: name.to_string(),
            base,
            profiles,
            link_type,
            all_dependencies: BTreeMap::new(),
        })
    }

    /// Fold a resolved package's effective settings into this build.
    /// Sources stay with the package that compiles them; only settings and
    /// the dependency set move.
    pub fn merge_package(&mut self, package: &Package) {
        self.base.merge_settings(&package.library.base);
        for (key, dep) in &package.all_dependencies {
            self.all_dependencies
                .entry(key.clone())
                .or_insert_with(|| dep.clone());
        }
    }

    /// Serialize a `[[build]]` entry for the lock cache. Dependencies come
    /// out sorted by `(name, version)`.
    pub fn serialize(&self, version: &str) -> toml_edit::Table {
        let mut out = toml_edit::Table::new();
        out.insert("name", toml_edit::value(self.name.as_str()));
        out.insert("version", toml_edit::value(version));
        self.base.serialize_into(&mut out, FieldSet::ALL);
        out.insert("link", toml_edit::value(self.link_type.as_str()));

        if !self.profiles.is_empty() {
            let mut profiles = toml_edit::Array::new();
            for profile in &self.profiles {
                profiles.push(profile.as_str());
            }
            out.insert(
                "profiles",
                toml_edit::Item::Value(toml_edit::Value::Array(profiles)),
            );
        }

        if !self.all_dependencies.is_empty() {
            let mut deps = toml_edit::Array::new();
            for dep in self.all_dependencies.values() {
                let mut value = toml_edit::Value::InlineTable(dep.borrow().to_inline_table());
                value.decor_mut().set_prefix("\n    ");
                deps.push_formatted(value);
            }
            deps.set_trailing("\n");
            deps.set_trailing_comma(true);
            out.insert(
                "dependencies",
                toml_edit::Item::Value(toml_edit::Value::Array(deps)),
            );
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_array_form_dependencies() {
        let value: toml::Value = r#"
            sources = ["src/main.cpp"]
            profiles = ["debug", "release"]
            link = "binary"
            dependencies = [
                { name = "lib", version = "0.1" },
            ]
        "#
        .parse()
        .unwrap();

        let build = Build::load("app", &value, Path::new(".")).unwrap();
        assert_eq!(build.name, "app");
        assert_eq!(build.link_type, BuildLinkType::Executable);
        assert_eq!(build.profiles.len(), 2);
        assert_eq!(build.base.dependencies["lib"]["0.1"].name, "lib");
    }

    #[test]
    fn test_load_map_form_dependencies() {
        let value: toml::Value = r#"
            sources = ["src/main.cpp"]

            [dependencies]
            lib = "0.1"
        "#
        .parse()
        .unwrap();

        let build = Build::load("app", &value, Path::new(".")).unwrap();
        assert_eq!(build.base.dependencies["lib"]["0.1"].version, "0.1");
    }

    #[test]
    fn test_serialize_sorts_dependencies() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let mut build = Build {
            name: "app".into(),
            ..Default::default()
        };
        for (name, version) in [("zeta", "2.0"), ("alpha", "1.0")] {
            build.all_dependencies.insert(
                (name.to_string(), version.to_string()),
                Rc::new(RefCell::new(Dependency {
                    name: name.into(),
                    version: version.into(),
                    ..Default::default()
                })),
            );
        }

        let rendered = build.serialize("0.1").to_string();
        let alpha = rendered.find("alpha").unwrap();
        let zeta = rendered.find("zeta").unwrap();
        assert!(alpha < zeta);
    }
}
