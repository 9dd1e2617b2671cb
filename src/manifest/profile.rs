//! Build profiles (`[profile.<name>]`) and their inheritance.

use std::path::Path;

use crate::error::Result;
use crate::manifest::base::{BaseFields, Compilers, FieldSet, Platforms};

/// A named set of compile/link settings. Profiles form a DAG via
/// `inherits`; resolution folds every inherited profile's settings into the
/// inheriting one.
#[derive(Debug, Clone, Default)]
pub struct Profile {
    pub name: String,
    pub inherits: Vec<String>,

    /// At most one profile may be the default for `muuk build`.
    pub default: bool,

    pub base: BaseFields,
    pub compilers: Compilers,
    pub platforms: Platforms,
}

impl Profile {
    pub fn load(name: &str, value: &toml::Value, base_path: &Path) -> Result<Profile> {
        let base = BaseFields::load(value, base_path, FieldSet::ALL)?;

        // `inherits` may be a single string or a list of strings.
        let inherits = match value.get("inherits") {
            Some(toml::Value::String(s)) => vec![s.clone()],
            Some(toml::Value::Array(arr)) => arr
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };

        let compilers = match value.get("compiler") {
            Some(v) => Compilers::load(v, base_path)?,
            None => Compilers::default(),
        };
        let platforms = match value.get("platform") {
            Some(v) => Platforms::load(v, base_path)?,
            None => Platforms::default(),
        };

        Ok(Profile {
            name: name.to_string(),
            inherits,
            default: value.get("default").and_then(|v| v.as_bool()).unwrap_or(false),
            base,
            compilers,
            platforms,
        })
    }

    /// Fold an inherited profile's settings into this one.
    pub fn merge_from(&mut self, other: &Profile) {
        self.base.merge(&other.base);
        self.compilers.merge(&other.compilers);
        self.platforms.merge(&other.platforms);
    }

    /// Serialize for the lock cache (`[profile.<name>]`).
    pub fn serialize(&self) -> toml_edit::Table {
        let mut out = toml_edit::Table::new();
        self.base.serialize_into(&mut out, FieldSet::ALL);

        if !self.inherits.is_empty() {
            let mut inherits = toml_edit::Array::new();
            for parent in &self.inherits {
                inherits.push(parent.as_str());
            }
            out.insert(
                "inherits",
                toml_edit::Item::Value(toml_edit::Value::Array(inherits)),
            );
        }
        if self.default {
            out.insert("default", toml_edit::value(true));
        }

        self.compilers.serialize_into(&mut out);
        self.platforms.serialize_into(&mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(name: &str, toml: &str) -> Profile {
        let value: toml::Value = toml.parse().unwrap();
        Profile::load(name, &value, Path::new(".")).unwrap()
    }

    #[test]
    fn test_inherits_string_and_list_forms() {
        let single = load("release-lto", "inherits = \"release\"");
        assert_eq!(single.inherits, vec!["release"]);

        let list = load("everything", "inherits = [\"release\", \"warnings\"]");
        assert_eq!(list.inherits.len(), 2);
    }

    #[test]
    fn test_inheritance_is_superset() {
        let release = load("release", "cflags = [\"-O3\"]\ndefines = [\"NDEBUG\"]");
        let mut lto = load("release-lto", "inherits = \"release\"\ncflags = [\"-flto\"]");

        lto.merge_from(&release);

        for flag in &release.base.cflags {
            assert!(lto.base.cflags.contains(flag));
        }
        assert!(lto.base.cflags.contains("-flto"));
        assert!(lto.base.defines.contains("NDEBUG"));
    }

    #[test]
    fn test_default_flag() {
        let profile = load("debug", "default = true\ncflags = [\"-g\"]");
        assert!(profile.default);
    }
}
