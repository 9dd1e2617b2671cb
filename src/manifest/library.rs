//! Library and external-subproject nodes.

use std::collections::BTreeSet;
use std::path::Path;

use crate::core::LinkType;
use crate::error::{Error, Result};
use crate::manifest::base::{BaseFields, Compilers, FieldSet, Platforms};
use crate::util::fs::join_normalized;

/// First-party library settings parsed from `[library]`.
#[derive(Debug, Clone, Default)]
pub struct Library {
    pub name: String,
    pub version: String,
    pub base: BaseFields,

    /// Profiles this library participates in; filled by profile
    /// propagation, not by the manifest.
    pub profiles: BTreeSet<String>,

    pub link_type: LinkType,
}

impl Library {
    pub fn load(
        name: &str,
        version: &str,
        base_path: &Path,
        value: &toml::Value,
    ) -> Result<Library> {
        let base = BaseFields::load(value, base_path, FieldSet::LIBRARY)?;
        let link_type = value
            .get("link")
            .and_then(|v| v.as_str())
            .map(LinkType::parse)
            .unwrap_or_default();

        Ok(Library {
            name: name.to_string(),
            version: version.to_string(),
            base,
            profiles: BTreeSet::new(),
            link_type,
        })
    }

    /// Serialize a `[[library]]` entry for the lock cache. The package's
    /// compiler and platform settings ride along on the entry.
    pub fn serialize(
        &self,
        path: &str,
        compilers: &Compilers,
        platforms: &Platforms,
    ) -> toml_edit::Table {
        let mut out = toml_edit::Table::new();
        out.insert("name", toml_edit::value(self.name.as_str()));
        out.insert("version", toml_edit::value(self.version.as_str()));
        out.insert("path", toml_edit::value(path));
        self.base.serialize_into(&mut out, FieldSet::LIBRARY);
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

        platforms.serialize_into(&mut out);
        compilers.serialize_into(&mut out);
        out
    }
}

/// One artifact produced by an external subproject build.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExternalOutput {
    pub path: String,

    /// Profile this output belongs to; empty means every profile.
    pub profile: String,
}

/// A non-first-party subproject built by its own toolchain (`[[external]]`).
#[derive(Debug, Clone, Default)]
pub struct External {
    pub name: String,
    pub version: String,
    pub profiles: BTreeSet<String>,

    /// Build system kind; `"cmake"` is the only kind currently driven.
    pub kind: String,

    /// Source directory of the subproject.
    pub path: String,

    /// Arguments forwarded to the configure step.
    pub args: Vec<String>,

    pub outputs: Vec<ExternalOutput>,

    /// The file the configure step depends on (e.g. `CMakeLists.txt`).
    pub source_file: String,
}

impl External {
    pub fn load(
        name: &str,
        version: &str,
        base_path: &Path,
        value: &toml::Value,
    ) -> Result<External> {
        let table = value
            .as_table()
            .ok_or_else(|| Error::type_mismatch("external", "table", value.type_str()))?;

        let kind = table
            .get("type")
            .and_then(|v| v.as_str())
            .unwrap_or("cmake")
            .to_string();
        let raw_path = table
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::required_key_missing("external.path"))?;
        let path = join_normalized(base_path, raw_path);

        let args = table
            .get("args")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let mut outputs = Vec::new();
        if let Some(entries) = table.get("outputs").and_then(|v| v.as_array()) {
            for entry in entries {
                if let Some(path) = entry.as_str() {
                    outputs.push(ExternalOutput {
                        path: path.to_string(),
                        profile: String::new(),
                    });
                } else if let Some(t) = entry.as_table() {
                    outputs.push(ExternalOutput {
                        path: t
                            .get("path")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        profile: t
                            .get("profile")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string(),
                    });
                }
            }
        }

        let profiles = table
            .get("profiles")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let source_file = match kind.as_str() {
            "cmake" => format!("{path}/CMakeLists.txt"),
            _ => path.clone(),
        };

        Ok(External {
            name: name.to_string(),
            version: version.to_string(),
            profiles,
            kind,
            path,
            args,
            outputs,
            source_file,
        })
    }

    /// Serialize a `[[external]]` entry for the lock cache.
    pub fn serialize(&self) -> toml_edit::Table {
        let mut out = toml_edit::Table::new();
        out.insert("name", toml_edit::value(self.name.as_str()));
        out.insert("version", toml_edit::value(self.version.as_str()));
        out.insert("type", toml_edit::value(self.kind.as_str()));
        out.insert("path", toml_edit::value(self.path.as_str()));

        if !self.args.is_empty() {
            let mut args = toml_edit::Array::new();
            for arg in &self.args {
                args.push(arg.as_str());
            }
            out.insert("args", toml_edit::Item::Value(toml_edit::Value::Array(args)));
        }

        if !self.outputs.is_empty() {
            let mut arr = toml_edit::Array::new();
            for output in &self.outputs {
                let mut entry = toml_edit::InlineTable::new();
                entry.insert("path", output.path.as_str().into());
                if !output.profile.is_empty() {
                    entry.insert("profile", output.profile.as_str().into());
                }
                let mut value = toml_edit::Value::InlineTable(entry);
                value.decor_mut().set_prefix("\n    ");
                arr.push_formatted(value);
            }
            arr.set_trailing("\n");
            arr.set_trailing_comma(true);
            out.insert("outputs", toml_edit::Item::Value(toml_edit::Value::Array(arr)));
        }

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

        out.insert("source_file", toml_edit::value(self.source_file.as_str()));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_load() {
        let value: toml::Value = r#"
            include = ["include"]
            sources = ["src/lib.cpp"]
            cflags = ["-Wall"]
            link = "shared"
        "#
        .parse()
        .unwrap();

        let lib = Library::load("mylib", "1.0", Path::new("."), &value).unwrap();
        assert_eq!(lib.name, "mylib");
        assert_eq!(lib.link_type, LinkType::Shared);
        assert_eq!(lib.base.sources.len(), 1);
        assert!(lib.base.dependencies.is_empty());
    }

    #[test]
    fn test_external_load_with_profiled_outputs() {
        let value: toml::Value = r#"
            type = "cmake"
            path = "vendor/zlib"
            args = ["-DBUILD_SHARED_LIBS=OFF"]
            outputs = [
                { path = "libz.a", profile = "release" },
                { path = "libzd.a", profile = "debug" },
            ]
            profiles = ["release", "debug"]
        "#
        .parse()
        .unwrap();

        let ext = External::load("zlib", "1.3.1", Path::new("."), &value).unwrap();
        assert_eq!(ext.kind, "cmake");
        assert_eq!(ext.path, "vendor/zlib");
        assert_eq!(ext.source_file, "vendor/zlib/CMakeLists.txt");
        assert_eq!(ext.outputs.len(), 2);
        assert_eq!(ext.outputs[0].profile, "release");
    }

    #[test]
    fn test_external_requires_path() {
        let value: toml::Value = "type = \"cmake\"".parse().unwrap();
        assert!(External::load("x", "1", Path::new("."), &value).is_err());
    }

    #[test]
    fn test_library_serialize_carries_link_and_path() {
        let value: toml::Value = "sources = [\"src/a.cpp\"]".parse().unwrap();
        let lib = Library::load("a", "0.1", Path::new("."), &value).unwrap();
        let table = lib.serialize(".", &Compilers::default(), &Platforms::default());
        let rendered = table.to_string();
        assert!(rendered.contains("name = \"a\""));
        assert!(rendered.contains("link = \"static\""));
        assert!(rendered.contains("path = \".\""));
    }
}
