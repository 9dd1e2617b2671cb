//! Common settings carried by manifest nodes, and their merge algebra.
//!
//! Library, build, profile, and compiler/platform leaf nodes all carry the
//! same underlying record of sources, flags, and defines. Which fields a
//! node actually reads is data (a [`FieldSet`]), not code: the load, merge,
//! and serialize routines are written once.

use std::collections::BTreeSet;
use std::path::Path;

use crate::error::{Error, Result};
use crate::manifest::dependency::{merge_dependency_maps, Dependency, DependencyMap};
use crate::util::fs::join_normalized;

/// A source or module entry: a path plus per-file compiler flags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceFile {
    pub path: String,
    pub cflags: Vec<String>,
}

impl SourceFile {
    /// Parse one entry of a `sources`/`modules` array.
    ///
    /// Three forms are accepted: a plain path string, the legacy
    /// space-separated `"path flag1 flag2"` string, and the table form
    /// `{ path = "...", cflags = [...] }`. All produce identical values.
    pub fn load(value: &toml::Value, base_path: &Path, key: &str) -> Result<SourceFile> {
        if let Some(entry) = value.as_str() {
            let mut parts = entry.split_whitespace();
            let path = parts.next().unwrap_or_default();
            return Ok(SourceFile {
                path: join_normalized(base_path, path),
                cflags: parts.map(str::to_string).collect(),
            });
        }

        if let Some(table) = value.as_table() {
            let path = table
                .get("path")
                .and_then(|v| v.as_str())
                .ok_or_else(|| Error::required_key_missing(&format!("{key}.path")))?;
            let cflags = table
                .get("cflags")
                .and_then(|v| v.as_array())
                .map(|arr| {
                    arr.iter()
                        .filter_map(|v| v.as_str())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            return Ok(SourceFile {
                path: join_normalized(base_path, path),
                cflags,
            });
        }

        Err(Error::type_mismatch(key, "string or table", value.type_str()))
    }

    /// Render as an inline table for the lock cache.
    pub fn to_inline_table(&self) -> toml_edit::InlineTable {
        let mut out = toml_edit::InlineTable::new();
        out.insert("path", self.path.as_str().into());
        if !self.cflags.is_empty() {
            let mut cflags = toml_edit::Array::new();
            for flag in &self.cflags {
                cflags.push(flag.as_str());
            }
            out.insert("cflags", toml_edit::Value::Array(cflags));
        }
        out
    }
}

/// Which [`BaseFields`] keys a node type reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSet {
    pub sources: bool,
    pub modules: bool,
    pub include: bool,
    pub defines: bool,
    pub undefines: bool,
    pub cflags: bool,
    pub cxxflags: bool,
    pub aflags: bool,
    pub lflags: bool,
    pub libs: bool,
    pub dependencies: bool,
}

impl FieldSet {
    /// Every field enabled.
    pub const ALL: FieldSet = FieldSet {
        sources: true,
        modules: true,
        include: true,
        defines: true,
        undefines: true,
        cflags: true,
        cxxflags: true,
        aflags: true,
        lflags: true,
        libs: true,
        dependencies: true,
    };

    /// Library nodes: dependencies live on the package, not the library.
    pub const LIBRARY: FieldSet = FieldSet {
        dependencies: false,
        ..FieldSet::ALL
    };

    /// Compiler/platform leaves carry settings only.
    pub const LEAF: FieldSet = FieldSet {
        dependencies: false,
        ..FieldSet::ALL
    };
}

/// The common settings record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaseFields {
    pub sources: Vec<SourceFile>,
    pub modules: Vec<SourceFile>,
    pub include: BTreeSet<String>,
    pub libs: BTreeSet<String>,
    pub defines: BTreeSet<String>,
    pub undefines: BTreeSet<String>,
    pub cflags: BTreeSet<String>,
    pub cxxflags: BTreeSet<String>,
    pub aflags: BTreeSet<String>,
    pub lflags: BTreeSet<String>,
    pub dependencies: DependencyMap,
}

fn str_set(table: &toml::value::Table, key: &str) -> BTreeSet<String> {
    table
        .get(key)
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

impl BaseFields {
    /// Load the enabled fields from a TOML table. Relative paths in
    /// `include` and source entries resolve against `base_path` and are
    /// stored forward-slash.
    pub fn load(value: &toml::Value, base_path: &Path, fields: FieldSet) -> Result<BaseFields> {
        let table = match value.as_table() {
            Some(table) => table,
            None => return Ok(BaseFields::default()),
        };

        let mut out = BaseFields::default();

        if fields.sources {
            out.sources = Self::parse_sources(table, base_path, "sources")?;
        }
        if fields.modules {
            out.modules = Self::parse_sources(table, base_path, "modules")?;
        }
        if fields.include {
            out.include = str_set(table, "include")
                .into_iter()
                .map(|inc| join_normalized(base_path, &inc))
                .collect();
        }
        if fields.defines {
            out.defines = str_set(table, "defines");
        }
        if fields.undefines {
            out.undefines = str_set(table, "undefines");
        }
        if fields.cflags {
            out.cflags = str_set(table, "cflags");
        }
        if fields.cxxflags {
            out.cxxflags = str_set(table, "cxxflags");
        }
        if fields.aflags {
            out.aflags = str_set(table, "aflags");
        }
        if fields.lflags {
            out.lflags = str_set(table, "lflags");
        }
        if fields.libs {
            out.libs = str_set(table, "libs");
        }
        if fields.dependencies {
            if let Some(deps) = table.get("dependencies").and_then(|v| v.as_table()) {
                for (name, value) in deps {
                    let dep = Dependency::load(name, value)?;
                    crate::manifest::dependency::insert_dependency(&mut out.dependencies, dep);
                }
            }
        }

        Ok(out)
    }

    fn parse_sources(
        table: &toml::value::Table,
        base_path: &Path,
        key: &str,
    ) -> Result<Vec<SourceFile>> {
        let mut out = Vec::new();
        if let Some(entries) = table.get(key).and_then(|v| v.as_array()) {
            for entry in entries {
                out.push(SourceFile::load(entry, base_path, key)?);
            }
        }
        Ok(out)
    }

    /// Field-wise merge: set fields union, sequence fields append in order,
    /// dependencies union with feature-merge on duplicates.
    pub fn merge(&mut self, other: &BaseFields) {
        self.sources.extend(other.sources.iter().cloned());
        self.modules.extend(other.modules.iter().cloned());
        self.merge_settings(other);
    }

    /// Merge everything except the sequence fields. Used when folding a
    /// dependency's settings into a dependent: include paths, flags, and
    /// defines propagate, but sources stay with the package that compiles
    /// them.
    pub fn merge_settings(&mut self, other: &BaseFields) {
        self.include.extend(other.include.iter().cloned());
        self.libs.extend(other.libs.iter().cloned());
        self.defines.extend(other.defines.iter().cloned());
        self.undefines.extend(other.undefines.iter().cloned());
        self.cflags.extend(other.cflags.iter().cloned());
        self.cxxflags.extend(other.cxxflags.iter().cloned());
        self.aflags.extend(other.aflags.iter().cloned());
        self.lflags.extend(other.lflags.iter().cloned());
        merge_dependency_maps(&mut self.dependencies, &other.dependencies);
    }

    /// Serialize the enabled, non-empty fields into a build-file table.
    /// Set fields come out sorted; sequence fields keep their order.
    pub fn serialize_into(&self, out: &mut toml_edit::Table, fields: FieldSet) {
        self.serialize_with_format(out, fields, true);
    }

    fn serialize_with_format(
        &self,
        out: &mut toml_edit::Table,
        fields: FieldSet,
        multiline_sources: bool,
    ) {
        if fields.modules && !self.modules.is_empty() {
            out.insert("modules", source_array(&self.modules, multiline_sources));
        }
        if fields.sources && !self.sources.is_empty() {
            out.insert("sources", source_array(&self.sources, multiline_sources));
        }
        maybe_set(out, "include", &self.include, fields.include);
        maybe_set(out, "defines", &self.defines, fields.defines);
        maybe_set(out, "undefines", &self.undefines, fields.undefines);
        maybe_set(out, "cflags", &self.cflags, fields.cflags);
        maybe_set(out, "cxxflags", &self.cxxflags, fields.cxxflags);
        maybe_set(out, "aflags", &self.aflags, fields.aflags);
        maybe_set(out, "lflags", &self.lflags, fields.lflags);
        maybe_set(out, "libs", &self.libs, fields.libs);
    }

    /// Serialize into an inline table (compiler/platform leaves). Inline
    /// tables cannot span lines, so source arrays stay compact here.
    pub fn serialize_inline(&self, fields: FieldSet) -> toml_edit::InlineTable {
        let mut table = toml_edit::Table::new();
        self.serialize_with_format(&mut table, fields, false);
        table.into_inline_table()
    }

    /// True when no enabled field carries a value.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
            && self.modules.is_empty()
            && self.include.is_empty()
            && self.libs.is_empty()
            && self.defines.is_empty()
            && self.undefines.is_empty()
            && self.cflags.is_empty()
            && self.cxxflags.is_empty()
            && self.aflags.is_empty()
            && self.lflags.is_empty()
            && self.dependencies.is_empty()
    }
}

/// Array of source entry inline tables, one per line when `multiline`.
fn source_array(sources: &[SourceFile], multiline: bool) -> toml_edit::Item {
    let mut arr = toml_edit::Array::new();
    for source in sources {
        let mut value = toml_edit::Value::InlineTable(source.to_inline_table());
        if multiline {
            value.decor_mut().set_prefix("\n    ");
        }
        arr.push_formatted(value);
    }
    if multiline {
        arr.set_trailing("\n");
        arr.set_trailing_comma(true);
    }
    toml_edit::Item::Value(toml_edit::Value::Array(arr))
}

fn maybe_set(out: &mut toml_edit::Table, key: &str, set: &BTreeSet<String>, enabled: bool) {
    if !enabled || set.is_empty() {
        return;
    }
    let mut arr = toml_edit::Array::new();
    for item in set {
        arr.push(item.as_str());
    }
    out.insert(key, toml_edit::Item::Value(toml_edit::Value::Array(arr)));
}

/// Per-compiler settings (`[<node>.compiler.<gcc|clang|msvc>]`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Compilers {
    pub clang: BaseFields,
    pub gcc: BaseFields,
    pub msvc: BaseFields,
}

impl Compilers {
    pub fn load(value: &toml::Value, base_path: &Path) -> Result<Compilers> {
        let mut out = Compilers::default();
        for (key, slot) in [
            ("clang", &mut out.clang),
            ("gcc", &mut out.gcc),
            ("msvc", &mut out.msvc),
        ] {
            if let Some(v) = value.get(key) {
                *slot = BaseFields::load(v, base_path, FieldSet::LEAF)?;
            }
        }
        Ok(out)
    }

    /// Field-wise merge on the matching key; other keys untouched.
    pub fn merge(&mut self, other: &Compilers) {
        self.clang.merge(&other.clang);
        self.gcc.merge(&other.gcc);
        self.msvc.merge(&other.msvc);
    }

    /// Serialize as a one-line `compiler = { ... }` entry, omitting empty
    /// sub-tables.
    pub fn serialize_into(&self, out: &mut toml_edit::Table) {
        let mut inline = toml_edit::InlineTable::new();
        for (key, config) in [("clang", &self.clang), ("gcc", &self.gcc), ("msvc", &self.msvc)] {
            if !config.is_empty() {
                inline.insert(
                    key,
                    toml_edit::Value::InlineTable(config.serialize_inline(FieldSet::LEAF)),
                );
            }
        }
        if !inline.is_empty() {
            out.insert("compiler", toml_edit::Item::Value(toml_edit::Value::InlineTable(inline)));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.clang.is_empty() && self.gcc.is_empty() && self.msvc.is_empty()
    }
}

/// Per-platform settings (`[<node>.platform.<windows|linux|apple>]`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Platforms {
    pub windows: BaseFields,
    pub linux: BaseFields,
    pub apple: BaseFields,
}

impl Platforms {
    pub fn load(value: &toml::Value, base_path: &Path) -> Result<Platforms> {
        let mut out = Platforms::default();
        for (key, slot) in [
            ("windows", &mut out.windows),
            ("linux", &mut out.linux),
            ("apple", &mut out.apple),
        ] {
            if let Some(v) = value.get(key) {
                *slot = BaseFields::load(v, base_path, FieldSet::LEAF)?;
            }
        }
        Ok(out)
    }

    pub fn merge(&mut self, other: &Platforms) {
        self.windows.merge(&other.windows);
        self.linux.merge(&other.linux);
        self.apple.merge(&other.apple);
    }

    pub fn serialize_into(&self, out: &mut toml_edit::Table) {
        let mut inline = toml_edit::InlineTable::new();
        for (key, config) in [
            ("apple", &self.apple),
            ("linux", &self.linux),
            ("windows", &self.windows),
        ] {
            if !config.is_empty() {
                inline.insert(
                    key,
                    toml_edit::Value::InlineTable(config.serialize_inline(FieldSet::LEAF)),
                );
            }
        }
        if !inline.is_empty() {
            out.insert("platform", toml_edit::Item::Value(toml_edit::Value::InlineTable(inline)));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty() && self.linux.is_empty() && self.apple.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_fields(toml: &str, fields: FieldSet) -> BaseFields {
        let value: toml::Value = toml.parse().unwrap();
        BaseFields::load(&value, Path::new("."), fields).unwrap()
    }

    #[test]
    fn test_source_forms_are_equivalent() {
        let plain: toml::Value = "x = \"src/a.cpp\"".parse().unwrap();
        let legacy: toml::Value = "x = \"src/a.cpp -O2 -Wall\"".parse().unwrap();
        let table: toml::Value = "x = { path = \"src/a.cpp\", cflags = [\"-O2\", \"-Wall\"] }"
            .parse()
            .unwrap();

        let base = Path::new(".");
        let a = SourceFile::load(plain.get("x").unwrap(), base, "sources").unwrap();
        let b = SourceFile::load(legacy.get("x").unwrap(), base, "sources").unwrap();
        let c = SourceFile::load(table.get("x").unwrap(), base, "sources").unwrap();

        assert_eq!(a.path, "src/a.cpp");
        assert!(a.cflags.is_empty());
        assert_eq!(b, c);
        assert_eq!(b.cflags, vec!["-O2", "-Wall"]);
    }

    #[test]
    fn test_paths_resolve_against_base() {
        let value: toml::Value = r#"
            sources = ["src/lib.cpp"]
            include = ["include"]
        "#
        .parse()
        .unwrap();
        let fields =
            BaseFields::load(&value, Path::new("deps/fmt/11.0"), FieldSet::ALL).unwrap();
        assert_eq!(fields.sources[0].path, "deps/fmt/11.0/src/lib.cpp");
        assert!(fields.include.contains("deps/fmt/11.0/include"));
    }

    #[test]
    fn test_defines_and_undefines_load_separately() {
        let fields = load_fields(
            r#"
            defines = ["A", "B"]
            undefines = ["C"]
            "#,
            FieldSet::ALL,
        );
        assert_eq!(fields.defines.len(), 2);
        assert!(fields.defines.contains("A"));
        assert_eq!(fields.undefines.len(), 1);
        assert!(fields.undefines.contains("C"));
    }

    #[test]
    fn test_disabled_fields_are_not_read() {
        let fields = load_fields(
            r#"
            cflags = ["-O2"]

            [dependencies]
            fmt = "1.0"
            "#,
            FieldSet::LIBRARY,
        );
        assert!(fields.cflags.contains("-O2"));
        assert!(fields.dependencies.is_empty());
    }

    #[test]
    fn test_merge_set_union_and_sequence_append() {
        let mut a = load_fields(
            r#"
            sources = ["a.cpp"]
            cflags = ["-O2", "-Wall"]
            "#,
            FieldSet::ALL,
        );
        let b = load_fields(
            r#"
            sources = ["b.cpp"]
            cflags = ["-Wall", "-g"]
            "#,
            FieldSet::ALL,
        );
        a.merge(&b);

        assert_eq!(a.cflags.len(), 3);
        assert_eq!(
            a.sources.iter().map(|s| s.path.as_str()).collect::<Vec<_>>(),
            vec!["a.cpp", "b.cpp"]
        );
    }

    #[test]
    fn test_merge_is_associative_on_sets() {
        let a = load_fields("cflags = [\"-a\"]", FieldSet::ALL);
        let b = load_fields("cflags = [\"-b\"]", FieldSet::ALL);
        let c = load_fields("cflags = [\"-c\"]", FieldSet::ALL);

        let mut left = a.clone();
        let mut bc = b.clone();
        bc.merge(&c);
        left.merge(&bc);

        let mut right = a.clone();
        right.merge(&b);
        right.merge(&c);

        assert_eq!(left.cflags, right.cflags);
    }

    #[test]
    fn test_compilers_merge_per_key() {
        let value: toml::Value = r#"
            [gcc]
            cflags = ["-fconcepts"]
        "#
        .parse()
        .unwrap();
        let mut a = Compilers::load(&value, Path::new(".")).unwrap();

        let value: toml::Value = r#"
            [gcc]
            cflags = ["-fmodules-ts"]
            [msvc]
            cflags = ["/bigobj"]
        "#
        .parse()
        .unwrap();
        let b = Compilers::load(&value, Path::new(".")).unwrap();

        a.merge(&b);
        assert_eq!(a.gcc.cflags.len(), 2);
        assert_eq!(a.msvc.cflags.len(), 1);
        assert!(a.clang.is_empty());
    }

    #[test]
    fn test_serialize_skips_empty_fields() {
        let fields = load_fields("cflags = [\"-O2\"]", FieldSet::ALL);
        let mut table = toml_edit::Table::new();
        fields.serialize_into(&mut table, FieldSet::ALL);
        assert!(table.contains_key("cflags"));
        assert!(!table.contains_key("defines"));
        assert!(!table.contains_key("sources"));
    }
}
