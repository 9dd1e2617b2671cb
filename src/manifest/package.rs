//! The package node the resolver works with.
//!
//! A `Package` is one `(name, version)` identity: its manifest settings,
//! feature table, and dependency edges. Dependency records are shared
//! handles into the resolver's registry, so feature accumulation on a
//! record is observed by every citing package.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::core::{CxxStandard, LinkType};
use crate::error::{Error, Result};
use crate::manifest::base::{Compilers, Platforms};
use crate::manifest::dependency::SharedDependency;
use crate::manifest::library::{External, Library};

/// Where a package's content comes from.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Source {
    /// Fetched from a git repository.
    Git(String),

    /// A local directory.
    Path(String),

    /// The base package, or a package with no declared origin.
    #[default]
    None,
}

impl Source {
    /// Render for the Cargo-style lockfile (`git+<url>` / `path+<dir>`).
    pub fn to_lock_string(&self) -> Option<String> {
        match self {
            Source::Git(url) => Some(format!("git+{url}")),
            Source::Path(dir) => Some(format!("path+{dir}")),
            Source::None => None,
        }
    }
}

/// A named switch: enabling it unions defines/undefines into the owning
/// package's library config and requests the listed dependencies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Feature {
    pub defines: BTreeSet<String>,
    pub undefines: BTreeSet<String>,
    pub dependencies: BTreeSet<String>,
}

impl Feature {
    /// Parse one `[features]` entry.
    ///
    /// The list form uses prefixed strings (`"D:MACRO"`, `"U:MACRO"`,
    /// `"dep:name"`); the table form spells the same data out
    /// (`define = [...]`, `undefine = [...]`, `dependencies = [...]`).
    /// Both parse to the same value; the table form is canonical.
    pub fn load(name: &str, value: &toml::Value) -> Result<Feature> {
        let mut feature = Feature::default();

        if let Some(items) = value.as_array() {
            for item in items {
                let Some(entry) = item.as_str() else { continue };
                if let Some(define) = entry.strip_prefix("D:") {
                    feature.defines.insert(define.to_string());
                } else if let Some(undefine) = entry.strip_prefix("U:") {
                    feature.undefines.insert(undefine.to_string());
                } else if let Some(dep) = entry.strip_prefix("dep:") {
                    feature.dependencies.insert(dep.to_string());
                } else {
                    tracing::warn!("unrecognized feature syntax in '{}': {}", name, entry);
                }
            }
            return Ok(feature);
        }

        if let Some(table) = value.as_table() {
            for (key, slot) in [
                ("define", &mut feature.defines),
                ("undefine", &mut feature.undefines),
                ("dependencies", &mut feature.dependencies),
            ] {
                if let Some(items) = table.get(key).and_then(|v| v.as_array()) {
                    slot.extend(items.iter().filter_map(|v| v.as_str()).map(str::to_string));
                }
            }
            return Ok(feature);
        }

        Err(Error::type_mismatch(
            &format!("features.{name}"),
            "array or table",
            value.type_str(),
        ))
    }
}

/// One `(name, version)` package with its parsed manifest.
#[derive(Debug, Clone, Default)]
pub struct Package {
    pub name: String,
    pub version: String,

    /// Directory containing this package's `muuk.toml`.
    pub base_path: PathBuf,

    pub source: Source,
    pub cxx_standard: CxxStandard,

    /// Dependency edges, as shared registry handles.
    pub dependencies: crate::manifest::dependency::SharedDependencyMap,

    /// Flattened set of every dependency handle reachable from this
    /// package, keyed by `(name, version)`.
    pub all_dependencies: BTreeMap<(String, String), SharedDependency>,

    /// Features enabled automatically unless overridden.
    pub default_features: BTreeSet<String>,

    pub features: BTreeMap<String, Feature>,

    pub link_type: LinkType,

    /// `[compiler.*]` settings.
    pub compilers: Compilers,

    /// `[platform.*]` settings.
    pub platforms: Platforms,

    /// `[library]` settings.
    pub library: Library,

    /// `[[external]]` subprojects owned by this package.
    pub externals: Vec<External>,
}

impl Package {
    /// Build a package from a parsed manifest. Dependency edges are
    /// registered separately by the resolver so records stay shared.
    pub fn from_toml(data: &toml::Value, manifest_path: &Path) -> Result<Package> {
        let package_table = data
            .get("package")
            .and_then(|v| v.as_table())
            .ok_or_else(|| Error::required_key_missing("package"))?;

        let name = package_table
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::required_key_missing("package.name"))?
            .to_string();
        let version = package_table
            .get("version")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::required_key_missing("package.version"))?
            .to_string();

        let base_path = manifest_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
            .to_path_buf();

        let source = match package_table.get("git").and_then(|v| v.as_str()) {
            Some(url) => Source::Git(url.to_string()),
            None => Source::None,
        };

        let cxx_standard = package_table
            .get("cxx_standard")
            .and_then(|v| v.as_str())
            .map(CxxStandard::parse)
            .unwrap_or_default();

        let mut library = match data.get("library") {
            Some(v) => Library::load(&name, &version, &base_path, v)?,
            None => Library {
                name: name.clone(),
                version: version.clone(),
                ..Default::default()
            },
        };

        // Compiler/platform sub-trees may sit under [library] or at the top
        // level; both merge into the package-wide configs.
        let mut compilers = Compilers::default();
        let mut platforms = Platforms::default();
        let mut nodes = vec![data];
        if let Some(library_node) = data.get("library") {
            nodes.push(library_node);
        }
        for node in nodes {
            if let Some(v) = node.get("compiler") {
                compilers.merge(&Compilers::load(v, &base_path)?);
            }
            if let Some(v) = node.get("platform") {
                platforms.merge(&Platforms::load(v, &base_path)?);
            }
        }

        // Conditional lib entries ({ path, platform = ... } /
        // { path, compiler = ... }) route into the matching sub-tree.
        if let Some(entries) = data
            .get("library")
            .and_then(|v| v.get("libs"))
            .and_then(|v| v.as_array())
        {
            for entry in entries {
                let Some(table) = entry.as_table() else { continue };
                let Some(path) = table.get("path").and_then(|v| v.as_str()) else {
                    continue;
                };
                let lib = crate::util::fs::join_normalized(&base_path, path);
                if let Some(platform) = table.get("platform").and_then(|v| v.as_str()) {
                    match platform {
                        "windows" => platforms.windows.libs.insert(lib),
                        "linux" => platforms.linux.libs.insert(lib),
                        "apple" => platforms.apple.libs.insert(lib),
                        other => {
                            tracing::warn!("unknown platform '{}' in libs entry", other);
                            false
                        }
                    };
                } else if let Some(compiler) = table.get("compiler").and_then(|v| v.as_str()) {
                    match compiler {
                        "gcc" => compilers.gcc.libs.insert(lib),
                        "clang" => compilers.clang.libs.insert(lib),
                        "msvc" => compilers.msvc.libs.insert(lib),
                        other => {
                            tracing::warn!("unknown compiler '{}' in libs entry", other);
                            false
                        }
                    };
                }
            }
        }

        let mut externals = Vec::new();
        if let Some(entries) = data.get("external").and_then(|v| v.as_array()) {
            for entry in entries {
                let ext_name = entry
                    .get("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or(&name)
                    .to_string();
                let ext_version = entry
                    .get("version")
                    .and_then(|v| v.as_str())
                    .unwrap_or(&version)
                    .to_string();
                externals.push(External::load(&ext_name, &ext_version, &base_path, entry)?);
            }
        }

        let mut features = BTreeMap::new();
        let mut default_features = BTreeSet::new();
        if let Some(table) = data.get("features").and_then(|v| v.as_table()) {
            for (feature_name, value) in table {
                if feature_name == "default" {
                    if let Some(items) = value.as_array() {
                        default_features
                            .extend(items.iter().filter_map(|v| v.as_str()).map(str::to_string));
                    }
                    continue;
                }
                features.insert(feature_name.clone(), Feature::load(feature_name, value)?);
            }
        }

        let link_type = library.link_type;
        library.name = name.clone();
        library.version = version.clone();

        Ok(Package {
            name,
            version,
            base_path,
            source,
            cxx_standard,
            dependencies: BTreeMap::new(),
            all_dependencies: BTreeMap::new(),
            default_features,
            features,
            link_type,
            compilers,
            platforms,
            library,
            externals,
        })
    }

    /// Fold a resolved child package into this one: settings union up,
    /// compiler/platform trees merge per key, the dependency set widens.
    /// Sources stay with the child.
    pub fn merge(&mut self, child: &Package) {
        tracing::debug!("merging '{}' into '{}'", child.name, self.name);
        self.library.base.merge_settings(&child.library.base);
        self.compilers.merge(&child.compilers);
        self.platforms.merge(&child.platforms);
        for (key, dep) in &child.all_dependencies {
            self.all_dependencies
                .entry(key.clone())
                .or_insert_with(|| dep.clone());
        }
    }

    /// Enable a set of features: union their defines/undefines into the
    /// library config and return the names of dependencies the features
    /// request. Unknown features warn and are skipped.
    pub fn enable_features(&mut self, feature_set: &BTreeSet<String>) -> Vec<String> {
        let mut requested = Vec::new();
        for feature_name in feature_set {
            match self.features.get(feature_name) {
                Some(feature) => {
                    self.library
                        .base
                        .defines
                        .extend(feature.defines.iter().cloned());
                    self.library
                        .base
                        .undefines
                        .extend(feature.undefines.iter().cloned());
                    requested.extend(feature.dependencies.iter().cloned());
                    tracing::info!(
                        "enabled feature '{}' for package '{}'",
                        feature_name,
                        self.name
                    );
                }
                None => {
                    tracing::warn!(
                        "feature '{}' not found in package '{}'",
                        feature_name,
                        self.name
                    );
                }
            }
        }
        requested
    }
}
