//! Dependency resolution and lockfile generation.
//!
//! [`LockGenerator`] parses the base `muuk.toml`, resolves the transitive
//! dependency graph out of `deps/`, unifies features, collapses settings
//! through the merge algebra, and emits the two lock artifacts: the
//! Cargo-style `muuk.lock` and the build-plan cache `muuk.lock.toml`.

mod encode;
mod resolve;

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{anyhow, Context, Result};
use petgraph::graph::DiGraph;

use crate::core::CxxStandard;
use crate::manifest::dependency::SharedDependency;
use crate::manifest::{self, Build, Dependency, Package, Profile, Source};

/// Shared handle to a resolved package. Every citing edge observes the
/// same instance.
pub type SharedPackage = Rc<RefCell<Package>>;

/// Resolver state and lock emitter.
#[derive(Debug)]
pub struct LockGenerator {
    /// Project root (the directory holding the base `muuk.toml`).
    base_path: PathBuf,

    /// `name -> version -> package`, one instance per identity.
    resolved_packages: BTreeMap<String, BTreeMap<String, SharedPackage>>,

    /// The deduplicated dependency registry: `name -> version -> handle`.
    dependencies: BTreeMap<String, BTreeMap<String, SharedDependency>>,

    /// Package names already resolved (cycle short-circuit).
    visited: BTreeSet<String>,

    /// Build names already resolved.
    visited_builds: BTreeSet<String>,

    /// Post-order append of resolved `(name, version)` pairs; drives
    /// deterministic emission.
    resolved_order: Vec<(String, String)>,

    /// The base manifest's `[[build]]` targets.
    builds: BTreeMap<String, Build>,

    /// Identity of the base package.
    base_package: Option<(String, String)>,

    /// Effective C++ standard; monotonically raised by dependencies.
    base_cxx_standard: CxxStandard,

    /// Resolved profiles (inheritance already folded).
    profiles: BTreeMap<String, Profile>,
}

impl LockGenerator {
    pub fn new(base_path: impl Into<PathBuf>) -> LockGenerator {
        LockGenerator {
            base_path: base_path.into(),
            resolved_packages: BTreeMap::new(),
            dependencies: BTreeMap::new(),
            visited: BTreeSet::new(),
            visited_builds: BTreeSet::new(),
            resolved_order: Vec::new(),
            builds: BTreeMap::new(),
            base_package: None,
            base_cxx_standard: CxxStandard::Unknown,
            profiles: BTreeMap::new(),
        }
    }

    /// Construct a generator and run the full resolution pipeline.
    pub fn create(base_path: impl Into<PathBuf>) -> Result<LockGenerator> {
        let mut generator = LockGenerator::new(base_path);
        generator.load()?;
        Ok(generator)
    }

    /// The effective C++ standard after resolution.
    pub fn base_cxx_standard(&self) -> CxxStandard {
        self.base_cxx_standard
    }

    /// Resolved profiles by name.
    pub fn profiles(&self) -> &BTreeMap<String, Profile> {
        &self.profiles
    }

    /// The full resolution pipeline.
    pub fn load(&mut self) -> Result<()> {
        tracing::info!("generating lock data for {}", self.base_path.display());

        let manifest_path = self.base_path.join(manifest::MUUK_TOML);
        let base_data = manifest::load_manifest(&manifest_path)
            .with_context(|| "failed to load base manifest")?;

        self.parse_muuk_toml(&base_data, &manifest_path, true)?;

        let (base_name, base_version) = self
            .base_package
            .clone()
            .ok_or_else(|| anyhow!("base package was not registered"))?;

        // A dependency record standing for the base package itself; builds
        // depend on it implicitly.
        let base_source = self
            .find_package(&base_name, &base_version)
            .map(|p| p.borrow().source.clone())
            .unwrap_or_default();
        let base_dep = Dependency {
            name: base_name.clone(),
            version: base_version.clone(),
            git_url: match &base_source {
                Source::Git(url) => url.clone(),
                _ => String::new(),
            },
            ..Default::default()
        };

        self.resolve_dependencies(&base_name, &base_version, None)?;

        for build_name in self.builds.keys().cloned().collect::<Vec<_>>() {
            self.resolve_build_dependencies(&build_name)?;
        }

        self.apply_features()?;

        let mut merged = BTreeSet::new();
        self.merge_resolved_dependencies(&base_name, &base_version, &mut merged);

        let base_dep_handle = self.register_dependency(base_dep);
        for build_name in self.builds.keys().cloned().collect::<Vec<_>>() {
            self.merge_build_dependencies(&build_name, &base_dep_handle)?;
        }

        self.propagate_profiles();

        Ok(())
    }

    /// Parse one `muuk.toml` into a registered [`Package`].
    pub(crate) fn parse_muuk_toml(
        &mut self,
        data: &toml::Value,
        path: &Path,
        is_base: bool,
    ) -> Result<Package> {
        let mut package = Package::from_toml(data, path)?;
        tracing::info!(
            "parsing package: {} (version: {}) from `{}`",
            package.name,
            package.version,
            path.display()
        );

        if let Some(deps) = data.get("dependencies").and_then(|v| v.as_table()) {
            for (dep_name, dep_value) in deps {
                let dep = Dependency::load(dep_name, dep_value)?;
                let handle = self.register_dependency(dep);
                let (name, version) = {
                    let dep = handle.borrow();
                    (dep.name.clone(), dep.version.clone())
                };
                package
                    .dependencies
                    .entry(name.clone())
                    .or_default()
                    .insert(version.clone(), handle.clone());
                package
                    .all_dependencies
                    .insert((name, version), handle);
            }
        }

        if is_base {
            self.base_cxx_standard = package.cxx_standard;
        } else if package.cxx_standard > self.base_cxx_standard {
            tracing::warn!(
                "dependency '{}' (v{}) requires C++ standard {}, newer than the project's {}. \
                 Upgrading the effective standard to {}.",
                package.name,
                package.version,
                package.cxx_standard,
                self.base_cxx_standard,
                package.cxx_standard
            );
            self.base_cxx_standard = package.cxx_standard;
        }

        if is_base {
            self.parse_profiles(data)?;
            self.base_package = Some((package.name.clone(), package.version.clone()));

            if let Some(entries) = data.get("build").and_then(|v| v.as_array()) {
                for entry in entries {
                    let build_name = entry
                        .get("name")
                        .and_then(|v| v.as_str())
                        .ok_or_else(|| anyhow!("[[build]] entry is missing `name`"))?;
                    let build = Build::load(build_name, entry, &self.base_path)?;
                    self.builds.insert(build_name.to_string(), build);
                }
            }
        }

        let shared = Rc::new(RefCell::new(package));
        let registered = shared.borrow().clone();
        self.resolved_packages
            .entry(registered.name.clone())
            .or_default()
            .insert(registered.version.clone(), shared);

        Ok(registered)
    }

    /// Intern a dependency record, unioning features into an existing
    /// entry for the same `(name, version)`.
    pub(crate) fn register_dependency(&mut self, dep: Dependency) -> SharedDependency {
        let versions = self.dependencies.entry(dep.name.clone()).or_default();
        match versions.get(&dep.version) {
            Some(existing) => {
                {
                    let mut record = existing.borrow_mut();
                    record
                        .enabled_features
                        .extend(dep.enabled_features.iter().cloned());
                    if record.git_url.is_empty() {
                        record.git_url = dep.git_url;
                    }
                    if record.path.is_empty() {
                        record.path = dep.path;
                    }
                }
                existing.clone()
            }
            None => {
                let handle = Rc::new(RefCell::new(dep.clone()));
                versions.insert(dep.version.clone(), handle.clone());
                handle
            }
        }
    }

    pub(crate) fn find_package(&self, name: &str, version: &str) -> Option<SharedPackage> {
        self.resolved_packages
            .get(name)
            .and_then(|versions| versions.get(version))
            .cloned()
    }

    fn is_base(&self, name: &str, version: &str) -> bool {
        self.base_package
            .as_ref()
            .is_some_and(|(n, v)| n == name && v == version)
    }

    /// Two-phase profile resolution: load every profile literally, then
    /// fold inherited settings along a topological order of the
    /// inheritance DAG. Unknown inherits warn and are skipped; a cycle is
    /// fatal.
    fn parse_profiles(&mut self, data: &toml::Value) -> Result<()> {
        let Some(table) = data.get("profile").and_then(|v| v.as_table()) else {
            return Ok(());
        };

        for (name, value) in table {
            let profile = Profile::load(name, value, &self.base_path)?;
            self.profiles.insert(name.clone(), profile);
        }

        let mut graph = DiGraph::<String, ()>::new();
        let mut indices = BTreeMap::new();
        for name in self.profiles.keys() {
            indices.insert(name.clone(), graph.add_node(name.clone()));
        }
        for (name, profile) in &self.profiles {
            for parent in &profile.inherits {
                if parent == name {
                    return Err(anyhow!("profile '{name}' inherits itself"));
                }
                match indices.get(parent) {
                    Some(&parent_index) => {
                        graph.add_edge(parent_index, indices[name], ());
                    }
                    None => tracing::warn!(
                        "profile '{}' inherits unknown profile '{}'; skipping that inherit",
                        name,
                        parent
                    ),
                }
            }
        }

        let order = petgraph::algo::toposort(&graph, None).map_err(|_| {
            let members: Vec<String> = petgraph::algo::tarjan_scc(&graph)
                .into_iter()
                .find(|scc| scc.len() > 1)
                .map(|scc| scc.into_iter().map(|i| graph[i].clone()).collect())
                .unwrap_or_default();
            anyhow!("cycle in profile inheritance: {}", members.join(" -> "))
        })?;

        for node in order {
            let name = graph[node].clone();
            let parents = self.profiles[&name].inherits.clone();
            for parent in parents {
                if let Some(parent_profile) = self.profiles.get(&parent).cloned() {
                    if let Some(profile) = self.profiles.get_mut(&name) {
                        profile.merge_from(&parent_profile);
                    }
                }
            }
        }

        Ok(())
    }

    /// Feature unification: apply requested features on every cited
    /// dependency, then each package's own default features. Feature
    /// dependencies must be declared by the owning package; they are
    /// resolved if the registry has not seen them yet.
    fn apply_features(&mut self) -> Result<()> {
        // Requested features, from the deduplicated registry.
        let requests: Vec<(String, String, BTreeSet<String>)> = self
            .dependencies
            .values()
            .flat_map(|versions| versions.values())
            .map(|handle| {
                let dep = handle.borrow();
                (dep.name.clone(), dep.version.clone(), dep.enabled_features.clone())
            })
            .filter(|(_, _, features)| !features.is_empty())
            .collect();

        for (name, version, features) in requests {
            self.enable_package_features(&name, &version, &features)?;
        }

        // Default features apply to every resolved package.
        let defaults: Vec<(String, String, BTreeSet<String>)> = self
            .resolved_packages
            .values()
            .flat_map(|versions| versions.values())
            .map(|p| {
                let p = p.borrow();
                (p.name.clone(), p.version.clone(), p.default_features.clone())
            })
            .filter(|(_, _, features)| !features.is_empty())
            .collect();

        for (name, version, features) in defaults {
            tracing::info!("applying default features for package '{}'", name);
            self.enable_package_features(&name, &version, &features)?;
        }

        Ok(())
    }

    fn enable_package_features(
        &mut self,
        name: &str,
        version: &str,
        features: &BTreeSet<String>,
    ) -> Result<()> {
        let Some(package) = self.find_package(name, version) else {
            return Ok(());
        };

        let requested = package.borrow_mut().enable_features(features);
        for dep_name in requested {
            // The feature names a dependency the package must declare.
            let declared: Option<(String, String)> = package
                .borrow()
                .dependencies
                .get(&dep_name)
                .and_then(|versions| versions.keys().next().cloned())
                .map(|v| (dep_name.clone(), v));

            match declared {
                Some((dep_name, dep_version)) => {
                    self.resolve_dependencies(&dep_name, &dep_version, None)?;
                }
                None => tracing::warn!(
                    "feature of package '{}' requests undeclared dependency '{}'; skipping",
                    name,
                    dep_name
                ),
            }
        }
        Ok(())
    }

    /// Resolve a build's declared dependencies and collect the handles.
    fn resolve_build_dependencies(&mut self, build_name: &str) -> Result<()> {
        if self.visited_builds.contains(build_name) {
            return Ok(());
        }
        self.visited_builds.insert(build_name.to_string());
        tracing::info!("resolving dependencies for build target '{}'", build_name);

        let declared: Vec<Dependency> = self
            .builds
            .get(build_name)
            .ok_or_else(|| anyhow!("build target '{build_name}' not found"))?
            .base
            .dependencies
            .values()
            .flat_map(|versions| versions.values().cloned())
            .collect();

        for dep in declared {
            let handle = self.register_dependency(dep);
            let (dep_name, dep_version, dep_path, system) = {
                let dep = handle.borrow();
                (
                    dep.name.clone(),
                    dep.version.clone(),
                    dep.path.clone(),
                    dep.system,
                )
            };

            if !system {
                self.resolve_dependencies(
                    &dep_name,
                    &dep_version,
                    (!dep_path.is_empty()).then_some(dep_path.as_str()),
                )
                .with_context(|| {
                    format!("failed to resolve dependency '{dep_name}' for build '{build_name}'")
                })?;
            }

            if let Some(build) = self.builds.get_mut(build_name) {
                build
                    .all_dependencies
                    .insert((dep_name, dep_version), handle);
            }
        }

        Ok(())
    }

    /// Fold the base package and every transitively resolved package into
    /// a build's effective settings.
    fn merge_build_dependencies(
        &mut self,
        build_name: &str,
        base_dep: &SharedDependency,
    ) -> Result<()> {
        let (base_name, base_version) = self
            .base_package
            .clone()
            .ok_or_else(|| anyhow!("no base package"))?;

        tracing::info!("merging dependencies for build '{}'", build_name);

        let mut build = self
            .builds
            .remove(build_name)
            .ok_or_else(|| anyhow!("build target '{build_name}' not found"))?;

        build
            .all_dependencies
            .insert((base_name.clone(), base_version.clone()), base_dep.clone());
        if let Some(base_package) = self.find_package(&base_name, &base_version) {
            build.merge_package(&base_package.borrow());
        }

        // Merging widens `all_dependencies`; iterate to a fixed point over
        // the transitively reachable set.
        loop {
            let pending: Vec<(String, String)> = build
                .all_dependencies
                .keys()
                .filter(|(name, version)| !self.is_base(name, version))
                .cloned()
                .collect();

            let before = build.all_dependencies.len();
            for (dep_name, dep_version) in pending {
                match self.find_package(&dep_name, &dep_version) {
                    Some(package) => build.merge_package(&package.borrow()),
                    None => {
                        let system = self
                            .dependencies
                            .get(&dep_name)
                            .and_then(|versions| versions.get(&dep_version))
                            .is_some_and(|d| d.borrow().system);
                        if !system {
                            tracing::warn!(
                                "resolved package '{}' (v{}) not found while merging build '{}'",
                                dep_name,
                                dep_version,
                                build_name
                            );
                        }
                    }
                }
            }
            if build.all_dependencies.len() == before {
                break;
            }
        }

        self.builds.insert(build_name.to_string(), build);
        Ok(())
    }

    /// Starting from each build's profile set, descend through the
    /// dependency graph inserting those profiles into every reachable
    /// library.
    fn propagate_profiles(&mut self) {
        tracing::info!("propagating profiles from builds to libraries");

        let starts: Vec<(BTreeSet<String>, Vec<(String, String)>)> = self
            .builds
            .values()
            .map(|build| {
                (
                    build.profiles.clone(),
                    build.all_dependencies.keys().cloned().collect(),
                )
            })
            .collect();

        for (profiles, deps) in starts {
            if profiles.is_empty() {
                continue;
            }
            let mut seen = BTreeSet::new();
            for (name, version) in deps {
                self.propagate_profiles_downward(&name, &version, &profiles, &mut seen);
            }
        }
    }

    fn propagate_profiles_downward(
        &mut self,
        name: &str,
        version: &str,
        profiles: &BTreeSet<String>,
        seen: &mut BTreeSet<(String, String)>,
    ) {
        if !seen.insert((name.to_string(), version.to_string())) {
            return;
        }
        let Some(package) = self.find_package(name, version) else {
            return;
        };

        let children: Vec<(String, String)> = {
            let mut package = package.borrow_mut();
            package
                .library
                .profiles
                .extend(profiles.iter().cloned());
            package
                .dependencies
                .iter()
                .flat_map(|(n, versions)| versions.keys().map(move |v| (n.clone(), v.clone())))
                .collect()
        };

        for (dep_name, dep_version) in children {
            self.propagate_profiles_downward(&dep_name, &dep_version, profiles, seen);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_project(files: &[(&str, &str)]) -> TempDir {
        let tmp = TempDir::new().unwrap();
        for (path, content) in files {
            let full = tmp.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        }
        tmp
    }

    #[test]
    fn test_minimal_library_resolution() {
        let tmp = write_project(&[(
            "muuk.toml",
            r#"
            [package]
            name = "a"
            version = "0.1"

            [library]
            sources = ["src/a.cpp"]
            "#,
        )]);

        let generator = LockGenerator::create(tmp.path()).unwrap();
        assert_eq!(
            generator.resolved_order,
            vec![("a".to_string(), "0.1".to_string())]
        );
        assert!(generator.builds.is_empty());
    }

    #[test]
    fn test_transitive_resolution_and_merge() {
        let tmp = write_project(&[
            (
                "muuk.toml",
                r#"
                [package]
                name = "app"
                version = "0.1"
                cxx_standard = "17"

                [dependencies]
                mid = "1.0"

                [[build]]
                name = "app"
                sources = ["src/main.cpp"]
                dependencies = [{ name = "mid", version = "1.0" }]
                "#,
            ),
            (
                "deps/mid/1.0/muuk.toml",
                r#"
                [package]
                name = "mid"
                version = "1.0"
                cxx_standard = "20"

                [dependencies]
                leaf = "2.0"

                [library]
                sources = ["src/mid.cpp"]
                defines = ["MID"]
                "#,
            ),
            (
                "deps/leaf/2.0/muuk.toml",
                r#"
                [package]
                name = "leaf"
                version = "2.0"

                [library]
                include = ["include"]
                defines = ["LEAF"]
                "#,
            ),
        ]);

        let generator = LockGenerator::create(tmp.path()).unwrap();

        // Post-order: leaf before mid before app.
        let order: Vec<&str> = generator
            .resolved_order
            .iter()
            .map(|(n, _)| n.as_str())
            .collect();
        assert_eq!(order, vec!["leaf", "mid", "app"]);

        // A dependency's newer standard upgrades the project's.
        assert_eq!(generator.base_cxx_standard(), CxxStandard::Cpp20);

        // Transitive settings collapsed into the base package.
        let base = generator.find_package("app", "0.1").unwrap();
        assert!(base.borrow().library.base.defines.contains("MID"));
        assert!(base.borrow().library.base.defines.contains("LEAF"));

        // The build sees the whole closure plus the base package.
        let build = &generator.builds["app"];
        assert_eq!(build.all_dependencies.len(), 3);
        assert!(build.base.defines.contains("LEAF"));
    }

    #[test]
    fn test_identity_mismatch_is_fatal() {
        let tmp = write_project(&[
            (
                "muuk.toml",
                r#"
                [package]
                name = "app"
                version = "0.1"

                [dependencies]
                lib = "1.0"
                "#,
            ),
            (
                "deps/lib/1.0/muuk.toml",
                r#"
                [package]
                name = "other"
                version = "9.9"
                "#,
            ),
        ]);

        let err = LockGenerator::create(tmp.path()).unwrap_err();
        assert!(format!("{err:#}").contains("mismatch"));
    }

    #[test]
    fn test_shared_dependency_identity() {
        // Two packages citing fmt@1.0 share one record; feature requests
        // union.
        let tmp = write_project(&[
            (
                "muuk.toml",
                r#"
                [package]
                name = "app"
                version = "0.1"

                [dependencies]
                a = "1.0"
                b = "1.0"
                fmt = { version = "1.0", features = ["alpha"] }
                "#,
            ),
            (
                "deps/a/1.0/muuk.toml",
                r#"
                [package]
                name = "a"
                version = "1.0"

                [dependencies]
                fmt = { version = "1.0", features = ["beta"] }
                "#,
            ),
            (
                "deps/b/1.0/muuk.toml",
                r#"
                [package]
                name = "b"
                version = "1.0"
                "#,
            ),
            (
                "deps/fmt/1.0/muuk.toml",
                r#"
                [package]
                name = "fmt"
                version = "1.0"

                [features]
                alpha = ["D:ALPHA"]
                beta = ["D:BETA"]
                "#,
            ),
        ]);

        let generator = LockGenerator::create(tmp.path()).unwrap();

        let record = generator.dependencies["fmt"]["1.0"].borrow();
        assert!(record.enabled_features.contains("alpha"));
        assert!(record.enabled_features.contains("beta"));
        drop(record);

        // Both features activated on the single fmt instance.
        let fmt = generator.find_package("fmt", "1.0").unwrap();
        assert!(fmt.borrow().library.base.defines.contains("ALPHA"));
        assert!(fmt.borrow().library.base.defines.contains("BETA"));
    }

    #[test]
    fn test_feature_activates_declared_dependency() {
        let tmp = write_project(&[
            (
                "muuk.toml",
                r#"
                [package]
                name = "app"
                version = "0.1"

                [dependencies]
                p = { version = "1.0", features = ["fast"] }
                "#,
            ),
            (
                "deps/p/1.0/muuk.toml",
                r#"
                [package]
                name = "p"
                version = "1.0"

                [dependencies]
                accel = "0.5"

                [features]
                fast = ["D:FAST", "dep:accel"]
                "#,
            ),
            (
                "deps/accel/0.5/muuk.toml",
                r#"
                [package]
                name = "accel"
                version = "0.5"
                "#,
            ),
        ]);

        let generator = LockGenerator::create(tmp.path()).unwrap();
        let p = generator.find_package("p", "1.0").unwrap();
        assert!(p.borrow().library.base.defines.contains("FAST"));
        assert!(p.borrow().all_dependencies.contains_key(&(
            "accel".to_string(),
            "0.5".to_string()
        )));
        assert!(generator.find_package("accel", "0.5").is_some());
    }

    #[test]
    fn test_profile_inheritance_superset() {
        let tmp = write_project(&[(
            "muuk.toml",
            r#"
            [package]
            name = "app"
            version = "0.1"

            [profile.release]
            cflags = ["-O3"]
            defines = ["NDEBUG"]

            [profile.release-lto]
            inherits = ["release"]
            cflags = ["-flto"]
            "#,
        )]);

        let generator = LockGenerator::create(tmp.path()).unwrap();
        let lto = &generator.profiles()["release-lto"];
        let release = &generator.profiles()["release"];

        for flag in &release.base.cflags {
            assert!(lto.base.cflags.contains(flag));
        }
        assert!(lto.base.cflags.contains("-flto"));
    }

    #[test]
    fn test_profile_cycle_is_fatal() {
        let tmp = write_project(&[(
            "muuk.toml",
            r#"
            [package]
            name = "app"
            version = "0.1"

            [profile.a]
            inherits = ["b"]

            [profile.b]
            inherits = ["a"]
            "#,
        )]);

        let err = LockGenerator::create(tmp.path()).unwrap_err();
        assert!(format!("{err:#}").contains("cycle in profile inheritance"));
    }

    #[test]
    fn test_unknown_inherit_is_skipped() {
        let tmp = write_project(&[(
            "muuk.toml",
            r#"
            [package]
            name = "app"
            version = "0.1"

            [profile.debug]
            inherits = ["missing"]
            cflags = ["-g"]
            "#,
        )]);

        let generator = LockGenerator::create(tmp.path()).unwrap();
        assert!(generator.profiles()["debug"].base.cflags.contains("-g"));
    }

    #[test]
    fn test_profiles_propagate_to_libraries() {
        let tmp = write_project(&[
            (
                "muuk.toml",
                r#"
                [package]
                name = "app"
                version = "0.1"

                [dependencies]
                lib = "1.0"

                [[build]]
                name = "app"
                profiles = ["debug", "release"]
                sources = ["src/main.cpp"]
                dependencies = [{ name = "lib", version = "1.0" }]
                "#,
            ),
            (
                "deps/lib/1.0/muuk.toml",
                r#"
                [package]
                name = "lib"
                version = "1.0"

                [dependencies]
                sub = "1.0"

                [library]
                sources = ["src/lib.cpp"]
                "#,
            ),
            (
                "deps/sub/1.0/muuk.toml",
                r#"
                [package]
                name = "sub"
                version = "1.0"

                [library]
                sources = ["src/sub.cpp"]
                "#,
            ),
        ]);

        let generator = LockGenerator::create(tmp.path()).unwrap();
        for (name, version) in [("lib", "1.0"), ("sub", "1.0")] {
            let package = generator.find_package(name, version).unwrap();
            let profiles = &package.borrow().library.profiles;
            assert!(profiles.contains("debug"), "{name} missing debug");
            assert!(profiles.contains("release"), "{name} missing release");
        }
    }

    #[test]
    fn test_self_dependency_is_skipped_with_warning() {
        let tmp = write_project(&[(
            "muuk.toml",
            r#"
            [package]
            name = "selfish"
            version = "0.1"

            [dependencies]
            selfish = "0.1"
            "#,
        )]);

        // Must terminate rather than recurse forever.
        let generator = LockGenerator::create(tmp.path()).unwrap();
        assert_eq!(generator.resolved_order.len(), 1);
    }
}
