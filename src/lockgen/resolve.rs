//! Recursive dependency resolution.

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{anyhow, Result};

use crate::error::Error;
use crate::lockgen::{LockGenerator, SharedPackage};
use crate::manifest::{self, MUUK_TOML};

impl LockGenerator {
    /// Depth-first resolution with a visited short-circuit.
    ///
    /// Looks the package up (parsing its manifest out of `deps/` or the
    /// given search path if unseen), recurses into its dependency edges,
    /// and appends the package to the resolved order post-order.
    pub(crate) fn resolve_dependencies(
        &mut self,
        package_name: &str,
        version: &str,
        search_path: Option<&str>,
    ) -> Result<()> {
        if self.visited.contains(package_name) {
            tracing::trace!("dependency '{}' already processed", package_name);
            return Ok(());
        }
        self.visited.insert(package_name.to_string());
        tracing::info!("resolving dependencies for: {}", package_name);

        let package = match self.find_package(package_name, version) {
            Some(package) => package,
            None => self.locate_and_parse_package(package_name, version, search_path)?,
        };

        let children: Vec<(String, String, bool, String)> = package
            .borrow()
            .dependencies
            .iter()
            .flat_map(|(name, versions)| {
                versions.iter().map(move |(version, dep)| {
                    let dep = dep.borrow();
                    (name.clone(), version.clone(), dep.system, dep.path.clone())
                })
            })
            .collect();

        for (dep_name, dep_version, system, dep_path) in children {
            if dep_name == package_name {
                tracing::warn!(
                    "circular dependency detected: '{}' depends on itself; skipping",
                    package_name
                );
                continue;
            }

            if system {
                self.resolve_system_dependency(&dep_name, &package);
                continue;
            }

            self.resolve_dependencies(
                &dep_name,
                &dep_version,
                (!dep_path.is_empty()).then_some(dep_path.as_str()),
            )?;
        }

        self.resolved_order
            .push((package_name.to_string(), version.to_string()));
        Ok(())
    }

    /// Parse a package's manifest from its search path or the dependency
    /// folder, enforcing that the parsed identity matches the requested
    /// one.
    fn locate_and_parse_package(
        &mut self,
        package_name: &str,
        version: &str,
        search_path: Option<&str>,
    ) -> Result<SharedPackage> {
        match search_path {
            Some(search_path) => {
                let mut manifest_path = PathBuf::from(search_path);
                if !search_path.ends_with(MUUK_TOML) {
                    manifest_path.push(MUUK_TOML);
                }
                if !manifest_path.exists() {
                    return Err(Error::file_not_found(manifest_path.display()).into());
                }

                let data = manifest::load_manifest(&manifest_path)?;
                self.parse_muuk_toml(&data, &manifest_path, false)?;

                self.find_package(package_name, version).ok_or_else(|| {
                    anyhow!(
                        "package '{}' not found after parsing '{}'",
                        package_name,
                        manifest_path.display()
                    )
                })
            }
            None => {
                let search_dir = self
                    .base_path
                    .join("deps")
                    .join(package_name)
                    .join(version);
                if !search_dir.exists() {
                    return Err(anyhow!(
                        "dependency '{}' version '{}' not found in '{}'",
                        package_name,
                        version,
                        search_dir.display()
                    ));
                }

                let manifest_path = search_dir.join(MUUK_TOML);
                if !manifest_path.exists() {
                    return Err(Error::manifest_not_found(manifest_path.display()).into());
                }

                let data = manifest::load_manifest(&manifest_path)?;

                let actual_name = data
                    .get("package")
                    .and_then(|p| p.get("name"))
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                let actual_version = data
                    .get("package")
                    .and_then(|p| p.get("version"))
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                if actual_name != package_name || actual_version != version {
                    return Err(anyhow!(
                        "mismatch in dependency at '{}': expected '{}@{}', found '{}@{}'",
                        manifest_path.display(),
                        package_name,
                        version,
                        actual_name,
                        actual_version
                    ));
                }

                self.parse_muuk_toml(&data, &manifest_path, false)?;

                self.find_package(package_name, version).ok_or_else(|| {
                    anyhow!(
                        "package '{}' not found after searching the dependency folder",
                        package_name
                    )
                })
            }
        }
    }

    /// A system dependency is satisfied by the ambient toolchain: no
    /// fetch, no manifest. A custom path contributes conventional
    /// `include/` and `lib/` subdirectories; declared lib names are linked
    /// as-is.
    pub(crate) fn resolve_system_dependency(&mut self, dep_name: &str, citing: &SharedPackage) {
        tracing::info!("resolving system dependency '{}'", dep_name);

        let record = self
            .dependencies
            .get(dep_name)
            .and_then(|versions| versions.values().next())
            .cloned();

        let Some(record) = record else {
            tracing::warn!("system dependency '{}' has no registry record", dep_name);
            return;
        };
        let record = record.borrow();

        let mut citing = citing.borrow_mut();

        if !record.path.is_empty() {
            let include_dir = PathBuf::from(&record.path).join("include");
            if include_dir.exists() {
                citing.library.base.include.insert(
                    crate::util::fs::to_forward_slash(include_dir.to_string_lossy()),
                );
            }
            let lib_dir = PathBuf::from(&record.path).join("lib");
            if lib_dir.exists() {
                citing
                    .library
                    .base
                    .lflags
                    .insert(format!("-L{}", crate::util::fs::to_forward_slash(lib_dir.to_string_lossy())));
            }
        }

        for lib in &record.libs {
            citing.library.base.libs.insert(lib.clone());
        }

        if record.path.is_empty() && record.libs.is_empty() {
            tracing::warn!(
                "system dependency '{}' declares neither a path nor libs; nothing to link",
                dep_name
            );
        }
    }

    /// Post-order settings collapse: each child is merged first, then the
    /// child's package merges into the parent.
    pub(crate) fn merge_resolved_dependencies(
        &mut self,
        package_name: &str,
        version: &str,
        merged: &mut BTreeSet<(String, String)>,
    ) {
        if !merged.insert((package_name.to_string(), version.to_string())) {
            return;
        }

        let Some(package) = self.find_package(package_name, version) else {
            tracing::warn!("package '{}' not found during merge", package_name);
            return;
        };

        let children: Vec<(String, String)> = package
            .borrow()
            .dependencies
            .iter()
            .flat_map(|(name, versions)| versions.keys().map(move |v| (name.clone(), v.clone())))
            .collect();

        for (dep_name, dep_version) in children {
            if dep_name == package_name {
                continue;
            }
            let Some(dep_package) = self.find_package(&dep_name, &dep_version) else {
                continue;
            };

            self.merge_resolved_dependencies(&dep_name, &dep_version, merged);

            tracing::info!("merging '{}' into '{}'", dep_name, package_name);
            package.borrow_mut().merge(&dep_package.borrow());
        }
    }
}
