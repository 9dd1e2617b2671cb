//! Lock artifact emission.
//!
//! Two artifacts capture a resolution: the Cargo-style `muuk.lock`
//! (pinned packages, for fetching and review) and the build-plan cache
//! `muuk.lock.toml` (fully-merged effective settings, for the build-plan
//! compiler). Emission is deterministic: identical inputs produce
//! byte-identical files.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::Result;

use crate::lockgen::LockGenerator;
use crate::util::fs::{to_forward_slash, write_string};

/// Header of the Cargo-style lockfile.
const LOCK_HEADER: &str = "# This file is automatically @generated by Muuk.\n";

impl LockGenerator {
    /// Write the Cargo-style `muuk.lock` and the `deps/.gitignore`
    /// companion.
    pub fn write_lockfile(&self, output_path: &Path) -> Result<()> {
        let mut out = String::new();
        out.push_str(LOCK_HEADER);
        out.push('\n');

        for (name, version) in &self.resolved_order {
            if self.is_base(name, version) {
                continue;
            }
            let Some(package) = self.find_package(name, version) else {
                continue;
            };
            let package = package.borrow();

            out.push_str("[[package]]\n");
            writeln!(out, "name = \"{name}\"").unwrap();
            writeln!(out, "version = \"{version}\"").unwrap();

            let record = self
                .dependencies
                .get(name)
                .and_then(|versions| versions.get(version))
                .map(|handle| handle.borrow().clone());

            let source = match &record {
                Some(dep) if !dep.path.is_empty() => Some(format!("path+{}", dep.path)),
                Some(dep) if !dep.git_url.is_empty() => Some(format!("git+{}", dep.git_url)),
                _ => package.source.to_lock_string(),
            };
            match source {
                Some(source) => writeln!(out, "source = \"{source}\"").unwrap(),
                None => tracing::warn!("no source or path found for package `{name}`"),
            }

            if let Some(dep) = &record {
                if !dep.enabled_features.is_empty() {
                    let features: Vec<String> = dep
                        .enabled_features
                        .iter()
                        .map(|f| format!("\"{f}\""))
                        .collect();
                    writeln!(out, "features = [{}]", features.join(", ")).unwrap();
                }
            }

            if !package.dependencies.is_empty() {
                out.push_str("dependencies = [\n");
                for (dep_name, versions) in &package.dependencies {
                    for dep_version in versions.keys() {
                        writeln!(
                            out,
                            "  {{ name = \"{dep_name}\", version = \"{dep_version}\" }},"
                        )
                        .unwrap();
                    }
                }
                out.push_str("]\n");
            }

            out.push('\n');
        }

        write_string(output_path, &out)?;
        self.write_gitignore()?;

        tracing::info!("wrote lockfile to {}", output_path.display());
        Ok(())
    }

    /// `deps/.gitignore`: ignore everything except each dependency's
    /// pinned `muuk.toml`.
    fn write_gitignore(&self) -> Result<()> {
        let mut out = String::from("/*\n\n");

        for (name, version) in &self.resolved_order {
            if self.is_base(name, version) || self.find_package(name, version).is_none() {
                continue;
            }
            writeln!(out, "!/{name}").unwrap();
            writeln!(out, "/{name}/*").unwrap();
            writeln!(out, "!/{name}/{version}").unwrap();
            writeln!(out, "/{name}/{version}/*").unwrap();
            writeln!(out, "!/{name}/{version}/muuk.toml").unwrap();
            out.push('\n');
        }

        write_string(&self.base_path.join("deps").join(".gitignore"), &out)
    }

    /// Write the build-plan cache `muuk.lock.toml`.
    pub fn write_cache(&self, output_path: &Path) -> Result<()> {
        let mut doc = toml_edit::DocumentMut::new();

        let mut libraries = toml_edit::ArrayOfTables::new();
        for (name, version) in &self.resolved_order {
            let Some(package) = self.find_package(name, version) else {
                continue;
            };
            let package = package.borrow();
            let path = to_forward_slash(package.base_path.to_string_lossy());
            libraries.push(
                package
                    .library
                    .serialize(&path, &package.compilers, &package.platforms),
            );
            tracing::debug!("wrote package '{}' to the lock cache", name);
        }
        doc.insert("library", toml_edit::Item::ArrayOfTables(libraries));

        let mut externals = toml_edit::ArrayOfTables::new();
        for (name, version) in &self.resolved_order {
            let Some(package) = self.find_package(name, version) else {
                continue;
            };
            for external in &package.borrow().externals {
                externals.push(external.serialize());
            }
        }
        if !externals.is_empty() {
            doc.insert("external", toml_edit::Item::ArrayOfTables(externals));
        }

        let base_version = self
            .base_package
            .as_ref()
            .map(|(_, version)| version.clone())
            .unwrap_or_default();
        let mut builds = toml_edit::ArrayOfTables::new();
        for build in self.builds.values() {
            builds.push(build.serialize(&base_version));
        }
        doc.insert("build", toml_edit::Item::ArrayOfTables(builds));

        if !self.profiles.is_empty() {
            let mut profile_root = toml_edit::Table::new();
            profile_root.set_implicit(true);
            for (profile_name, profile) in &self.profiles {
                profile_root.insert(profile_name, toml_edit::Item::Table(profile.serialize()));
            }
            doc.insert("profile", toml_edit::Item::Table(profile_root));
        }

        write_string(output_path, &doc.to_string())?;
        tracing::info!("wrote build-plan cache to {}", output_path.display());
        Ok(())
    }
}
