//! The build manager: registries of typed targets for one build run.

use std::collections::{BTreeMap, BTreeSet};

use crate::builder::targets::{
    ArchiveTarget, CompilationFlags, CompilationTarget, CompilationUnitType, ExternalTarget,
    LinkTarget,
};
use crate::core::BuildLinkType;

/// Active profile flags, pre-normalized for the selected compiler.
#[derive(Debug, Clone, Default)]
pub struct BuildProfile {
    pub cflags: Vec<String>,
    pub aflags: Vec<String>,
    pub lflags: Vec<String>,
    pub defines: Vec<String>,
}

/// Holds every target registered for a build run. Mutated single-threaded
/// by the plan compiler and the module resolver.
#[derive(Debug, Default)]
pub struct BuildManager {
    compilation_targets: Vec<CompilationTarget>,
    archive_targets: Vec<ArchiveTarget>,
    link_targets: Vec<LinkTarget>,
    external_targets: Vec<ExternalTarget>,

    /// Registered object outputs; duplicate insertions are ignored.
    object_registry: BTreeSet<String>,

    /// Registered archive outputs; duplicate insertions are ignored.
    library_registry: BTreeSet<String>,

    profiles: BTreeMap<String, BuildProfile>,
}

impl BuildManager {
    pub fn new() -> BuildManager {
        BuildManager::default()
    }

    /// Register a compilation unit. Empty paths and duplicate outputs are
    /// ignored.
    pub fn add_compilation_target(
        &mut self,
        input: &str,
        output: &str,
        flags: &CompilationFlags,
        unit_type: CompilationUnitType,
    ) {
        if input.is_empty() || output.is_empty() {
            tracing::error!("compilation target must have a source file and an object file");
            return;
        }
        if !self.object_registry.insert(output.to_string()) {
            return;
        }
        self.compilation_targets.push(CompilationTarget::new(
            input.to_string(),
            output.to_string(),
            flags,
            unit_type,
        ));
    }

    /// Register an archive. Archives need at least one object.
    pub fn add_archive_target(&mut self, output: &str, inputs: Vec<String>, flags: Vec<String>) {
        if output.is_empty() || inputs.is_empty() {
            tracing::trace!("skipping archive target without a name or inputs");
            return;
        }
        if !self.library_registry.insert(output.to_string()) {
            return;
        }
        self.archive_targets.push(ArchiveTarget {
            output: output.to_string(),
            inputs,
            flags,
        });
    }

    pub fn add_link_target(
        &mut self,
        output: &str,
        inputs: Vec<String>,
        libs: Vec<String>,
        flags: Vec<String>,
        link_type: BuildLinkType,
    ) {
        if output.is_empty() || (inputs.is_empty() && libs.is_empty()) {
            tracing::error!("link target '{}' has nothing to link", output);
            return;
        }
        self.link_targets.push(LinkTarget {
            output: output.to_string(),
            inputs,
            libs,
            flags,
            link_type,
        });
    }

    pub fn add_external_target(&mut self, target: ExternalTarget) {
        self.external_targets.push(target);
    }

    pub fn compilation_targets(&self) -> &[CompilationTarget] {
        &self.compilation_targets
    }

    pub fn archive_targets(&self) -> &[ArchiveTarget] {
        &self.archive_targets
    }

    pub fn link_targets(&self) -> &[LinkTarget] {
        &self.link_targets
    }

    pub fn external_targets(&self) -> &[ExternalTarget] {
        &self.external_targets
    }

    /// Find a compilation target index by its input path.
    pub fn find_by_input(&self, input: &str) -> Option<usize> {
        self.compilation_targets
            .iter()
            .position(|t| t.input == input)
    }

    /// Find a compilation target index by its output path.
    pub fn find_by_output(&self, output: &str) -> Option<usize> {
        self.compilation_targets
            .iter()
            .position(|t| t.output == output)
    }

    pub fn target(&self, index: usize) -> &CompilationTarget {
        &self.compilation_targets[index]
    }

    pub fn set_logical_name(&mut self, index: usize, logical_name: &str) {
        self.compilation_targets[index].logical_name = logical_name.to_string();
    }

    /// Record that `index` requires `dependency` to be built first.
    pub fn add_dependency(&mut self, index: usize, dependency: usize) {
        let deps = &mut self.compilation_targets[index].dependencies;
        if index != dependency && !deps.contains(&dependency) {
            deps.push(dependency);
        }
    }

    pub fn set_profile(&mut self, name: &str, profile: BuildProfile) {
        self.profiles.insert(name.to_string(), profile);
    }

    pub fn profile(&self, name: &str) -> Option<&BuildProfile> {
        self.profiles.get(name)
    }

    /// Whether any registered unit is a module interface.
    pub fn has_modules(&self) -> bool {
        self.compilation_targets
            .iter()
            .any(|t| t.unit_type == CompilationUnitType::Module)
    }
}
