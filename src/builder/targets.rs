//! Typed build-plan targets.

use crate::core::BuildLinkType;

/// Whether a compilation unit is a C++ module interface or a plain source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilationUnitType {
    Module,
    Source,
}

impl CompilationUnitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompilationUnitType::Module => "module",
            CompilationUnitType::Source => "source",
        }
    }
}

/// Flag groups composing a compilation target's command line. Composition
/// is concatenation in this order, never override.
#[derive(Debug, Clone, Default)]
pub struct CompilationFlags {
    pub cflags: Vec<String>,
    pub iflags: Vec<String>,
    pub defines: Vec<String>,
    pub platform_cflags: Vec<String>,
    pub compiler_cflags: Vec<String>,
}

impl CompilationFlags {
    /// Flatten into the final flag list.
    pub fn flatten(&self) -> Vec<String> {
        let mut flags = Vec::with_capacity(
            self.cflags.len()
                + self.iflags.len()
                + self.defines.len()
                + self.platform_cflags.len()
                + self.compiler_cflags.len(),
        );
        flags.extend(self.cflags.iter().cloned());
        flags.extend(self.iflags.iter().cloned());
        flags.extend(self.defines.iter().cloned());
        flags.extend(self.platform_cflags.iter().cloned());
        flags.extend(self.compiler_cflags.iter().cloned());
        flags
    }
}

/// One `(input source, output object)` unit.
#[derive(Debug, Clone)]
pub struct CompilationTarget {
    /// Absolute source path.
    pub input: String,

    /// Object path, unique across the plan.
    pub output: String,

    pub flags: Vec<String>,
    pub unit_type: CompilationUnitType,

    /// Logical module name this unit provides, when known.
    pub logical_name: String,

    /// Indices of compilation targets that must build first (module
    /// providers).
    pub dependencies: Vec<usize>,
}

impl CompilationTarget {
    pub fn new(
        input: String,
        output: String,
        flags: &CompilationFlags,
        unit_type: CompilationUnitType,
    ) -> CompilationTarget {
        CompilationTarget {
            input,
            output,
            flags: flags.flatten(),
            unit_type,
            logical_name: String::new(),
            dependencies: Vec::new(),
        }
    }
}

/// A static library assembled from object files.
#[derive(Debug, Clone)]
pub struct ArchiveTarget {
    pub output: String,
    pub inputs: Vec<String>,
    pub flags: Vec<String>,
}

/// An executable or shared-library link.
#[derive(Debug, Clone)]
pub struct LinkTarget {
    pub output: String,
    pub inputs: Vec<String>,
    pub libs: Vec<String>,
    pub flags: Vec<String>,
    pub link_type: BuildLinkType,
}

/// A subproject built by a foreign build system, integrated via a
/// configure step and a build step.
#[derive(Debug, Clone)]
pub struct ExternalTarget {
    pub name: String,

    /// Build system kind (`"cmake"`).
    pub kind: String,

    /// Out-of-tree build directory.
    pub build_path: String,

    /// Source directory of the subproject.
    pub source_path: String,

    /// File the configure step depends on (`CMakeLists.txt`).
    pub source_file: String,

    /// Configure stamp (`CMakeCache.txt`); the build step depends on it.
    pub cache_file: String,

    pub args: Vec<String>,

    /// Artifacts the subproject produces for the active profile.
    pub outputs: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_composition_order() {
        let flags = CompilationFlags {
            cflags: vec!["-O2".into()],
            iflags: vec!["-Iinclude".into()],
            defines: vec!["-DX".into()],
            platform_cflags: vec!["-pthread".into()],
            compiler_cflags: vec!["-fconcepts".into()],
        };
        assert_eq!(
            flags.flatten(),
            vec!["-O2", "-Iinclude", "-DX", "-pthread", "-fconcepts"]
        );
    }
}
