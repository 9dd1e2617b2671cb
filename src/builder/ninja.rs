//! Ninja build-file emission.
//!
//! Deterministic: identical inputs produce a byte-identical `build.ninja`.
//! The generated file lives in `build/<profile>/` and Ninja runs with that
//! directory as its working directory, so project paths carry a `../../`
//! prefix. Drive letters are escaped here and only here.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::builder::manager::BuildManager;
use crate::builder::targets::{
    ArchiveTarget, CompilationTarget, CompilationUnitType, ExternalTarget, LinkTarget,
};
use crate::core::{BuildLinkType, Compiler};
use crate::util::fs::{escape_drive_letter, to_forward_slash};

/// Filesystem-safe spelling of a logical module name: partition colons
/// become dashes (`M:part` -> `M-part`). Used consistently for both the
/// produced artifact and consumer dependencies.
pub fn sanitize_logical_name(name: &str) -> String {
    name.replace(':', "-")
}

/// Ninja build-file generator.
pub struct NinjaBackend<'a> {
    manager: &'a BuildManager,
    compiler: Compiler,
    archiver: String,
    linker: String,

    /// `build/<profile>`, project-root-relative.
    build_dir: PathBuf,
    profile: String,
}

impl<'a> NinjaBackend<'a> {
    pub fn new(
        manager: &'a BuildManager,
        compiler: Compiler,
        build_dir: impl Into<PathBuf>,
        profile: impl Into<String>,
    ) -> NinjaBackend<'a> {
        NinjaBackend {
            manager,
            compiler,
            archiver: compiler.archiver().to_string(),
            linker: compiler.linker().to_string(),
            build_dir: build_dir.into(),
            profile: profile.into(),
        }
    }

    /// The module artifact directory as seen from the build directory.
    fn module_dir(&self) -> String {
        format!(
            "../../{}/modules/",
            to_forward_slash(self.build_dir.to_string_lossy())
        )
    }

    /// Artifact path for a module provider. Falls back to the input's file
    /// stem when scanning did not attach a logical name.
    fn module_artifact(&self, target: &CompilationTarget) -> String {
        let logical = if target.logical_name.is_empty() {
            Path::new(&target.input)
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| "module".to_string())
        } else {
            target.logical_name.clone()
        };
        format!(
            "{}{}.{}",
            self.module_dir(),
            sanitize_logical_name(&logical),
            self.compiler.module_ext()
        )
    }

    /// Generate the complete build file.
    pub fn generate(&self) -> String {
        let mut out = String::new();
        self.write_header(&mut out);
        self.write_build_rules(&mut out);
        out
    }

    fn profile_flag_strings(&self) -> (String, String, String) {
        match self.manager.profile(&self.profile) {
            Some(profile) => {
                let mut cflags = profile.cflags.join(" ");
                if !profile.defines.is_empty() {
                    if !cflags.is_empty() {
                        cflags.push(' ');
                    }
                    cflags.push_str(&profile.defines.join(" "));
                }
                (cflags, profile.aflags.join(" "), profile.lflags.join(" "))
            }
            None => {
                tracing::warn!("no profile flags found for '{}'", self.profile);
                (String::new(), String::new(), String::new())
            }
        }
    }

    fn write_header(&self, out: &mut String) {
        let module_dir = self.module_dir();
        let (profile_cflags, profile_aflags, profile_lflags) = self.profile_flag_strings();

        writeln!(out, "# ------------------------------------------------------------").unwrap();
        writeln!(out, "# Auto-generated Ninja build file").unwrap();
        writeln!(out, "# Generated by Muuk").unwrap();
        writeln!(out, "# Profile: {}", self.profile).unwrap();
        writeln!(out, "# ------------------------------------------------------------\n").unwrap();

        writeln!(out, "# Toolchain Configuration").unwrap();
        writeln!(out, "cxx = {}", self.compiler.command()).unwrap();
        writeln!(out, "ar = {}", self.archiver).unwrap();
        writeln!(out, "linker = {}\n", self.linker).unwrap();

        writeln!(out, "# Profile-Specific Flags").unwrap();
        writeln!(out, "profile_cflags = {profile_cflags}").unwrap();
        writeln!(out, "profile_aflags = {profile_aflags}").unwrap();
        writeln!(out, "profile_lflags = {profile_lflags}\n").unwrap();

        writeln!(out, "# ------------------------------------------------------------").unwrap();
        writeln!(out, "# Rules for Compiling C++ Modules").unwrap();
        writeln!(out, "# ------------------------------------------------------------").unwrap();
        match self.compiler {
            Compiler::Msvc => {
                writeln!(out, "rule compile_module").unwrap();
                writeln!(
                    out,
                    "  command = $cxx /std:c++20 /utf-8 /c $in /ifcOnly /ifcOutput {module_dir} \
                     /ifcSearchDir {module_dir} $cflags $profile_cflags"
                )
                .unwrap();
                writeln!(out, "  description = Compiling C++ module $in\n").unwrap();
            }
            Compiler::Clang => {
                // -x c++-module marks inputs that do not end in .cppm.
                writeln!(out, "rule compile_module").unwrap();
                writeln!(
                    out,
                    "  command = $cxx -x c++-module -std=c++20 --precompile \
                     -fprebuilt-module-path={module_dir} $in -o $out $cflags $profile_cflags"
                )
                .unwrap();
                writeln!(out, "  description = Compiling C++ module $in\n").unwrap();
            }
            Compiler::Gcc => {
                writeln!(out, "rule compile_module").unwrap();
                writeln!(
                    out,
                    "  command = $cxx -std=c++20 -fmodules-ts -c $in -o $out \
                     -fmodule-output={module_dir} $cflags"
                )
                .unwrap();
                writeln!(out, "  description = Compiling C++ module $in\n").unwrap();
            }
        }

        writeln!(out, "# ------------------------------------------------------------").unwrap();
        writeln!(out, "# Rules").unwrap();
        writeln!(out, "# ------------------------------------------------------------").unwrap();
        if self.compiler == Compiler::Msvc {
            writeln!(out, "rule compile").unwrap();
            writeln!(
                out,
                "  command = $cxx /c $in /Fo$out $profile_cflags $platform_cflags $cflags \
                 /showIncludes /ifcSearchDir {module_dir}"
            )
            .unwrap();
            writeln!(out, "  deps = msvc").unwrap();
            writeln!(out, "  description = Compiling $in\n").unwrap();

            writeln!(out, "rule archive").unwrap();
            writeln!(out, "  command = $ar /OUT:$out $in $aflags $profile_aflags").unwrap();
            writeln!(out, "  description = Archiving $out\n").unwrap();

            writeln!(out, "rule link").unwrap();
            writeln!(
                out,
                "  command = $linker $in /OUT:$out $lflags $profile_lflags $libraries"
            )
            .unwrap();
            writeln!(out, "  description = Linking $out\n").unwrap();

            writeln!(out, "rule link_shared").unwrap();
            writeln!(
                out,
                "  command = $linker $in /DLL /OUT:$out $lflags $profile_lflags $libraries"
            )
            .unwrap();
            writeln!(out, "  description = Linking shared library $out\n").unwrap();
        } else {
            writeln!(out, "rule compile").unwrap();
            writeln!(
                out,
                "  command = $cxx -c $in -o $out $profile_cflags $platform_cflags $cflags"
            )
            .unwrap();
            writeln!(out, "  description = Compiling $in\n").unwrap();

            writeln!(out, "rule archive").unwrap();
            writeln!(out, "  command = $ar rcs $out $in $aflags $profile_aflags").unwrap();
            writeln!(out, "  description = Archiving $out\n").unwrap();

            writeln!(out, "rule link").unwrap();
            writeln!(
                out,
                "  command = $linker $in -o $out $lflags $profile_lflags $libraries"
            )
            .unwrap();
            writeln!(out, "  description = Linking $out\n").unwrap();

            writeln!(out, "rule link_shared").unwrap();
            writeln!(
                out,
                "  command = $cxx -shared $in -o $out $lflags $profile_lflags $libraries"
            )
            .unwrap();
            writeln!(out, "  description = Linking shared library $out\n").unwrap();
        }

        let cmake_build_type = match self.profile.as_str() {
            "release" => "Release",
            "debug" => "Debug",
            _ => "",
        };
        writeln!(out, "rule configure_external").unwrap();
        writeln!(
            out,
            "  command = cmake -B $build_dir -S $source_dir -G Ninja $configure_args \
             -DCMAKE_BUILD_TYPE={cmake_build_type}"
        )
        .unwrap();
        writeln!(out, "  description = Configuring external project\n").unwrap();

        writeln!(out, "rule build_external").unwrap();
        writeln!(out, "  command = ninja -C $build_dir").unwrap();
        writeln!(out, "  description = Building external project\n").unwrap();
    }

    fn compilation_rule(&self, target: &CompilationTarget, out: &mut String) {
        let is_module = target.unit_type == CompilationUnitType::Module;
        let module_output = is_module.then(|| self.module_artifact(target));

        if let Some(module_output) = &module_output {
            writeln!(
                out,
                "build {module_output}: compile_module {}",
                escape_drive_letter(&target.input)
            )
            .unwrap();
            if !target.flags.is_empty() {
                writeln!(out, "  cflags = {}", target.flags.join(" ")).unwrap();
            }
            out.push('\n');
        }

        // Clang compiles the precompiled artifact; other compilers compile
        // the source and pick the interface up through the search dir.
        let compile_input = match (&module_output, self.compiler) {
            (Some(module_output), Compiler::Clang) => module_output.clone(),
            _ => escape_drive_letter(&target.input),
        };
        write!(out, "build {}: compile {}", target.output, compile_input).unwrap();

        let mut order_only: Vec<String> = Vec::new();
        if let Some(module_output) = &module_output {
            order_only.push(module_output.clone());
        }
        for &dep in &target.dependencies {
            order_only.push(self.module_artifact(self.manager.target(dep)));
        }
        if !order_only.is_empty() {
            write!(out, " | {}", order_only.join(" ")).unwrap();
        }
        out.push('\n');

        if !target.flags.is_empty() {
            writeln!(out, "  cflags = {}", target.flags.join(" ")).unwrap();
        }
    }

    fn archive_rule(&self, target: &ArchiveTarget, out: &mut String) {
        write!(out, "build {}: archive", target.output).unwrap();
        for input in &target.inputs {
            write!(out, " {input}").unwrap();
        }
        out.push('\n');
        if !target.flags.is_empty() {
            writeln!(out, "  aflags = {}", target.flags.join(" ")).unwrap();
        }
    }

    fn external_rule(&self, target: &ExternalTarget, out: &mut String) {
        let configure_args = target.args.join(" ");
        writeln!(
            out,
            "build {}: configure_external {}",
            target.cache_file,
            escape_drive_letter(&target.source_file)
        )
        .unwrap();
        writeln!(out, "  build_dir = {}", target.build_path).unwrap();
        writeln!(out, "  source_dir = {}", target.source_path).unwrap();
        writeln!(out, "  configure_args = {configure_args}").unwrap();

        for output in &target.outputs {
            writeln!(out, "build {}: build_external {}", output, target.cache_file).unwrap();
            writeln!(out, "  build_dir = {}\n", target.build_path).unwrap();
        }
    }

    fn link_rule(&self, target: &LinkTarget, out: &mut String) {
        let rule = match target.link_type {
            BuildLinkType::Static => "archive",
            BuildLinkType::Shared => "link_shared",
            BuildLinkType::Executable => "link",
        };
        write!(out, "build {}: {rule}", target.output).unwrap();
        for input in target.inputs.iter().chain(target.libs.iter()) {
            write!(out, " {input}").unwrap();
        }
        out.push('\n');
        if !target.flags.is_empty() {
            writeln!(out, "  lflags = {}", target.flags.join(" ")).unwrap();
        }
    }

    fn write_build_rules(&self, out: &mut String) {
        writeln!(out, "# ----------------------------------").unwrap();
        writeln!(out, "# Compiled Targets").unwrap();
        writeln!(out, "# ----------------------------------").unwrap();
        for target in self.manager.compilation_targets() {
            self.compilation_rule(target, out);
        }
        out.push('\n');

        writeln!(out, "# ----------------------------------").unwrap();
        writeln!(out, "# Archived Targets").unwrap();
        writeln!(out, "# ----------------------------------").unwrap();
        for target in self.manager.archive_targets() {
            self.archive_rule(target, out);
        }
        out.push('\n');

        writeln!(out, "# ----------------------------------").unwrap();
        writeln!(out, "# External Targets").unwrap();
        writeln!(out, "# ----------------------------------").unwrap();
        for target in self.manager.external_targets() {
            self.external_rule(target, out);
        }
        out.push('\n');

        writeln!(out, "# ----------------------------------").unwrap();
        writeln!(out, "# Link Targets").unwrap();
        writeln!(out, "# ----------------------------------").unwrap();
        let mut phony_rules = String::new();
        for target in self.manager.link_targets() {
            self.link_rule(target, out);

            // Alias the bare stem so `ninja app` works alongside
            // `ninja app.exe`.
            if let Some(stem) = Path::new(&target.output).file_stem() {
                writeln!(
                    phony_rules,
                    "build {}: phony {}",
                    stem.to_string_lossy(),
                    target.output
                )
                .unwrap();
            }
        }
        out.push('\n');
        out.push_str(&phony_rules);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::manager::BuildProfile;
    use crate::builder::targets::CompilationFlags;

    fn manager_with_plan() -> BuildManager {
        let mut manager = BuildManager::new();
        manager.set_profile(
            "debug",
            BuildProfile {
                cflags: vec!["-g".into()],
                defines: vec!["-DDEBUG".into()],
                ..Default::default()
            },
        );

        let flags = CompilationFlags {
            cflags: vec!["-Wall".into()],
            ..Default::default()
        };
        manager.add_compilation_target(
            "/abs/src/lib.cpp",
            "../../build/debug/muuk/src/lib.o",
            &flags,
            CompilationUnitType::Source,
        );
        manager.add_compilation_target(
            "/abs/src/main.cpp",
            "../../build/debug/muuk/src/main.o",
            &flags,
            CompilationUnitType::Source,
        );
        manager.add_archive_target(
            "../../build/debug/muuk/lib.a",
            vec!["../../build/debug/muuk/src/lib.o".into()],
            vec![],
        );
        manager.add_link_target(
            "../../build/debug/app",
            vec!["../../build/debug/muuk/src/main.o".into()],
            vec!["../../build/debug/muuk/lib.a".into()],
            vec![],
            BuildLinkType::Executable,
        );
        manager
    }

    #[test]
    fn test_generation_is_deterministic() {
        let manager = manager_with_plan();
        let backend = NinjaBackend::new(&manager, Compiler::Gcc, "build/debug", "debug");
        assert_eq!(backend.generate(), backend.generate());
    }

    #[test]
    fn test_basic_structure() {
        let manager = manager_with_plan();
        let backend = NinjaBackend::new(&manager, Compiler::Gcc, "build/debug", "debug");
        let ninja = backend.generate();

        assert!(ninja.contains("cxx = g++"));
        assert!(ninja.contains("ar = ar"));
        assert!(ninja.contains("profile_cflags = -g -DDEBUG"));
        assert!(ninja.contains("rule compile\n"));
        assert!(ninja.contains("rule archive\n"));
        assert!(ninja.contains(
            "build ../../build/debug/muuk/src/main.o: compile /abs/src/main.cpp"
        ));
        assert!(ninja.contains("build ../../build/debug/muuk/lib.a: archive"));
        assert!(ninja.contains(
            "build ../../build/debug/app: link ../../build/debug/muuk/src/main.o \
             ../../build/debug/muuk/lib.a"
        ));
        // Phony alias for the bare name.
        assert!(ninja.contains("build app: phony ../../build/debug/app"));
    }

    #[test]
    fn test_module_rules_per_compiler() {
        let mut manager = BuildManager::new();
        manager.set_profile("debug", BuildProfile::default());
        manager.add_compilation_target(
            "M.cppm",
            "M.o",
            &CompilationFlags::default(),
            CompilationUnitType::Module,
        );
        manager.add_compilation_target(
            "User.cpp",
            "User.o",
            &CompilationFlags::default(),
            CompilationUnitType::Source,
        );
        let m = manager.find_by_output("M.o").unwrap();
        manager.set_logical_name(m, "M");
        let user = manager.find_by_output("User.o").unwrap();
        manager.add_dependency(user, m);

        // Clang: precompile to .pcm, compile the .pcm.
        let clang = NinjaBackend::new(&manager, Compiler::Clang, "build/debug", "debug")
            .generate();
        assert!(clang.contains("--precompile"));
        assert!(clang.contains("build ../../build/debug/modules/M.pcm: compile_module M.cppm"));
        assert!(clang.contains(
            "build M.o: compile ../../build/debug/modules/M.pcm | ../../build/debug/modules/M.pcm"
        ));
        assert!(clang.contains("build User.o: compile User.cpp | ../../build/debug/modules/M.pcm"));

        // MSVC: ifcOnly into the module dir, object compiled from source.
        let msvc =
            NinjaBackend::new(&manager, Compiler::Msvc, "build/debug", "debug").generate();
        assert!(msvc.contains("/ifcOnly"));
        assert!(msvc.contains("/ifcSearchDir"));
        assert!(msvc.contains("build ../../build/debug/modules/M.ifc: compile_module M.cppm"));
        assert!(msvc.contains("build M.o: compile M.cppm | ../../build/debug/modules/M.ifc"));
        assert!(msvc.contains("deps = msvc"));

        // GCC uses modules-ts with .gcm output.
        let gcc = NinjaBackend::new(&manager, Compiler::Gcc, "build/debug", "debug").generate();
        assert!(gcc.contains("-fmodules-ts"));
        assert!(gcc.contains("build ../../build/debug/modules/M.gcm: compile_module M.cppm"));
    }

    #[test]
    fn test_partition_names_are_sanitized_consistently() {
        let mut manager = BuildManager::new();
        manager.set_profile("debug", BuildProfile::default());
        manager.add_compilation_target(
            "part.cppm",
            "part.o",
            &CompilationFlags::default(),
            CompilationUnitType::Module,
        );
        manager.add_compilation_target(
            "M.cppm",
            "M.o",
            &CompilationFlags::default(),
            CompilationUnitType::Module,
        );
        let part = manager.find_by_output("part.o").unwrap();
        manager.set_logical_name(part, "M:part");
        let m = manager.find_by_output("M.o").unwrap();
        manager.set_logical_name(m, "M");
        manager.add_dependency(m, part);

        let ninja =
            NinjaBackend::new(&manager, Compiler::Msvc, "build/debug", "debug").generate();
        // Producer and consumer agree on the dashed spelling.
        assert!(ninja.contains("build ../../build/debug/modules/M-part.ifc: compile_module"));
        assert!(ninja.contains("| ../../build/debug/modules/M-part.ifc"));
        assert!(!ninja.contains("M:part.ifc"));
    }

    #[test]
    fn test_external_rules() {
        let mut manager = BuildManager::new();
        manager.set_profile("release", BuildProfile::default());
        manager.add_external_target(ExternalTarget {
            name: "zlib".into(),
            kind: "cmake".into(),
            build_path: "build/release/external/zlib".into(),
            source_path: "vendor/zlib".into(),
            source_file: "vendor/zlib/CMakeLists.txt".into(),
            cache_file: "build/release/external/zlib/CMakeCache.txt".into(),
            args: vec!["-DBUILD_SHARED_LIBS=OFF".into()],
            outputs: vec!["build/release/external/zlib/libz.a".into()],
        });

        let ninja =
            NinjaBackend::new(&manager, Compiler::Gcc, "build/release", "release").generate();
        assert!(ninja.contains("-DCMAKE_BUILD_TYPE=Release"));
        assert!(ninja.contains(
            "build build/release/external/zlib/CMakeCache.txt: configure_external \
             vendor/zlib/CMakeLists.txt"
        ));
        assert!(ninja.contains("configure_args = -DBUILD_SHARED_LIBS=OFF"));
        assert!(ninja.contains(
            "build build/release/external/zlib/libz.a: build_external \
             build/release/external/zlib/CMakeCache.txt"
        ));
    }
}
