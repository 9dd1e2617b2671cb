//! Build-plan compilation: lock cache -> typed target graph.
//!
//! Reads the fully-merged settings out of `muuk.lock.toml`, filters by the
//! active profile, normalizes every flag for the selected compiler, and
//! registers compilation, archive, link, and external targets with the
//! [`BuildManager`]. Glob patterns in source lists expand here, at plan
//! time; the lock cache stays a declarative record.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use serde::Deserialize;

use crate::builder::manager::{BuildManager, BuildProfile};
use crate::builder::targets::{CompilationFlags, CompilationUnitType, ExternalTarget};
use crate::core::compiler::{host_platform, EXE_EXT, LIB_EXT, OBJ_EXT};
use crate::core::flags::normalize_flags;
use crate::core::{BuildLinkType, Compiler};
use crate::util::fs::{
    absolute_forward_slash, build_relative, expand_glob, normalize_lexically, to_forward_slash,
};

/// Artifact subdirectory under `build/<profile>/` for objects and
/// archives.
pub const ARTIFACT_DIR: &str = "muuk";

/// A source entry in the cache.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CachedSource {
    pub path: String,
    #[serde(default)]
    pub cflags: Vec<String>,
}

/// Compiler- or platform-keyed flag group in the cache.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CachedFlags {
    #[serde(default)]
    pub cflags: Vec<String>,
    #[serde(default)]
    pub lflags: Vec<String>,
    #[serde(default)]
    pub defines: Vec<String>,
    #[serde(default)]
    pub libs: Vec<String>,
}

/// A dependency reference in a cached `[[build]]` entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CachedDependency {
    pub name: String,
    #[serde(default)]
    pub version: String,
}

/// A `[[library]]` or `[[build]]` entry in the cache.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CachedTarget {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub sources: Vec<CachedSource>,
    #[serde(default)]
    pub modules: Vec<CachedSource>,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub defines: Vec<String>,
    #[serde(default)]
    pub undefines: Vec<String>,
    #[serde(default)]
    pub cflags: Vec<String>,
    #[serde(default)]
    pub cxxflags: Vec<String>,
    #[serde(default)]
    pub aflags: Vec<String>,
    #[serde(default)]
    pub lflags: Vec<String>,
    #[serde(default)]
    pub libs: Vec<String>,
    #[serde(default)]
    pub profiles: Option<Vec<String>>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub compiler: BTreeMap<String, CachedFlags>,
    #[serde(default)]
    pub platform: BTreeMap<String, CachedFlags>,
    #[serde(default)]
    pub dependencies: Vec<CachedDependency>,
}

impl CachedTarget {
    /// Skip rule: a declared profile set that excludes the active profile
    /// excludes this entry.
    fn matches_profile(&self, profile: &str) -> bool {
        match &self.profiles {
            Some(profiles) => profiles.iter().any(|p| p == profile),
            None => true,
        }
    }
}

/// A cached external-output entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CachedExternalOutput {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub profile: String,
}

/// A `[[external]]` entry in the cache.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CachedExternal {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<CachedExternalOutput>,
    #[serde(default)]
    pub profiles: Option<Vec<String>>,
    #[serde(default)]
    pub source_file: Option<String>,
}

/// A `[profile.<name>]` entry in the cache.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CachedProfile {
    #[serde(default)]
    pub cflags: Vec<String>,
    #[serde(default)]
    pub aflags: Vec<String>,
    #[serde(default)]
    pub lflags: Vec<String>,
    #[serde(default)]
    pub defines: Vec<String>,
    #[serde(default)]
    pub default: bool,
}

/// The whole build-plan cache.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LockCache {
    #[serde(default)]
    pub library: Vec<CachedTarget>,
    #[serde(default)]
    pub external: Vec<CachedExternal>,
    #[serde(default)]
    pub build: Vec<CachedTarget>,
    #[serde(default)]
    pub profile: BTreeMap<String, CachedProfile>,
}

impl LockCache {
    pub fn load(path: &Path) -> Result<LockCache> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read lock cache '{}': {e}", path.display()))?;
        toml::from_str(&content)
            .map_err(|e| anyhow!("failed to parse lock cache '{}': {e}", path.display()))
    }
}

/// Pick the active profile: an explicit request wins, then `default =
/// true`, then the first profile in the cache.
pub fn select_profile(requested: Option<&str>, cache: &LockCache) -> Result<String> {
    if let Some(profile) = requested {
        return Ok(profile.to_string());
    }
    if let Some((name, _)) = cache.profile.iter().find(|(_, p)| p.default) {
        return Ok(name.clone());
    }
    if let Some(name) = cache.profile.keys().next() {
        tracing::info!("no default profile; using first available: '{}'", name);
        return Ok(name.clone());
    }
    Err(anyhow!("no profiles found in the lock cache"))
}

fn extract_profile_flags(profile: &str, compiler: Compiler, cache: &LockCache) -> Result<BuildProfile> {
    tracing::info!("extracting profile flags for '{}'", profile);

    let entry = cache
        .profile
        .get(profile)
        .ok_or_else(|| anyhow!("profile '{profile}' does not exist in the configuration"))?;

    let defines: Vec<String> = entry.defines.iter().map(|d| format!("-D{d}")).collect();

    Ok(BuildProfile {
        cflags: normalize_flags(&entry.cflags, compiler),
        aflags: normalize_flags(&entry.aflags, compiler),
        lflags: normalize_flags(&entry.lflags, compiler),
        defines: normalize_flags(&defines, compiler),
    })
}

/// Glob-expand a source entry. Literal paths pass through so plans can be
/// produced for files that do not exist yet.
fn expand_entry(entry: &CachedSource) -> Vec<CachedSource> {
    expand_glob(&entry.path)
        .into_iter()
        .map(|path| CachedSource {
            path,
            cflags: entry.cflags.clone(),
        })
        .collect()
}

/// Make a cache path project-root-relative. Paths outside the root fall
/// back to their file name.
fn relativize(path: &str, root: &Path) -> PathBuf {
    let p = Path::new(path);
    if !p.is_absolute() {
        return p.to_path_buf();
    }
    pathdiff::diff_paths(p, root)
        .filter(|rel| !rel.starts_with(".."))
        .unwrap_or_else(|| {
            p.file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("unnamed"))
        })
}

/// Source path (absolute) and object path (build-dir-relative) for one
/// expanded entry.
fn src_and_obj_paths(path: &str, artifact_dir: &Path, root: &Path) -> (String, String) {
    let src = absolute_forward_slash(path);

    let obj_rel = relativize(path, root).with_extension(OBJ_EXT);
    let obj = build_relative(to_forward_slash(
        normalize_lexically(&artifact_dir.join(obj_rel)).to_string_lossy(),
    ));

    (src, obj)
}

struct PlanContext<'a> {
    compiler: Compiler,
    root: &'a Path,
    build_dir: &'a Path,
    artifact_dir: PathBuf,
    profile: &'a str,
}

/// Compile the lock cache into the manager's target graph. Returns whether
/// any module units were registered (the caller then runs module
/// resolution).
pub fn parse(
    manager: &mut BuildManager,
    compiler: Compiler,
    root: &Path,
    build_dir: &Path,
    profile: &str,
    cache: &LockCache,
) -> Result<bool> {
    let build_profile = extract_profile_flags(profile, compiler, cache)?;
    manager.set_profile(profile, build_profile);

    let ctx = PlanContext {
        compiler,
        root,
        build_dir,
        artifact_dir: build_dir.join(ARTIFACT_DIR),
        profile,
    };

    parse_compilation_targets(manager, &ctx, cache);
    parse_libraries(manager, &ctx, cache);
    parse_externals(manager, &ctx, cache);
    parse_executables(manager, &ctx, cache);

    Ok(manager.has_modules())
}

fn entry_compilation_flags(
    entry: &CachedTarget,
    compiler: Compiler,
    extra_cflags: &[String],
) -> CompilationFlags {
    let mut cflags = entry.cflags.clone();
    cflags.extend(entry.cxxflags.iter().cloned());
    cflags.extend(extra_cflags.iter().cloned());

    let iflags: Vec<String> = entry
        .include
        .iter()
        .map(|inc| format!("-I{}", build_relative(inc)))
        .collect();

    let mut defines: Vec<String> = entry.defines.iter().map(|d| format!("-D{d}")).collect();
    defines.extend(entry.undefines.iter().map(|u| format!("-U{u}")));

    let platform_cflags = entry
        .platform
        .get(host_platform())
        .map(|flags| flags.cflags.clone())
        .unwrap_or_default();
    let compiler_cflags = entry
        .compiler
        .get(compiler.key())
        .map(|flags| flags.cflags.clone())
        .unwrap_or_default();

    CompilationFlags {
        cflags: normalize_flags(&cflags, compiler),
        iflags: normalize_flags(&iflags, compiler),
        defines: normalize_flags(&defines, compiler),
        platform_cflags: normalize_flags(&platform_cflags, compiler),
        compiler_cflags: normalize_flags(&compiler_cflags, compiler),
    }
}

fn parse_compilation_targets(manager: &mut BuildManager, ctx: &PlanContext, cache: &LockCache) {
    for entry in cache.build.iter().chain(cache.library.iter()) {
        if !entry.matches_profile(ctx.profile) {
            continue;
        }

        for (units, unit_type) in [
            (&entry.modules, CompilationUnitType::Module),
            (&entry.sources, CompilationUnitType::Source),
        ] {
            for unit in units.iter().flat_map(expand_entry) {
                let flags = entry_compilation_flags(entry, ctx.compiler, &unit.cflags);
                let (src, obj) = src_and_obj_paths(&unit.path, &ctx.artifact_dir, ctx.root);
                tracing::info!(
                    "added {} compilation target: {} -> {}",
                    unit_type.as_str(),
                    src,
                    obj
                );
                manager.add_compilation_target(&src, &obj, &flags, unit_type);
            }
        }
    }
}

/// Archive output path for a library entry.
fn archive_path(entry: &CachedTarget, artifact_dir: &Path, root: &Path) -> String {
    let package_dir = relativize(entry.path.as_deref().unwrap_or("."), root);
    let lib_dir = normalize_lexically(&artifact_dir.join(package_dir));
    build_relative(to_forward_slash(
        lib_dir
            .join(format!("{}{}", entry.name, LIB_EXT))
            .to_string_lossy(),
    ))
}

fn entry_object_files(entry: &CachedTarget, artifact_dir: &Path, root: &Path) -> Vec<String> {
    entry
        .modules
        .iter()
        .chain(entry.sources.iter())
        .flat_map(expand_entry)
        .map(|unit| src_and_obj_paths(&unit.path, artifact_dir, root).1)
        .collect()
}

fn parse_libraries(manager: &mut BuildManager, ctx: &PlanContext, cache: &LockCache) {
    for entry in &cache.library {
        if !entry.matches_profile(ctx.profile) {
            continue;
        }
        if entry.sources.is_empty() && entry.modules.is_empty() {
            continue;
        }

        let output = archive_path(entry, &ctx.artifact_dir, ctx.root);
        let objects = entry_object_files(entry, &ctx.artifact_dir, ctx.root);
        let aflags = normalize_flags(&entry.aflags, ctx.compiler);

        tracing::info!("added library target: {}", output);
        manager.add_archive_target(&output, objects, aflags);
    }
}

fn parse_executables(manager: &mut BuildManager, ctx: &PlanContext, cache: &LockCache) {
    // Archive paths by library identity, for dependency lookup.
    let mut lib_index: BTreeMap<(&str, &str), &CachedTarget> = BTreeMap::new();
    for entry in &cache.library {
        lib_index.insert((entry.name.as_str(), entry.version.as_str()), entry);
    }

    for entry in &cache.build {
        if !entry.matches_profile(ctx.profile) {
            continue;
        }

        let output = build_relative(to_forward_slash(
            ctx.build_dir
                .join(format!("{}{}", entry.name, EXE_EXT))
                .to_string_lossy(),
        ));

        let objects = entry_object_files(entry, &ctx.artifact_dir, ctx.root);

        let mut libs = Vec::new();
        for dep in &entry.dependencies {
            let Some(lib) = lib_index.get(&(dep.name.as_str(), dep.version.as_str())) else {
                continue;
            };
            // An entry with no compilation units is header-only; there is
            // no archive to link.
            if lib.sources.is_empty() && lib.modules.is_empty() {
                continue;
            }
            libs.push(archive_path(lib, &ctx.artifact_dir, ctx.root));
        }
        libs.extend(entry.libs.iter().cloned());

        let lflags = normalize_flags(&entry.lflags, ctx.compiler);
        let link_type = entry
            .link
            .as_deref()
            .map(BuildLinkType::parse)
            .unwrap_or_default();

        tracing::info!("added link target: {}", output);
        manager.add_link_target(&output, objects, libs, lflags, link_type);
    }
}

fn parse_externals(manager: &mut BuildManager, ctx: &PlanContext, cache: &LockCache) {
    for entry in &cache.external {
        let profile_ok = match &entry.profiles {
            Some(profiles) => profiles.iter().any(|p| p == ctx.profile),
            None => true,
        };
        if !profile_ok {
            continue;
        }

        // All paths in the emitted file resolve from the build directory.
        let build_path = build_relative(to_forward_slash(
            ctx.build_dir
                .join("external")
                .join(&entry.name)
                .to_string_lossy(),
        ));
        let cache_file = format!("{build_path}/CMakeCache.txt");

        let outputs: Vec<String> = entry
            .outputs
            .iter()
            .filter(|output| output.profile.is_empty() || output.profile == ctx.profile)
            .map(|output| format!("{build_path}/{}", output.path))
            .collect();
        if outputs.is_empty() {
            tracing::warn!(
                "external '{}' has no outputs for profile '{}'",
                entry.name,
                ctx.profile
            );
            continue;
        }

        let source_path = build_relative(&entry.path);
        let source_file = match &entry.source_file {
            Some(file) => build_relative(file),
            None => format!("{source_path}/CMakeLists.txt"),
        };

        manager.add_external_target(ExternalTarget {
            name: entry.name.clone(),
            kind: entry.kind.clone(),
            build_path,
            source_path,
            source_file,
            cache_file,
            args: entry.args.clone(),
            outputs,
        });
        tracing::info!("added external target '{}'", entry.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_from(toml: &str) -> LockCache {
        toml::from_str(toml).unwrap()
    }

    fn plan(cache: &LockCache, compiler: Compiler, profile: &str) -> BuildManager {
        let mut manager = BuildManager::new();
        parse(
            &mut manager,
            compiler,
            Path::new("."),
            Path::new("build").join(profile).as_path(),
            profile,
            cache,
        )
        .unwrap();
        manager
    }

    const MINIMAL: &str = r#"
        [[library]]
        name = "a"
        version = "0.1"
        path = "."
        sources = [{ path = "src/a.cpp" }]
        link = "static"

        [profile.debug]
        cflags = ["-g", "-O0"]
    "#;

    #[test]
    fn test_minimal_library_plan() {
        let cache = cache_from(MINIMAL);
        let manager = plan(&cache, Compiler::Clang, "debug");

        assert_eq!(manager.compilation_targets().len(), 1);
        let target = &manager.compilation_targets()[0];
        assert!(target.input.ends_with("src/a.cpp"));
        assert_eq!(target.output, "../../build/debug/muuk/src/a.o");

        // One archive for the library, no links.
        assert_eq!(manager.archive_targets().len(), 1);
        assert!(manager.link_targets().is_empty());
    }

    #[test]
    fn test_profile_mismatch_skips_entry() {
        let cache = cache_from(
            r#"
            [[library]]
            name = "a"
            version = "0.1"
            sources = [{ path = "src/a.cpp" }]
            profiles = ["release"]

            [profile.debug]
            cflags = ["-g"]

            [profile.release]
            cflags = ["-O2"]
            "#,
        );
        let manager = plan(&cache, Compiler::Gcc, "debug");
        assert!(manager.compilation_targets().is_empty());
    }

    #[test]
    fn test_missing_profile_is_error() {
        let cache = cache_from(MINIMAL);
        let mut manager = BuildManager::new();
        let err = parse(
            &mut manager,
            Compiler::Gcc,
            Path::new("."),
            Path::new("build/release"),
            "release",
            &cache,
        )
        .unwrap_err();
        assert!(err.to_string().contains("release"));
    }

    #[test]
    fn test_binary_depending_on_archive() {
        let cache = cache_from(
            r#"
            [[library]]
            name = "lib"
            version = "0.1"
            path = "."
            sources = [{ path = "src/lib.cpp" }]

            [[build]]
            name = "app"
            version = "0.1"
            sources = [{ path = "src/main.cpp" }]
            dependencies = [{ name = "lib", version = "0.1" }]

            [profile.release]
            cflags = ["-O2"]
            "#,
        );
        let manager = plan(&cache, Compiler::Gcc, "release");

        // Compile rules for both sources.
        assert_eq!(manager.compilation_targets().len(), 2);

        // One archive for the library.
        assert_eq!(manager.archive_targets().len(), 1);
        let archive = &manager.archive_targets()[0];
        assert!(archive.output.ends_with(&format!("lib{LIB_EXT}")));

        // One link with the archive as an input.
        assert_eq!(manager.link_targets().len(), 1);
        let link = &manager.link_targets()[0];
        assert!(link.output.contains("app"));
        assert!(link.libs.iter().any(|l| l.ends_with(&format!("lib{LIB_EXT}"))));
        assert_eq!(link.link_type, BuildLinkType::Executable);
    }

    #[test]
    fn test_flags_are_normalized_and_composed() {
        let cache = cache_from(
            r#"
            [[library]]
            name = "a"
            version = "0.1"
            sources = [{ path = "src/a.cpp" }]
            include = ["include"]
            defines = ["FOO"]
            cflags = ["/O2"]

            [library.compiler.gcc]
            cflags = ["-fconcepts"]

            [profile.debug]
            cflags = ["-g"]
            "#,
        );
        let manager = plan(&cache, Compiler::Gcc, "debug");

        let flags = &manager.compilation_targets()[0].flags;
        // MSVC spelling normalized to GCC.
        assert!(flags.contains(&"-O2".to_string()));
        assert!(flags.contains(&"-I../../include".to_string()));
        assert!(flags.contains(&"-DFOO".to_string()));
        assert!(flags.contains(&"-fconcepts".to_string()));
    }

    #[test]
    fn test_per_source_cflags_apply_to_that_unit() {
        let cache = cache_from(
            r#"
            [[library]]
            name = "a"
            version = "0.1"
            sources = [
                { path = "src/a.cpp" },
                { path = "src/hot.cpp", cflags = ["-O3"] },
            ]

            [profile.debug]
            cflags = ["-g"]
            "#,
        );
        let manager = plan(&cache, Compiler::Gcc, "debug");

        let hot = manager
            .compilation_targets()
            .iter()
            .find(|t| t.input.ends_with("hot.cpp"))
            .unwrap();
        let cold = manager
            .compilation_targets()
            .iter()
            .find(|t| t.input.ends_with("a.cpp"))
            .unwrap();
        assert!(hot.flags.contains(&"-O3".to_string()));
        assert!(!cold.flags.contains(&"-O3".to_string()));
    }

    #[test]
    fn test_externals_filtered_by_profile_output() {
        let cache = cache_from(
            r#"
            [[external]]
            name = "zlib"
            version = "1.3"
            type = "cmake"
            path = "vendor/zlib"
            args = ["-DBUILD_SHARED_LIBS=OFF"]
            outputs = [
                { path = "libz.a", profile = "release" },
                { path = "libzd.a", profile = "debug" },
            ]

            [profile.debug]
            cflags = ["-g"]
            "#,
        );
        let manager = plan(&cache, Compiler::Gcc, "debug");

        assert_eq!(manager.external_targets().len(), 1);
        let external = &manager.external_targets()[0];
        assert_eq!(external.outputs.len(), 1);
        assert!(external.outputs[0].ends_with("libzd.a"));
        assert_eq!(external.source_file, "../../vendor/zlib/CMakeLists.txt");
        assert_eq!(external.build_path, "../../build/debug/external/zlib");
        assert!(external.cache_file.ends_with("CMakeCache.txt"));
    }

    #[test]
    fn test_select_profile_default_then_first() {
        let cache = cache_from(
            r#"
            [profile.debug]
            cflags = ["-g"]

            [profile.release]
            cflags = ["-O2"]
            default = true
            "#,
        );
        assert_eq!(select_profile(None, &cache).unwrap(), "release");
        assert_eq!(select_profile(Some("debug"), &cache).unwrap(), "debug");

        let no_default = cache_from("[profile.zeta]\ncflags = []\n[profile.alpha]\ncflags = []");
        assert_eq!(select_profile(None, &no_default).unwrap(), "alpha");

        let empty = LockCache::default();
        assert!(select_profile(None, &empty).is_err());
    }

    #[test]
    fn test_profile_defines_get_prefix() {
        let cache = cache_from(
            r#"
            [profile.debug]
            cflags = ["-g"]
            defines = ["DEBUG"]
            "#,
        );
        let manager = plan(&cache, Compiler::Msvc, "debug");
        let profile = manager.profile("debug").unwrap();
        assert_eq!(profile.defines, vec!["/DDEBUG".to_string()]);
    }
}
