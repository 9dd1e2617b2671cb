//! The build pipeline: resolve -> cache -> plan -> emit -> run.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::builder::parser::ARTIFACT_DIR;
use crate::builder::{self, modules, ninja::NinjaBackend, BuildManager, LockCache};
use crate::core::compiler::{default_compiler, detect_compiler};
use crate::core::Compiler;
use crate::lockgen::LockGenerator;
use crate::manifest::MUUK_LOCK_CACHE;
use crate::util::fs::{ensure_dir, write_string};
use crate::util::process::ProcessBuilder;

/// Options of `muuk build`.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Build a single named target instead of everything.
    pub target: Option<String>,

    /// Compiler selection (`gcc`, `clang`, `msvc` or a driver name).
    pub compiler: Option<String>,

    /// Profile selection; falls back to the default profile.
    pub profile: Option<String>,
}

fn select_compiler(requested: Option<&str>) -> Result<Compiler> {
    match requested {
        Some(name) => name.parse(),
        None => {
            let preferred = default_compiler();
            if which::which(preferred.command()).is_ok() {
                Ok(preferred)
            } else {
                detect_compiler()
            }
        }
    }
}

/// Resolve, generate the build plan, and write the build files for one
/// profile. Returns the build directory and the populated manager.
pub fn generate(root: &Path, options: &BuildOptions) -> Result<(PathBuf, BuildManager, Compiler, String)> {
    let generator = LockGenerator::create(root)?;
    let cache_path = root.join(MUUK_LOCK_CACHE);
    generator.write_cache(&cache_path)?;

    let compiler = select_compiler(options.compiler.as_deref())?;
    let cache = LockCache::load(&cache_path)?;
    let profile = builder::select_profile(options.profile.as_deref(), &cache)?;

    let build_dir = root.join("build").join(&profile);
    ensure_dir(&build_dir.join(ARTIFACT_DIR))?;
    ensure_dir(&build_dir.join("modules"))?;

    // The generated build file addresses paths relative to the build
    // directory, two levels below the project root.
    let relative_build_dir = Path::new("build").join(&profile);

    let mut manager = BuildManager::new();
    let has_modules = builder::parser::parse(
        &mut manager,
        compiler,
        root,
        &relative_build_dir,
        &profile,
        &cache,
    )?;

    if has_modules {
        modules::resolve_modules(&mut manager, &build_dir)
            .with_context(|| "module resolution failed")?;
    }

    let backend = NinjaBackend::new(&manager, compiler, relative_build_dir.clone(), profile.clone());
    write_string(&build_dir.join("build.ninja"), &backend.generate())?;
    tracing::info!("ninja build file generated for profile '{}'", profile);

    builder::compdb::write(&manager, compiler, &build_dir, &profile)?;

    Ok((build_dir, manager, compiler, profile))
}

/// `muuk build`: generate the plan and hand it to the external runner.
pub fn execute(root: &Path, options: &BuildOptions) -> Result<()> {
    let (build_dir, _manager, _compiler, profile) = generate(root, options)?;

    let mut runner = ProcessBuilder::new("ninja").arg("-C").arg(&build_dir);
    if let Some(target) = &options.target {
        runner = runner.arg(target);
    }
    runner
        .status()
        .with_context(|| format!("build for profile '{profile}' failed"))?;

    tracing::info!("build for profile '{}' completed successfully", profile);
    Ok(())
}
