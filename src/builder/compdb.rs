//! compile_commands.json emission for IDE and tooling integration.

use std::path::Path;

use anyhow::Result;
use serde_json::json;

use crate::builder::manager::BuildManager;
use crate::core::Compiler;
use crate::util::fs::{absolute_forward_slash, to_forward_slash, write_string};

/// Generate the compilation database for every registered compilation
/// target.
pub fn generate(manager: &BuildManager, compiler: Compiler, build_dir: &Path, profile: &str) -> serde_json::Value {
    let directory = absolute_forward_slash(&to_forward_slash(build_dir.to_string_lossy()));

    let profile_cflags: Vec<String> = manager
        .profile(profile)
        .map(|p| {
            p.cflags
                .iter()
                .chain(p.defines.iter())
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    let entries: Vec<serde_json::Value> = manager
        .compilation_targets()
        .iter()
        .map(|target| {
            let mut command = format!(
                "{} -c {} -o {}",
                compiler.command(),
                target.input,
                target.output
            );
            for flag in profile_cflags.iter().chain(target.flags.iter()) {
                command.push(' ');
                command.push_str(flag);
            }

            json!({
                "directory": directory,
                "file": target.input,
                "output": target.output,
                "command": command,
            })
        })
        .collect();

    serde_json::Value::Array(entries)
}

/// Write `compile_commands.json` into the build directory.
pub fn write(manager: &BuildManager, compiler: Compiler, build_dir: &Path, profile: &str) -> Result<()> {
    let db = generate(manager, compiler, build_dir, profile);
    let path = build_dir.join("compile_commands.json");
    write_string(&path, &serde_json::to_string_pretty(&db)?)?;
    tracing::info!("compile_commands.json generated at {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::manager::BuildProfile;
    use crate::builder::targets::{CompilationFlags, CompilationUnitType};

    #[test]
    fn test_one_entry_per_target() {
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
            "/abs/src/a.cpp",
            "../../build/debug/muuk/src/a.o",
            &flags,
            CompilationUnitType::Source,
        );

        let db = generate(&manager, Compiler::Clang, Path::new("build/debug"), "debug");
        let entries = db.as_array().unwrap();
        assert_eq!(entries.len(), 1);

        let entry = &entries[0];
        assert_eq!(entry["file"], "/abs/src/a.cpp");
        assert_eq!(entry["output"], "../../build/debug/muuk/src/a.o");

        let command = entry["command"].as_str().unwrap();
        assert!(command.starts_with(
            "clang++ -c /abs/src/a.cpp -o ../../build/debug/muuk/src/a.o"
        ));
        // Profile flags come before target flags.
        let g = command.find("-g").unwrap();
        let wall = command.find("-Wall").unwrap();
        assert!(g < wall);

        let directory = entry["directory"].as_str().unwrap();
        assert!(Path::new(directory).is_absolute());
    }
}
