//! C++20 named-module dependency discovery.
//!
//! A compilation database is synthesized over the registered compilation
//! targets and fed to `clang-scan-deps` in P1689 format. Each rule's
//! `provides` attaches a logical module name to the target producing the
//! rule's primary output; each `requires` with a source path adds a
//! dependency edge from the requiring target to the provider. The
//! resulting edge graph must be acyclic.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use petgraph::graph::DiGraph;
use serde::Deserialize;
use serde_json::json;

use crate::builder::manager::BuildManager;
use crate::core::flags::normalize_flag;
use crate::core::Compiler;
use crate::util::fs::{absolute_forward_slash, to_forward_slash, write_string};
use crate::util::process::ProcessBuilder;

/// P1689 output of `clang-scan-deps`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScanOutput {
    #[serde(default)]
    pub rules: Vec<ScanRule>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScanRule {
    #[serde(default, rename = "primary-output")]
    pub primary_output: Option<String>,

    #[serde(default)]
    pub provides: Vec<ScanProvides>,

    #[serde(default, rename = "requires")]
    pub requires: Vec<ScanRequires>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScanProvides {
    #[serde(default, rename = "logical-name")]
    pub logical_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScanRequires {
    #[serde(default, rename = "logical-name")]
    pub logical_name: String,

    /// Present when the provider is one of our own sources; absent for
    /// third-party modules.
    #[serde(default, rename = "source-path")]
    pub source_path: Option<String>,
}

/// Synthesize the compilation database handed to `clang-scan-deps`. A
/// module-friendly Clang command line is used regardless of the selected
/// build compiler; only dependency structure is extracted from it.
pub fn scan_database(manager: &BuildManager, build_dir: &Path) -> serde_json::Value {
    let directory = absolute_forward_slash(&to_forward_slash(build_dir.to_string_lossy()));

    let entries: Vec<serde_json::Value> = manager
        .compilation_targets()
        .iter()
        .map(|target| {
            let mut command = String::from("clang++ -x c++-module --std=c++23");
            for flag in &target.flags {
                let mut normalized = normalize_flag(flag, Compiler::Clang);
                if let Some(include) = normalized.strip_prefix("-I") {
                    if !Path::new(include).is_absolute() {
                        // Scan paths resolve against the build directory.
                        normalized = format!("-I{directory}/{include}");
                    }
                }
                command.push(' ');
                command.push_str(&normalized);
            }
            command.push(' ');
            command.push_str(&target.input);
            command.push_str(" -o ");
            command.push_str(&target.output);

            json!({
                "directory": directory,
                "command": command,
                "file": target.input,
                "output": target.output,
            })
        })
        .collect();

    serde_json::Value::Array(entries)
}

/// Wire the scan results into the manager: logical names onto providers,
/// dependency edges onto requirers. Requirements with no known provider
/// warn and are skipped.
pub fn apply_scan_results(manager: &mut BuildManager, scan: &ScanOutput) {
    for rule in &scan.rules {
        let Some(primary_output) = rule.primary_output.as_deref() else {
            continue;
        };
        let Some(index) = manager.find_by_output(primary_output) else {
            continue;
        };

        for provide in &rule.provides {
            if provide.logical_name.is_empty() {
                continue;
            }
            manager.set_logical_name(index, &provide.logical_name);
            tracing::info!(
                "associated module '{}' with target '{}'",
                provide.logical_name,
                primary_output
            );
        }
    }

    for rule in &scan.rules {
        let Some(primary_output) = rule.primary_output.as_deref() else {
            continue;
        };
        let Some(index) = manager.find_by_output(primary_output) else {
            continue;
        };

        for require in &rule.requires {
            let Some(source_path) = require.source_path.as_deref() else {
                tracing::warn!(
                    "module '{}' required by '{}' is not provided by any known target",
                    require.logical_name,
                    primary_output
                );
                continue;
            };

            match manager.find_by_input(source_path) {
                Some(provider) => {
                    manager.add_dependency(index, provider);
                    tracing::info!(
                        "target '{}' requires '{}'",
                        primary_output,
                        source_path
                    );
                }
                None => tracing::warn!(
                    "could not find compilation target for required module '{}'",
                    source_path
                ),
            }
        }
    }
}

/// The module edge graph must be acyclic; a cycle is a fatal error naming
/// the participating outputs.
pub fn check_acyclic(manager: &BuildManager) -> Result<()> {
    let mut graph = DiGraph::<usize, ()>::new();
    let nodes: Vec<_> = (0..manager.compilation_targets().len())
        .map(|i| graph.add_node(i))
        .collect();

    for (index, target) in manager.compilation_targets().iter().enumerate() {
        for &dep in &target.dependencies {
            graph.add_edge(nodes[dep], nodes[index], ());
        }
    }

    if petgraph::algo::toposort(&graph, None).is_err() {
        let members: Vec<String> = petgraph::algo::tarjan_scc(&graph)
            .into_iter()
            .find(|scc| scc.len() > 1)
            .map(|scc| {
                scc.into_iter()
                    .map(|node| manager.target(graph[node]).output.clone())
                    .collect()
            })
            .unwrap_or_default();
        return Err(anyhow!(
            "cycle detected in module dependencies: {}",
            members.join(" -> ")
        ));
    }
    Ok(())
}

/// Full module resolution: write the scan database, run
/// `clang-scan-deps`, and apply the discovered edges.
pub fn resolve_modules(manager: &mut BuildManager, build_dir: &Path) -> Result<()> {
    let db_path = build_dir.join("dependency-db.json");
    let db = scan_database(manager, build_dir);
    write_string(&db_path, &serde_json::to_string_pretty(&db)?)
        .with_context(|| "failed to write module scan database")?;
    tracing::info!("compilation database written to {}", db_path.display());

    let output = ProcessBuilder::new("clang-scan-deps")
        .arg("-format=p1689")
        .arg("-compilation-database")
        .arg(&db_path)
        .output()
        .with_context(|| "failed to run clang-scan-deps")?;

    let scan: ScanOutput = serde_json::from_str(&output)
        .with_context(|| "failed to parse clang-scan-deps output")?;

    apply_scan_results(manager, &scan);
    check_acyclic(manager)
}
