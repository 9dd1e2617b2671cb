//! Dependency fetching.
//!
//! Walks the `[[package]]` entries of `muuk.lock`, shallow-cloning each
//! git source at its pinned ref into `deps/<name>/<version>/`. A
//! `.muuk.hash` marker file makes installation idempotent: its presence
//! means "do not refetch". A failure installing one package logs and moves
//! on to the next.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::util::fs::{ensure_dir, remove_dir_all_if_exists};
use crate::util::process::ProcessBuilder;

/// Install-marker file written after a successful fetch.
pub const HASH_FILE_NAME: &str = ".muuk.hash";

/// Root directory owned by the fetcher.
pub const DEPENDENCY_FOLDER: &str = "deps";

#[derive(Debug, Deserialize)]
struct LockedPackages {
    #[serde(default)]
    package: Vec<LockedPackage>,
}

#[derive(Debug, Deserialize)]
struct LockedPackage {
    name: String,
    version: String,
    #[serde(default)]
    source: String,
}

/// Whether the package at `target_dir` is already installed.
pub fn is_installed(target_dir: &Path) -> bool {
    target_dir.join(HASH_FILE_NAME).exists()
}

fn write_install_marker(target_dir: &Path, name: &str, version: &str, source: &str) -> Result<()> {
    let digest = Sha256::digest(format!("{name}@{version} {source}").as_bytes());
    fs::write(target_dir.join(HASH_FILE_NAME), hex::encode(digest))
        .with_context(|| format!("failed to write install marker in {}", target_dir.display()))
}

/// A pinned ref that is a full commit SHA needs a branchless clone plus an
/// explicit checkout.
fn is_commit_sha(reference: &str) -> bool {
    reference.len() == 40 && reference.chars().all(|c| c.is_ascii_hexdigit())
}

/// Clone `repo_url` into `target_dir` at `checkout_ref`.
///
/// Tags and branches clone shallow (`--depth=1 --branch`). Commit SHAs
/// clone branchless and check out; if the commit is unreachable from the
/// shallow clone, the clone is redone in full. An existing `muuk.toml` in
/// the target survives the re-clone (it may carry local pins for packages
/// that do not ship one).
pub fn clone_at_ref(repo_url: &str, target_dir: &Path, checkout_ref: &str) -> Result<()> {
    let manifest_path = target_dir.join(crate::manifest::MUUK_TOML);
    let parent = target_dir
        .parent()
        .ok_or_else(|| anyhow!("dependency dir has no parent: {}", target_dir.display()))?;
    let backup_path = parent.join("_muuk_backup.toml");

    tracing::info!("cloning {} into {}", repo_url, target_dir.display());

    if manifest_path.exists() {
        ensure_dir(parent)?;
        fs::rename(&manifest_path, &backup_path)
            .with_context(|| "failed to back up existing muuk.toml")?;
    }
    remove_dir_all_if_exists(target_dir)?;
    ensure_dir(parent)?;

    let is_sha = is_commit_sha(checkout_ref);
    let has_ref = !checkout_ref.is_empty() && checkout_ref != "latest";

    let mut clone = ProcessBuilder::new("git").arg("clone").arg("--single-branch");
    if has_ref && !is_sha {
        clone = clone.arg("--depth=1").arg("--branch").arg(checkout_ref);
    }
    clone = clone.arg(repo_url).arg(target_dir);
    clone
        .status()
        .with_context(|| format!("failed to clone repository '{repo_url}'"))?;

    if has_ref {
        let checkout = ProcessBuilder::new("git")
            .cwd(target_dir)
            .args(["-c", "advice.detachedHead=false", "checkout"])
            .arg(checkout_ref);

        if let Err(checkout_err) = checkout.status() {
            if is_sha {
                // The commit may be unreachable from the shallow history;
                // retry with a full clone.
                tracing::warn!(
                    "shallow clone did not contain commit '{}'; retrying with a full clone",
                    checkout_ref
                );
                remove_dir_all_if_exists(target_dir)?;
                ProcessBuilder::new("git")
                    .arg("clone")
                    .arg("--single-branch")
                    .arg(repo_url)
                    .arg(target_dir)
                    .status()
                    .with_context(|| format!("failed to fully clone repository '{repo_url}'"))?;
                ProcessBuilder::new("git")
                    .cwd(target_dir)
                    .arg("checkout")
                    .arg(checkout_ref)
                    .status()
                    .with_context(|| format!("still failed to checkout ref '{checkout_ref}'"))?;
            } else {
                return Err(checkout_err)
                    .with_context(|| format!("failed to checkout ref '{checkout_ref}'"));
            }
        }
    }

    if backup_path.exists() {
        tracing::info!("restoring muuk.toml from backup");
        fs::rename(&backup_path, &manifest_path)
            .with_context(|| "failed to restore muuk.toml backup")?;
    }

    // The checkout is a pinned snapshot, not a working repository.
    remove_dir_all_if_exists(&target_dir.join(".git"))?;

    Ok(())
}

/// Install every git-sourced package pinned in the lockfile.
pub fn install(lock_path: &Path) -> Result<()> {
    let content = fs::read_to_string(lock_path)
        .with_context(|| format!("failed to open lockfile '{}'", lock_path.display()))?;
    let lock: LockedPackages = toml::from_str(&content)
        .with_context(|| format!("failed to parse lockfile '{}'", lock_path.display()))?;

    let root = lock_path.parent().unwrap_or(Path::new("."));

    tracing::info!("found {} dependencies", lock.package.len());
    for package in &lock.package {
        let short = &package.version[..package.version.len().min(8)];
        tracing::info!("  - {} @ {}", package.name, short);
    }

    let mut failures = 0usize;
    for package in &lock.package {
        let Some(git_url) = package.source.strip_prefix("git+") else {
            if package.source.starts_with("path+") {
                tracing::debug!("'{}' is a path dependency; nothing to fetch", package.name);
            } else {
                tracing::warn!("unsupported source format: {}", package.source);
            }
            continue;
        };

        let target_dir: PathBuf = root
            .join(DEPENDENCY_FOLDER)
            .join(&package.name)
            .join(&package.version);

        if target_dir.exists() && is_installed(&target_dir) {
            tracing::info!("'{}' already installed - skipping", package.name);
            continue;
        }

        tracing::info!("installing: {} @ {}", package.name, package.version);
        let result = clone_at_ref(git_url, &target_dir, &package.version).and_then(|()| {
            write_install_marker(&target_dir, &package.name, &package.version, &package.source)
        });

        match result {
            Ok(()) => tracing::info!("installed {} @ {}", package.name, package.version),
            Err(e) => {
                failures += 1;
                tracing::error!("failed to install {}: {:#}", package.name, e);
            }
        }
    }

    if failures > 0 {
        bail!("{failures} dependencies failed to install");
    }
    tracing::info!("all dependencies are installed");
    Ok(())
}

/// Remove a dependency: drop its `[dependencies]` entry from the manifest
/// (format-preserving) and delete its fetched tree. The caller regenerates
/// the lockfile afterwards.
pub fn remove(name: &str, project_root: &Path) -> Result<()> {
    let manifest_path = project_root.join(crate::manifest::MUUK_TOML);
    let content = fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    let mut doc: toml_edit::DocumentMut = content
        .parse()
        .with_context(|| "failed to parse muuk.toml")?;

    let removed = doc
        .get_mut("dependencies")
        .and_then(|item| item.as_table_mut())
        .and_then(|table| table.remove(name))
        .is_some();
    if !removed {
        bail!("package '{name}' is not a dependency");
    }

    fs::write(&manifest_path, doc.to_string())
        .with_context(|| format!("failed to write {}", manifest_path.display()))?;

    remove_dir_all_if_exists(&project_root.join(DEPENDENCY_FOLDER).join(name))?;

    tracing::info!("removed dependency '{}'", name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_is_commit_sha() {
        assert!(is_commit_sha("0123456789abcdef0123456789abcdef01234567"));
        assert!(!is_commit_sha("v1.2.3"));
        assert!(!is_commit_sha("0123456789abcdef"));
        assert!(!is_commit_sha("z123456789abcdef0123456789abcdef01234567"));
        assert!(!is_commit_sha("latest"));
    }

    #[test]
    fn test_install_marker_round_trip() {
        let tmp = TempDir::new().unwrap();
        assert!(!is_installed(tmp.path()));
        write_install_marker(tmp.path(), "fmt", "11.0.2", "git+https://x").unwrap();
        assert!(is_installed(tmp.path()));

        let marker = fs::read_to_string(tmp.path().join(HASH_FILE_NAME)).unwrap();
        assert_eq!(marker.len(), 64);
    }

    #[test]
    fn test_install_skips_installed_packages() {
        // A lockfile whose only package is already marked installed must
        // not touch the network at all.
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("deps/fmt/11.0.2");
        fs::create_dir_all(&target).unwrap();
        write_install_marker(&target, "fmt", "11.0.2", "git+https://invalid.invalid/x").unwrap();

        let lock_path = tmp.path().join("muuk.lock");
        fs::write(
            &lock_path,
            r#"
            [[package]]
            name = "fmt"
            version = "11.0.2"
            source = "git+https://invalid.invalid/x"
            "#,
        )
        .unwrap();

        install(&lock_path).unwrap();
    }

    #[test]
    fn test_install_ignores_path_sources() {
        let tmp = TempDir::new().unwrap();
        let lock_path = tmp.path().join("muuk.lock");
        fs::write(
            &lock_path,
            r#"
            [[package]]
            name = "local"
            version = "0.1"
            source = "path+../local"
            "#,
        )
        .unwrap();

        install(&lock_path).unwrap();
        assert!(!tmp.path().join("deps/local").exists());
    }

    #[test]
    fn test_remove_edits_manifest_and_deletes_tree() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("muuk.toml"),
            "[package]\nname = \"app\"\nversion = \"0.1\"\n\n[dependencies]\nfmt = \"1.0\"\nkeep = \"2.0\"\n",
        )
        .unwrap();
        fs::create_dir_all(tmp.path().join("deps/fmt/1.0")).unwrap();

        remove("fmt", tmp.path()).unwrap();

        let manifest = fs::read_to_string(tmp.path().join("muuk.toml")).unwrap();
        assert!(!manifest.contains("fmt"));
        assert!(manifest.contains("keep = \"2.0\""));
        assert!(!tmp.path().join("deps/fmt").exists());
    }

    #[test]
    fn test_remove_unknown_dependency_errors() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("muuk.toml"),
            "[package]\nname = \"app\"\nversion = \"0.1\"\n",
        )
        .unwrap();
        assert!(remove("ghost", tmp.path()).is_err());
    }
}
