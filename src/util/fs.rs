//! Filesystem and path utilities.
//!
//! Paths are canonicalized to forward-slash form everywhere inside the tool;
//! Windows drive letters are only escaped at build-file emission time.

use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};

/// Convert a path to forward-slash form.
pub fn to_forward_slash(path: impl AsRef<str>) -> String {
    path.as_ref().replace('\\', "/")
}

/// Lexically normalize a path: resolve `.` and `..` components without
/// touching the filesystem.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(out.components().next_back(), Some(Component::Normal(_)));
                if popped {
                    out.pop();
                } else {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Join a possibly relative entry onto a base directory and return the
/// normalized forward-slash form.
pub fn join_normalized(base: &Path, entry: &str) -> String {
    let joined = if Path::new(entry).is_absolute() {
        PathBuf::from(entry)
    } else {
        base.join(entry)
    };
    to_forward_slash(normalize_lexically(&joined).to_string_lossy())
}

/// Prefix a relative path so it resolves from two directories down.
/// The generated build file lives in `build/<profile>/` and the runner
/// executes with that directory as its working directory. Absolute paths
/// are returned unchanged.
pub fn build_relative(path: impl AsRef<str>) -> String {
    let path = to_forward_slash(path);
    if Path::new(&path).is_absolute() {
        path
    } else {
        format!("../../{path}")
    }
}

/// Escape a Windows drive letter for Ninja (`C:` -> `C$:`).
///
/// Only applied when emitting build files; internal paths keep the plain
/// spelling.
pub fn escape_drive_letter(path: &str) -> String {
    let bytes = path.as_bytes();
    if bytes.len() > 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
        format!("{}$:{}", &path[..1], &path[2..])
    } else {
        path.to_string()
    }
}

/// Return an absolute forward-slash form of `path`, resolved against the
/// current directory when relative. Does not require the path to exist.
pub fn absolute_forward_slash(path: &str) -> String {
    let p = Path::new(path);
    let abs = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(p))
            .unwrap_or_else(|_| p.to_path_buf())
    };
    to_forward_slash(normalize_lexically(&abs).to_string_lossy())
}

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Remove a directory and all its contents, if it exists.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .with_context(|| format!("failed to remove directory: {}", path.display()))?;
    }
    Ok(())
}

/// Read a file to string, with a path-carrying error message.
pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read file: {}", path.display()))
}

/// Write a string to a file as a whole-file replacement, creating parent
/// directories if needed.
pub fn write_string(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, contents)
        .with_context(|| format!("failed to write file: {}", path.display()))
}

/// Whether a path string contains glob metacharacters.
pub fn is_glob_pattern(path: &str) -> bool {
    path.contains(['*', '?', '['])
}

/// Expand a path entry: glob patterns match against the filesystem, literal
/// paths pass through unchanged (they may not exist yet at plan time).
pub fn expand_glob(path: &str) -> Vec<String> {
    if !is_glob_pattern(path) {
        return vec![path.to_string()];
    }

    match glob::glob(path) {
        Ok(entries) => {
            let mut expanded: Vec<String> = entries
                .filter_map(|entry| match entry {
                    Ok(p) => Some(to_forward_slash(p.to_string_lossy())),
                    Err(e) => {
                        tracing::warn!("glob error while expanding '{}': {}", path, e);
                        None
                    }
                })
                .collect();
            expanded.sort();
            expanded
        }
        Err(e) => {
            tracing::warn!("invalid glob pattern '{}': {}", path, e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_lexically() {
        assert_eq!(
            normalize_lexically(Path::new("a/b/../c/./d")),
            PathBuf::from("a/c/d")
        );
        assert_eq!(
            normalize_lexically(Path::new("./src/a.cpp")),
            PathBuf::from("src/a.cpp")
        );
        assert_eq!(normalize_lexically(Path::new("../x")), PathBuf::from("../x"));
    }

    #[test]
    fn test_join_normalized() {
        assert_eq!(
            join_normalized(Path::new("deps/fmt/10.0"), "src/format.cc"),
            "deps/fmt/10.0/src/format.cc"
        );
        assert_eq!(join_normalized(Path::new("."), "src/a.cpp"), "src/a.cpp");
    }

    #[test]
    fn test_build_relative() {
        assert_eq!(build_relative("build/debug/x.o"), "../../build/debug/x.o");
        assert_eq!(build_relative("/abs/x.o"), "/abs/x.o");
    }

    #[test]
    fn test_escape_drive_letter() {
        assert_eq!(escape_drive_letter("C:/work/a.cpp"), "C$:/work/a.cpp");
        assert_eq!(escape_drive_letter("src/a.cpp"), "src/a.cpp");
        assert_eq!(escape_drive_letter("c:"), "c:");
    }

    #[test]
    fn test_expand_glob_literal_passthrough() {
        // A literal path need not exist to survive expansion.
        let expanded = expand_glob("src/nonexistent.cpp");
        assert_eq!(expanded, vec!["src/nonexistent.cpp".to_string()]);
    }

    #[test]
    fn test_expand_glob_matches_files() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("a.cpp"), "").unwrap();
        fs::write(src.join("b.cpp"), "").unwrap();
        fs::write(src.join("notes.txt"), "").unwrap();

        let pattern = format!(
            "{}/src/*.cpp",
            to_forward_slash(tmp.path().to_string_lossy())
        );
        let expanded = expand_glob(&pattern);
        assert_eq!(expanded.len(), 2);
        assert!(expanded[0].ends_with("a.cpp"));
    }
}
