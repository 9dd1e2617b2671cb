//! The manifest model: typed configuration nodes and their merge algebra.

pub mod base;
pub mod build;
pub mod dependency;
pub mod library;
pub mod package;
pub mod profile;
pub mod validate;

use std::path::Path;

use crate::error::{Error, Result};

pub use base::{BaseFields, Compilers, FieldSet, Platforms, SourceFile};
pub use build::Build;
pub use dependency::{Dependency, DependencyMap, SharedDependency, SharedDependencyMap};
pub use library::{External, ExternalOutput, Library};
pub use package::{Feature, Package, Source};
pub use profile::Profile;

/// The manifest file name.
pub const MUUK_TOML: &str = "muuk.toml";

/// The Cargo-style lockfile name.
pub const MUUK_LOCK: &str = "muuk.lock";

/// The build-plan cache name.
pub const MUUK_LOCK_CACHE: &str = "muuk.lock.toml";

/// Read and parse a TOML file into a `toml::Value`, with typed errors for
/// the missing-file and parse-failure cases.
pub fn parse_toml_file(path: &Path) -> Result<toml::Value> {
    if !path.exists() {
        if path.file_name().and_then(|n| n.to_str()) == Some(MUUK_TOML) {
            return Err(Error::manifest_not_found(path.display()));
        }
        return Err(Error::file_not_found(path.display()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::new(format!("failed to read {}: {e}", path.display())))?;

    content
        .parse::<toml::Value>()
        .map_err(|e| Error::new(format!("failed to parse {}: {e}", path.display())))
}

/// Read, parse, and schema-validate a `muuk.toml`.
pub fn load_manifest(path: &Path) -> Result<toml::Value> {
    let data = parse_toml_file(path)?;
    validate::validate_muuk_toml(&data)?;
    Ok(data)
}
