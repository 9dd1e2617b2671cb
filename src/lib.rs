//! Muuk - a Cargo-like package manager and build orchestrator for C++.
//!
//! Muuk resolves a declarative `muuk.toml` manifest and its transitive
//! dependencies into a lockfile and a deterministic Ninja build plan,
//! including C++20 named-module ordering and cross-compiler flag
//! normalization.

pub mod builder;
pub mod core;
pub mod error;
pub mod lockgen;
pub mod manifest;
pub mod ops;
pub mod sources;
pub mod util;

pub use crate::core::{BuildLinkType, Compiler, CxxStandard, LinkType};
pub use error::{Error, ErrorCode};
pub use lockgen::LockGenerator;
pub use manifest::{Build, Dependency, External, Library, Package, Profile};
