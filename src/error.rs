//! Typed error values shared across the crate.
//!
//! Errors carry a human-readable message plus a machine-usable code so
//! callers can distinguish "file missing" from "bad schema" without string
//! matching. Operations that can fail in more than one interesting way
//! return `Result<T, Error>`; command-level code wraps these in
//! `anyhow::Result` for context chaining.

use std::fmt;

/// Machine-usable classification of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// A referenced file does not exist.
    FileNotFound,

    /// A `muuk.toml` expected at a given location was not found.
    ManifestNotFound,

    /// A TOML value had the wrong type for its key.
    TomlTypeMismatch,

    /// A required TOML key was absent.
    TomlRequiredKeyMissing,

    /// Anything else.
    Unknown,
}

/// An error value with a message and a code.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct Error {
    pub message: String,
    pub code: ErrorCode,
}

impl Error {
    /// Create an error with the `Unknown` code.
    pub fn new(message: impl Into<String>) -> Self {
        Error {
            message: message.into(),
            code: ErrorCode::Unknown,
        }
    }

    /// Create an error with an explicit code.
    pub fn with_code(message: impl Into<String>, code: ErrorCode) -> Self {
        Error {
            message: message.into(),
            code,
        }
    }

    pub fn file_not_found(path: impl fmt::Display) -> Self {
        Error::with_code(format!("file not found: {path}"), ErrorCode::FileNotFound)
    }

    pub fn manifest_not_found(path: impl fmt::Display) -> Self {
        Error::with_code(
            format!("muuk.toml not found: {path}"),
            ErrorCode::ManifestNotFound,
        )
    }

    pub fn type_mismatch(path: &str, expected: impl fmt::Display, found: impl fmt::Display) -> Self {
        Error::with_code(
            format!("type mismatch at `{path}`: expected {expected}, found {found}"),
            ErrorCode::TomlTypeMismatch,
        )
    }

    pub fn required_key_missing(path: &str) -> Self {
        Error::with_code(
            format!("missing required key: `{path}`"),
            ErrorCode::TomlRequiredKeyMissing,
        )
    }
}

/// Result alias for operations returning a typed [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
