//! Compiler descriptor: toolchain family, C++ standard, link kinds.

use std::fmt;
use std::str::FromStr;

use anyhow::bail;
use serde::{Deserialize, Serialize};

/// Supported compiler families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Compiler {
    Gcc,
    Clang,
    Msvc,
}

impl Compiler {
    /// Invocation name of the C++ compiler driver.
    pub fn command(&self) -> &'static str {
        match self {
            Compiler::Gcc => "g++",
            Compiler::Clang => "clang++",
            Compiler::Msvc => "cl",
        }
    }

    /// Archiver matching this compiler.
    pub fn archiver(&self) -> &'static str {
        match self {
            Compiler::Msvc => "lib",
            Compiler::Clang => {
                if cfg!(windows) {
                    "llvm-ar"
                } else {
                    "ar"
                }
            }
            Compiler::Gcc => "ar",
        }
    }

    /// Linker matching this compiler. GCC and Clang link through the
    /// compiler driver; MSVC has a dedicated linker.
    pub fn linker(&self) -> &'static str {
        match self {
            Compiler::Msvc => "link",
            other => other.command(),
        }
    }

    /// The manifest key naming this compiler family
    /// (`[library.compiler.<key>]`).
    pub fn key(&self) -> &'static str {
        match self {
            Compiler::Gcc => "gcc",
            Compiler::Clang => "clang",
            Compiler::Msvc => "msvc",
        }
    }

    /// File extension of precompiled module artifacts.
    pub fn module_ext(&self) -> &'static str {
        match self {
            Compiler::Msvc => "ifc",
            Compiler::Clang => "pcm",
            Compiler::Gcc => "gcm",
        }
    }

    /// The flag prefix this compiler conventionally uses.
    pub fn flag_prefix(&self) -> char {
        match self {
            Compiler::Msvc => '/',
            _ => '-',
        }
    }
}

impl FromStr for Compiler {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "g++" | "gcc" => Ok(Compiler::Gcc),
            "clang++" | "clang" => Ok(Compiler::Clang),
            "cl" | "msvc" => Ok(Compiler::Msvc),
            other => bail!(
                "unknown compiler: {other}. Acceptable compilers are `gcc`, `clang` and `msvc`"
            ),
        }
    }
}

impl fmt::Display for Compiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.command())
    }
}

/// C++ language standard, ordered by year.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CxxStandard {
    #[default]
    Unknown,
    Cpp98,
    Cpp03,
    Cpp11,
    Cpp14,
    Cpp17,
    Cpp20,
    Cpp23,
    Cpp26,
}

impl CxxStandard {
    /// Parse the trailing two characters of a standard spelling
    /// (`"20"`, `"c++20"`, `"2a"`, ...). Unrecognized input yields
    /// `Unknown`.
    pub fn parse(s: &str) -> CxxStandard {
        if s.len() < 2 {
            return CxxStandard::Unknown;
        }
        match &s[s.len() - 2..] {
            "98" => CxxStandard::Cpp98,
            "03" => CxxStandard::Cpp03,
            "0x" | "11" => CxxStandard::Cpp11,
            "1y" | "14" => CxxStandard::Cpp14,
            "1z" | "17" => CxxStandard::Cpp17,
            "2a" | "20" => CxxStandard::Cpp20,
            "2b" | "23" => CxxStandard::Cpp23,
            "2c" | "26" => CxxStandard::Cpp26,
            _ => CxxStandard::Unknown,
        }
    }

    fn two_digit(&self) -> Option<&'static str> {
        match self {
            CxxStandard::Cpp98 => Some("98"),
            CxxStandard::Cpp03 => Some("03"),
            CxxStandard::Cpp11 => Some("11"),
            CxxStandard::Cpp14 => Some("14"),
            CxxStandard::Cpp17 => Some("17"),
            CxxStandard::Cpp20 => Some("20"),
            CxxStandard::Cpp23 => Some("23"),
            CxxStandard::Cpp26 => Some("26"),
            CxxStandard::Unknown => None,
        }
    }

    /// Render as a compiler flag. MSVC falls back to `/std:c++latest` for
    /// standards it does not spell out; GCC/Clang default to C++20 for
    /// `Unknown`.
    pub fn to_flag(&self, compiler: Compiler) -> String {
        match compiler {
            Compiler::Msvc => match self {
                CxxStandard::Cpp26 | CxxStandard::Unknown => "/std:c++latest".to_string(),
                other => format!("/std:c++{}", other.two_digit().unwrap()),
            },
            _ => match self.two_digit() {
                Some(digits) => format!("-std=c++{digits}"),
                None => "-std=c++20".to_string(),
            },
        }
    }
}

impl fmt::Display for CxxStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.two_digit() {
            Some(digits) => write!(f, "C++{digits}"),
            None => f.write_str("Unknown"),
        }
    }
}

/// Manifest-level link preference of a library.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LinkType {
    #[default]
    Static,
    Shared,
    NoLink,
}

impl LinkType {
    pub fn parse(s: &str) -> LinkType {
        match s {
            "shared" => LinkType::Shared,
            "no_link" => LinkType::NoLink,
            _ => LinkType::Static,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LinkType::Static => "static",
            LinkType::Shared => "shared",
            LinkType::NoLink => "no_link",
        }
    }
}

/// Link kind of a `[[build]]` output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BuildLinkType {
    #[default]
    Executable,
    Static,
    Shared,
}

impl BuildLinkType {
    pub fn parse(s: &str) -> BuildLinkType {
        match s {
            "static" => BuildLinkType::Static,
            "shared" => BuildLinkType::Shared,
            _ => BuildLinkType::Executable,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BuildLinkType::Executable => "binary",
            BuildLinkType::Static => "static",
            BuildLinkType::Shared => "shared",
        }
    }
}

/// Object file extension for the host platform.
pub const OBJ_EXT: &str = if cfg!(windows) { "obj" } else { "o" };

/// Static library extension for the host platform.
pub const LIB_EXT: &str = if cfg!(windows) { ".lib" } else { ".a" };

/// Executable suffix for the host platform.
pub const EXE_EXT: &str = if cfg!(windows) { ".exe" } else { "" };

/// The host platform key used by `[platform.<key>]` tables.
pub fn host_platform() -> &'static str {
    if cfg!(windows) {
        "windows"
    } else if cfg!(target_os = "macos") {
        "apple"
    } else {
        "linux"
    }
}

/// Default compiler for the host platform (`cl` on Windows, `clang++` on
/// macOS, `g++` elsewhere).
pub fn default_compiler() -> Compiler {
    if cfg!(windows) {
        Compiler::Msvc
    } else if cfg!(target_os = "macos") {
        Compiler::Clang
    } else {
        Compiler::Gcc
    }
}

/// Probe PATH for any usable compiler driver.
pub fn detect_compiler() -> anyhow::Result<Compiler> {
    for candidate in ["g++", "clang++", "cl"] {
        if which::which(candidate).is_ok() {
            tracing::info!("found compiler: {}", candidate);
            return candidate.parse();
        }
    }
    bail!("no compatible C++ compiler found on PATH. Install GCC, Clang, or MSVC.")
}
