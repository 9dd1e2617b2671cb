//! Compiler flag normalization.
//!
//! A canonical table maps equivalent flag spellings across GCC, Clang, and
//! MSVC. `normalize_flag` rewrites a flag into the target compiler's
//! spelling; flags with no known equivalent pass through unchanged.
//! Normalization never changes what a flag means, only how it is spelled,
//! and is idempotent.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::core::compiler::Compiler;

/// Broad grouping of a canonical flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagCategory {
    Include,
    Defines,
    Optimization,
    Debugging,
    Output,
    Warnings,
    Advanced,
    Modules,
    Logo,
}

/// One canonical flag with its per-compiler spellings. An empty spelling
/// means the compiler has no equivalent; such flags pass through.
#[derive(Debug, Clone, Copy)]
pub struct FlagInfo {
    pub canonical: &'static str,
    pub category: FlagCategory,
    pub gcc: &'static str,
    pub clang: &'static str,
    pub msvc: &'static str,
}

const fn row(
    canonical: &'static str,
    category: FlagCategory,
    gcc: &'static str,
    clang: &'static str,
    msvc: &'static str,
) -> FlagInfo {
    FlagInfo {
        canonical,
        category,
        gcc,
        clang,
        msvc,
    }
}

/// The canonical flag table. Row order matters: when two rows share a
/// spelling, the first one wins in the lookup maps, so primary (invertible)
/// pairs come before alias rows.
pub static FLAG_TABLE: &[FlagInfo] = &[
    row("include_path", FlagCategory::Include, "-I", "-I", "/I"),
    row("include_system", FlagCategory::Include, "-isystem", "-isystem", ""),
    row("define_macro", FlagCategory::Defines, "-D", "-D", "/D"),
    row("undefine_macro", FlagCategory::Defines, "-U", "-U", "/U"),
    row("opt_O0", FlagCategory::Optimization, "-O0", "-O0", "/Od"),
    row("opt_O2", FlagCategory::Optimization, "-O2", "-O2", "/O2"),
    row("opt_O3", FlagCategory::Optimization, "-O3", "-O3", "/Ox"),
    row("opt_O3_msvc", FlagCategory::Optimization, "-O3", "-O3", "/O3"),
    row("opt_Os", FlagCategory::Optimization, "-Os", "-Os", "/O1"),
    row("opt_Og", FlagCategory::Optimization, "-Og", "-Og", "/Od"),
    row("opt_Ofast", FlagCategory::Optimization, "-Ofast", "-Ofast", "/fp:fast /Ox"),
    row("debug_symbols", FlagCategory::Debugging, "-g", "-g", "/Zi"),
    row("debug_macro_info", FlagCategory::Debugging, "-g3", "-g3", ""),
    row("no_debug_info", FlagCategory::Debugging, "-g0", "-g0", "/DEBUG:NONE"),
    row("compile_only", FlagCategory::Output, "-c", "-c", "/c"),
    row("specify_output", FlagCategory::Output, "-o", "-o", "/Fe"),
    row("object_output", FlagCategory::Output, "-o", "-o", "/Fo"),
    row("assembly_output", FlagCategory::Output, "-S", "-S", "/FA"),
    row("preprocess_only", FlagCategory::Output, "-E", "-E", "/EP"),
    row("warn_none", FlagCategory::Warnings, "-w", "-w", "/W0"),
    row("warn_all", FlagCategory::Warnings, "-Wall", "-Wall", "/W3"),
    row("warn_extra", FlagCategory::Warnings, "-Wextra", "-Wextra", "/W4"),
    row("warn_level1", FlagCategory::Warnings, "-Wall", "-Wall", "/W1"),
    row("warn_level2", FlagCategory::Warnings, "-Wall -Wextra", "-Wall -Wextra", "/W2"),
    row("warn_error", FlagCategory::Warnings, "-Werror", "-Werror", "/WX"),
    row("exceptions", FlagCategory::Advanced, "-fexceptions", "-fexceptions", "/EHsc"),
    row("no_exceptions", FlagCategory::Advanced, "-fno-exceptions", "-fno-exceptions", "/EHs-c-"),
    row("rtti", FlagCategory::Advanced, "-frtti", "-frtti", "/GR"),
    row("no_rtti", FlagCategory::Advanced, "-fno-rtti", "-fno-rtti", "/GR-"),
    row("lto", FlagCategory::Advanced, "-flto", "-flto", "/GL"),
    row("lto_linker", FlagCategory::Advanced, "-flto", "-flto", "/LTCG"),
    row("arch_avx", FlagCategory::Advanced, "-mavx", "-mavx", "/arch:AVX"),
    row("arch_avx2", FlagCategory::Advanced, "-mavx2", "-mavx2", "/arch:AVX2"),
    row("arch_sse2", FlagCategory::Advanced, "-msse2", "-msse2", "/arch:SSE2"),
    row("arch_sse3", FlagCategory::Advanced, "-msse3", "-msse3", "/arch:SSE3"),
    row("march_native", FlagCategory::Advanced, "-march=native", "-march=native", "/arch:AVX2"),
    row("linker_passthrough", FlagCategory::Advanced, "-Wl,", "-Wl,", "/link"),
    row("utf8_source", FlagCategory::Advanced, "-finput-charset=UTF-8", "-finput-charset=UTF-8", "/utf-8"),
    row("shared_lib", FlagCategory::Advanced, "-shared", "-shared", "/LD"),
    row(
        "static_runtime",
        FlagCategory::Advanced,
        "-static-libgcc -static-libstdc++",
        "-static-libgcc -static-libstdc++",
        "/MT",
    ),
    row("parallel_build", FlagCategory::Advanced, "-pipe", "-pipe", "/MP"),
    row("fp_fast", FlagCategory::Advanced, "-ffast-math", "-ffast-math", "/fp:fast"),
    row(
        "fp_precise",
        FlagCategory::Advanced,
        "-fexcess-precision=standard",
        "-fexcess-precision=standard",
        "/fp:precise",
    ),
    row("stack_protector", FlagCategory::Advanced, "-fstack-protector", "-fstack-protector", "/RTC1"),
    row(
        "stack_protector_strong",
        FlagCategory::Advanced,
        "-fstack-protector-strong",
        "-fstack-protector-strong",
        "/GS",
    ),
    row("trap_overflow", FlagCategory::Advanced, "-ftrapv", "-ftrapv", "/RTCc"),
    row("no_inline", FlagCategory::Advanced, "-fno-inline", "-fno-inline", "/Ob0"),
    row("inline_functions", FlagCategory::Advanced, "-finline-functions", "-finline-functions", "/Ob1"),
    row(
        "inline_aggressive",
        FlagCategory::Advanced,
        "-finline-functions -finline-small-functions",
        "-finline-functions -finline-small-functions",
        "/Ob2",
    ),
    row("fortify", FlagCategory::Advanced, "-D_FORTIFY_SOURCE=2", "-D_FORTIFY_SOURCE=2", "/sdl"),
    row(
        "no_incremental_link",
        FlagCategory::Advanced,
        "-Wl,--no-incremental",
        "-Wl,--no-incremental",
        "/INCREMENTAL:NO",
    ),
    row("gc_sections", FlagCategory::Advanced, "-Wl,--gc-sections", "-Wl,--gc-sections", "/OPT:REF"),
    row("icf", FlagCategory::Advanced, "-Wl,--icf=safe", "-Wl,--icf=safe", "/OPT:ICF"),
    row(
        "subsystem_console",
        FlagCategory::Advanced,
        "-Wl,-subsystem,console",
        "-Wl,-subsystem,console",
        "/SUBSYSTEM:CONSOLE",
    ),
    row(
        "subsystem_windows",
        FlagCategory::Advanced,
        "-Wl,-subsystem,windows",
        "-Wl,-subsystem,windows",
        "/SUBSYSTEM:WINDOWS",
    ),
    row("modules_enable", FlagCategory::Modules, "-fmodules-ts", "-fmodules", "/experimental:module"),
    row("no_logo", FlagCategory::Logo, "", "", "/nologo"),
];

/// GCC/Clang spelling -> MSVC spelling.
static GCC_TO_MSVC: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    let mut map = HashMap::new();
    for info in FLAG_TABLE {
        if info.gcc.is_empty() || info.msvc.is_empty() {
            continue;
        }
        map.entry(info.gcc).or_insert(info.msvc);
        map.entry(info.clang).or_insert(info.msvc);
    }
    map
});

/// MSVC spelling -> GCC/Clang spelling.
static MSVC_TO_GCC: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    let mut map = HashMap::new();
    for info in FLAG_TABLE {
        if info.msvc.is_empty() || info.gcc.is_empty() {
            continue;
        }
        map.entry(info.msvc).or_insert(info.gcc);
    }
    map
});

/// Matches both spellings of the C++ standard flag.
static STD_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:/std:c\+\+|-std=c\+\+)(\d+[a-z]?)$").unwrap());

/// Rewrite a flag into the target compiler's spelling.
///
/// Unknown flags pass through; a flag whose target column is empty in the
/// table (no equivalent) also passes through.
pub fn normalize_flag(flag: &str, compiler: Compiler) -> String {
    if flag.is_empty() {
        return String::new();
    }

    // Macro definitions keep their payload; only the prefix changes.
    if let Some(rest) = flag.strip_prefix("-D").or_else(|| flag.strip_prefix("/D")) {
        return match compiler {
            Compiler::Msvc => format!("/D{rest}"),
            _ => format!("-D{rest}"),
        };
    }

    let mut normalized = flag.to_string();
    if !flag.starts_with('/') && !flag.starts_with('-') {
        normalized = format!("{}{}", compiler.flag_prefix(), flag);
    }

    let mapped = match compiler {
        Compiler::Msvc => GCC_TO_MSVC.get(normalized.as_str()),
        _ => MSVC_TO_GCC.get(normalized.as_str()),
    };
    if let Some(&mapped) = mapped {
        return mapped.to_string();
    }

    // Standard flag spelling (-std=c++NN <-> /std:c++NN).
    if let Some(caps) = STD_PATTERN.captures(&normalized) {
        let level = &caps[1];
        return match compiler {
            Compiler::Msvc => format!("/std:c++{level}"),
            _ => format!("-std=c++{level}"),
        };
    }

    normalized
}

/// Normalize a list of flags element-wise.
pub fn normalize_flags(flags: &[String], compiler: Compiler) -> Vec<String> {
    flags
        .iter()
        .map(|flag| normalize_flag(flag, compiler))
        .collect()
}

/// In-place variant of [`normalize_flags`].
pub fn normalize_flags_inplace(flags: &mut [String], compiler: Compiler) {
    for flag in flags.iter_mut() {
        *flag = normalize_flag(flag, compiler);
    }
}
