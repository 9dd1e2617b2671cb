//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// Muuk - a Cargo-like package manager and build orchestrator for C++
#[derive(Parser)]
#[command(name = "muuk")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output (debug/info)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a muuk package in the current directory
    Init(InitArgs),

    /// Add a dependency to muuk.toml
    Add(AddArgs),

    /// Remove a dependency from muuk.toml
    Remove(RemoveArgs),

    /// Resolve dependencies, write muuk.lock, and fetch pinned packages
    Install,

    /// Generate the build plan and run the build
    Build(BuildArgs),

    /// Remove build artifacts
    Clean,

    /// Run a script declared in [scripts]
    Run(RunArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct InitArgs {
    /// Package name (defaults to the directory name)
    pub name: Option<String>,
}

#[derive(Args)]
pub struct AddArgs {
    /// Dependency spec: `<author>/<repo>` or a bare name with --git
    pub spec: String,

    /// Pinned version (commit SHA, tag, or version string)
    #[arg(long)]
    pub version: Option<String>,

    /// Git repository URL (defaults to GitHub from the spec)
    #[arg(long)]
    pub git: Option<String>,

    /// Local directory containing the dependency's muuk.toml
    #[arg(long = "muuk-path")]
    pub muuk_path: Option<String>,

    /// Resolve against the ambient toolchain instead of fetching
    #[arg(long = "sys")]
    pub system: bool,

    /// Also reference the dependency from a named [[build]] entry
    #[arg(long)]
    pub target: Option<String>,
}

#[derive(Args)]
pub struct RemoveArgs {
    /// Dependency name
    pub name: String,
}

#[derive(Args)]
pub struct BuildArgs {
    /// Build a single named target
    #[arg(short, long)]
    pub target: Option<String>,

    /// Compiler: gcc, clang, or msvc (defaults per platform)
    #[arg(short, long)]
    pub compiler: Option<String>,

    /// Profile: e.g. debug or release (defaults to the default profile)
    #[arg(short, long)]
    pub profile: Option<String>,
}

#[derive(Args)]
pub struct RunArgs {
    /// Script name from [scripts]
    pub script: String,

    /// Arguments passed through to the script
    #[arg(trailing_var_arg = true)]
    pub args: Vec<String>,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
