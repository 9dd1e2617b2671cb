//! High-level operations behind the CLI subcommands.

pub mod add;
pub mod build;
pub mod clean;
pub mod init;
pub mod install;
pub mod remove;
pub mod run;

pub use add::AddOptions;
pub use build::BuildOptions;
