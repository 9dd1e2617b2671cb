//! Subprocess execution.
//!
//! External tools (`git`, `clang-scan-deps`, `ninja`) are invoked
//! synchronously; a non-zero exit surfaces as an error carrying the full
//! command line and exit code.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    cwd: Option<PathBuf>,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            cwd: None,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    /// The full command line, for logging and error messages.
    pub fn command_line(&self) -> String {
        let mut line = self.program.to_string_lossy().into_owned();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }
        cmd
    }

    /// Run the command, inheriting stdout/stderr, and fail on a non-zero
    /// exit.
    pub fn status(&self) -> Result<()> {
        tracing::debug!("running: {}", self.command_line());

        let status = self
            .build_command()
            .status()
            .with_context(|| format!("failed to spawn `{}`", self.program.display()))?;

        if !status.success() {
            bail!(
                "command `{}` exited with status {}",
                self.command_line(),
                status.code().map_or_else(|| "signal".to_string(), |c| c.to_string())
            );
        }
        Ok(())
    }

    /// Run the command, capture stdout, and fail on a non-zero exit.
    pub fn output(&self) -> Result<String> {
        tracing::debug!("running: {}", self.command_line());

        let output = self
            .build_command()
            .stdout(Stdio::piped())
            .output()
            .with_context(|| format!("failed to spawn `{}`", self.program.display()))?;

        if !output.status.success() {
            bail!(
                "command `{}` exited with status {}",
                self.command_line(),
                output
                    .status
                    .code()
                    .map_or_else(|| "signal".to_string(), |c| c.to_string())
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
