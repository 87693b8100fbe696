//! Process execution for Kole.
//!
//! Every compile, link and run command goes through an [`Executor`], so the
//! pipeline can be driven by a recording fake in tests.

use std::process::Command;

use crate::error::UtilError;

/// Runs a shell command line and reports its exit code.
pub trait Executor: Sync {
    /// Run `command_line` to completion and return its exit code.
    ///
    /// A non-zero exit code is **not** an error; the caller decides what it means.
    ///
    /// # Errors
    /// Returns an error if the command cannot be spawned at all.
    fn run(&self, command_line: &str) -> Result<i32, UtilError>;
}

/// Executes command lines through the platform shell with inherited stdio.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellExecutor;

impl ShellExecutor {
    fn shell_command(command_line: &str) -> Command {
        if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(command_line);
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(command_line);
            cmd
        }
    }
}

impl Executor for ShellExecutor {
    fn run(&self, command_line: &str) -> Result<i32, UtilError> {
        let status = Self::shell_command(command_line)
            .status()
            .map_err(|source| UtilError::CommandExec {
                command: command_line.to_owned(),
                source,
            })?;

        // Killed by a signal: no code, report a generic failure.
        Ok(status.code().unwrap_or(-1))
    }
}
