//! External command execution
//!
//! The merge runs exactly one external tool (the policy compiler). It goes
//! through the [`CommandRunner`] seam so tests can substitute a fake:
//! - `SystemRunner`: spawns the real process and waits for it
//! - `RecordingRunner`: records commands and returns a canned exit code

use std::cell::RefCell;
use std::io;
use std::process::Command;

use tracing::debug;

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, or None if terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Process errors
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("empty command line")]
    EmptyCommand,

    #[error("failed to execute '{program}'. Is it installed? ({source})")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("'{program}' failed with exit code {code:?}: {stderr}")]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// Command-in, output-out interface to external tools
pub trait CommandRunner {
    /// Run `argv[0]` with the remaining arguments and wait for it.
    fn run(&self, argv: &[String]) -> Result<CommandOutput, ProcessError>;
}

/// Run a command and treat a non-zero exit as an error.
pub fn run_checked<R: CommandRunner + ?Sized>(
    runner: &R,
    argv: &[String],
) -> Result<CommandOutput, ProcessError> {
    let program = argv.first().ok_or(ProcessError::EmptyCommand)?.clone();
    let output = runner.run(argv)?;
    if !output.success() {
        return Err(ProcessError::Failed {
            program,
            code: output.code,
            stderr: output.stderr.trim().to_string(),
        });
    }
    Ok(output)
}

/// Runs commands as real child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, argv: &[String]) -> Result<CommandOutput, ProcessError> {
        let (program, args) = argv.split_first().ok_or(ProcessError::EmptyCommand)?;
        debug!(command = %argv.join(" "), "running");

        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|source| ProcessError::Spawn {
                program: program.clone(),
                source,
            })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Records every command instead of running it
#[derive(Debug, Default)]
pub struct RecordingRunner {
    calls: RefCell<Vec<Vec<String>>>,
    exit_code: i32,
    stderr: String,
}

impl RecordingRunner {
    /// A runner whose commands all succeed
    pub fn new() -> Self {
        Self::default()
    }

    /// A runner whose commands all fail with `exit_code`
    pub fn failing(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            exit_code,
            stderr: stderr.into(),
        }
    }

    /// Commands seen so far
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.borrow().clone()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, argv: &[String]) -> Result<CommandOutput, ProcessError> {
        if argv.is_empty() {
            return Err(ProcessError::EmptyCommand);
        }
        self.calls.borrow_mut().push(argv.to_vec());
        Ok(CommandOutput {
            code: Some(self.exit_code),
            stdout: String::new(),
            stderr: self.stderr.clone(),
        })
    }
}
