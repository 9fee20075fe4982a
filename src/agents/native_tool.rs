use crate::config::is_verbose;
use crate::error::{DepsError, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::Duration;

/// A native tool command line bound to the directory it must run in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl Invocation {
    pub fn new<P: AsRef<Path>>(program: impl Into<String>, args: Vec<String>, cwd: P) -> Self {
        Self {
            program: program.into(),
            args,
            cwd: cwd.as_ref().to_path_buf(),
        }
    }

    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Executes native tools (`pipenv`, `poetry`, `pip`).
pub trait CommandRunner: Send + Sync {
    /// Runs the invocation to completion. A missing executable or a non-zero
    /// exit is a [`DepsError::NativeTool`].
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput>;
}

/// Runs commands as blocking child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    fn spinner(invocation: &Invocation) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("  {spinner} {msg} ({elapsed})") {
            pb.set_style(style);
        }
        pb.set_message(format!("Running {}", invocation.command_line()));
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    }

    fn ensure_success(invocation: &Invocation, output: Output) -> Result<CommandOutput> {
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if output.status.success() {
            return Ok(CommandOutput { stdout, stderr });
        }

        let status = match output.status.code() {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        };

        Err(DepsError::NativeTool {
            command: invocation.command_line(),
            dir: invocation.cwd.clone(),
            status,
            stderr: stderr.trim().to_string(),
        })
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        if is_verbose() {
            eprintln!(
                "[VERBOSE] Executing `{}` in {}",
                invocation.command_line(),
                invocation.cwd.display()
            );
        }

        let pb = Self::spinner(invocation);
        let output = Command::new(&invocation.program)
            .current_dir(&invocation.cwd)
            .args(&invocation.args)
            .output();
        pb.finish_and_clear();

        let output = output.map_err(|e| DepsError::NativeTool {
            command: invocation.command_line(),
            dir: invocation.cwd.clone(),
            status: "not started".to_string(),
            stderr: e.to_string(),
        })?;

        Self::ensure_success(invocation, output)
    }
}
