//! In-process stand-ins for native tools and pip.

use crate::agents::native_tool::{CommandOutput, CommandRunner, Invocation};
use crate::error::{DepsError, Result};
use crate::oracle::{OutdatedOracle, OutdatedPackage};
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct FakeOracle {
    packages: Vec<OutdatedPackage>,
    calls: AtomicUsize,
}

impl FakeOracle {
    /// `(name, installed, latest)` rows.
    pub fn new(rows: &[(&str, &str, &str)]) -> Self {
        Self {
            packages: rows
                .iter()
                .map(|(name, installed, latest)| OutdatedPackage::new(*name, *installed, *latest))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OutdatedOracle for FakeOracle {
    fn outdated(&self, _dir: &Path) -> Result<Vec<OutdatedPackage>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.packages.clone())
    }
}

enum Behavior {
    Stdout(String),
    Fail(String),
    /// Writes `content` to `file_name` in the working directory, like a locker would.
    Write { file_name: String, content: String },
}

/// Records every invocation; succeeds with empty output unless told otherwise.
#[derive(Default)]
pub struct RecordingRunner {
    behaviors: Vec<(String, Behavior)>,
    invocations: Mutex<Vec<Invocation>>,
}

impl RecordingRunner {
    pub fn with_stdout(mut self, program: &str, stdout: &str) -> Self {
        self.behaviors
            .push((program.to_string(), Behavior::Stdout(stdout.to_string())));
        self
    }

    pub fn failing(mut self, program: &str, stderr: &str) -> Self {
        self.behaviors
            .push((program.to_string(), Behavior::Fail(stderr.to_string())));
        self
    }

    pub fn writing(mut self, program: &str, file_name: &str, content: &str) -> Self {
        self.behaviors.push((
            program.to_string(),
            Behavior::Write {
                file_name: file_name.to_string(),
                content: content.to_string(),
            },
        ));
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations
            .lock()
            .map(|recorded| recorded.clone())
            .unwrap_or_default()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        if let Ok(mut recorded) = self.invocations.lock() {
            recorded.push(invocation.clone());
        }

        let behavior = self
            .behaviors
            .iter()
            .find(|(program, _)| *program == invocation.program)
            .map(|(_, behavior)| behavior);

        match behavior {
            None => Ok(CommandOutput::default()),
            Some(Behavior::Stdout(stdout)) => Ok(CommandOutput {
                stdout: stdout.clone(),
                stderr: String::new(),
            }),
            Some(Behavior::Fail(stderr)) => Err(DepsError::NativeTool {
                command: invocation.command_line(),
                dir: invocation.cwd.clone(),
                status: "exit code 1".to_string(),
                stderr: stderr.clone(),
            }),
            Some(Behavior::Write { file_name, content }) => {
                fs::write(invocation.cwd.join(file_name), content)?;
                Ok(CommandOutput::default())
            }
        }
    }
}
