use crate::agents::native_tool::{CommandRunner, Invocation};
use crate::config::is_verbose;
use crate::error::{DepsError, Result};
use crate::oracle::{OutdatedOracle, OutdatedPackage};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Virtualenv directory names checked next to the manifest.
const LOCAL_VENVS: &[&str] = &[".venv", "env", ".env"];

/// Asks the project's own pip which installed packages are outdated.
pub struct PipOracle {
    runner: Arc<dyn CommandRunner>,
    pip_override: Option<PathBuf>,
}

impl PipOracle {
    pub fn new(runner: Arc<dyn CommandRunner>, pip_override: Option<PathBuf>) -> Self {
        Self {
            runner,
            pip_override,
        }
    }

    /// The pip executable for the project in `dir`. Candidates are tried in
    /// order and the first hit wins; plain `pip` from `PATH` is the fallback.
    pub fn locate_pip(&self, dir: &Path) -> Result<PathBuf> {
        if let Some(pip) = &self.pip_override {
            if pip.is_file() {
                return Ok(pip.clone());
            }
            return Err(DepsError::Config(format!(
                "pip override '{}' does not exist",
                pip.display()
            )));
        }

        let probes: [(&str, Box<dyn Fn() -> Option<PathBuf> + '_>); 3] = [
            ("local virtualenv", Box::new(|| local_venv_pip(dir))),
            (
                "pipenv --venv",
                Box::new(|| self.tool_venv_pip(dir, "pipenv", &["--venv"])),
            ),
            (
                "poetry env info -p",
                Box::new(|| self.tool_venv_pip(dir, "poetry", &["env", "info", "-p"])),
            ),
        ];

        let found = probes.iter().find_map(|(label, probe)| {
            let pip = probe()?;
            if is_verbose() {
                eprintln!("[VERBOSE] Using {} from {}", pip.display(), label);
            }
            Some(pip)
        });

        Ok(found.unwrap_or_else(|| {
            if is_verbose() {
                eprintln!(
                    "[VERBOSE] No project environment found in {}, using pip from PATH",
                    dir.display()
                );
            }
            PathBuf::from("pip")
        }))
    }

    fn tool_venv_pip(&self, dir: &Path, program: &str, args: &[&str]) -> Option<PathBuf> {
        let invocation = Invocation::new(
            program,
            args.iter().map(|a| a.to_string()).collect(),
            dir,
        );

        match self.runner.run(&invocation) {
            Ok(output) => {
                let venv = output.stdout.lines().last()?.trim();
                if venv.is_empty() {
                    return None;
                }
                pip_in(Path::new(venv))
            }
            Err(e) => {
                if is_verbose() {
                    eprintln!("[VERBOSE] {} probe skipped: {}", program, e);
                }
                None
            }
        }
    }
}

impl OutdatedOracle for PipOracle {
    fn outdated(&self, dir: &Path) -> Result<Vec<OutdatedPackage>> {
        let pip = self.locate_pip(dir)?;
        let invocation = Invocation::new(
            pip.to_string_lossy(),
            ["list", "--local", "--outdated", "--format=json"]
                .iter()
                .map(|a| a.to_string())
                .collect(),
            dir,
        );

        let output = self.runner.run(&invocation)?;
        if is_verbose() && !output.stderr.trim().is_empty() {
            eprintln!("[VERBOSE] pip: {}", output.stderr.trim());
        }
        let stdout = output.stdout.trim();
        if stdout.is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(stdout).map_err(|e| {
            DepsError::parse(&pip, format!("unexpected `pip list` output: {}", e))
        })
    }
}

fn local_venv_pip(dir: &Path) -> Option<PathBuf> {
    LOCAL_VENVS
        .iter()
        .find_map(|name| pip_in(&dir.join(name)))
}

fn pip_in(venv: &Path) -> Option<PathBuf> {
    let candidate = if cfg!(windows) {
        venv.join("Scripts").join("pip.exe")
    } else {
        venv.join("bin").join("pip")
    };
    candidate.is_file().then_some(candidate)
}
