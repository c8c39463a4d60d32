use std::ffi::OsString;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use log::{debug, error};
use thiserror::Error;

pub mod command;
pub mod env;
pub mod lifecycle;
pub mod scripted;

pub use command::{CommandOutcome, OutputMode, RunnerCommand};
pub use env::DesktopUser;
pub use lifecycle::DetachedSession;
pub use scripted::ScriptedRunner;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("{step} failed (exit code {code}){detail}")]
    StepFailed {
        step: String,
        code: i32,
        detail: String,
    },
}

/// Seam between orchestration logic and the host's external tools.
pub trait CommandRunner {
    fn run(&self, command: &RunnerCommand) -> Result<CommandOutcome>;
    fn spawn_detached(&self, command: &RunnerCommand) -> Result<DetachedSession>;
    fn locate(&self, program: &str) -> Option<PathBuf>;

    fn is_available(&self, program: &str) -> bool {
        self.locate(program).is_some()
    }
}

/// Runs `command` and turns a non-zero exit into a `RunnerError::StepFailed` naming `step`.
pub fn run_step(
    runner: &dyn CommandRunner,
    step: &str,
    command: &RunnerCommand,
) -> Result<CommandOutcome> {
    let outcome = runner.run(command)?;
    if outcome.success() {
        return Ok(outcome);
    }
    let stderr = outcome.stderr.trim();
    error!("{step}: `{command}` exited with {}: {stderr}", outcome.exit_code());
    let detail = if stderr.is_empty() {
        String::new()
    } else {
        format!(": {}", stderr.lines().last().unwrap_or(stderr))
    };
    Err(RunnerError::StepFailed {
        step: step.to_string(),
        code: outcome.exit_code(),
        detail,
    }
    .into())
}

pub struct SystemRunner {
    search_path: Option<OsString>,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self {
            search_path: std::env::var_os("PATH"),
        }
    }

    fn build(&self, command: &RunnerCommand) -> Command {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args);
        if let Some(dir) = &command.cwd {
            cmd.current_dir(dir);
        }
        for (key, value) in &command.env {
            cmd.env(key, value);
        }
        cmd
    }
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, command: &RunnerCommand) -> Result<CommandOutcome> {
        debug!("run: {command}");
        let mut cmd = self.build(command);
        match command.output {
            OutputMode::Captured => {
                let output = cmd
                    .stdin(Stdio::null())
                    .output()
                    .with_context(|| format!("launch {}", command.program))?;
                Ok(CommandOutcome {
                    code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                })
            }
            OutputMode::Inherited => {
                let status = cmd
                    .status()
                    .with_context(|| format!("launch {}", command.program))?;
                Ok(CommandOutcome {
                    code: status.code(),
                    stdout: String::new(),
                    stderr: String::new(),
                })
            }
        }
    }

    fn spawn_detached(&self, command: &RunnerCommand) -> Result<DetachedSession> {
        debug!("spawn detached: {command}");
        let child = self
            .build(command)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .process_group(0)
            .spawn()
            .with_context(|| format!("launch {}", command.program))?;
        Ok(DetachedSession {
            pid: child.id(),
            command: command.to_string(),
        })
    }

    fn locate(&self, program: &str) -> Option<PathBuf> {
        if program.contains('/') {
            let path = PathBuf::from(program);
            return path.is_file().then_some(path);
        }

        let mut candidates = Vec::new();
        if let Some(paths) = &self.search_path {
            candidates.extend(std::env::split_paths(paths));
        }
        candidates.extend([
            PathBuf::from("/usr/local/sbin"),
            PathBuf::from("/usr/sbin"),
            PathBuf::from("/sbin"),
            PathBuf::from("/usr/bin"),
        ]);

        candidates
            .into_iter()
            .map(|dir| dir.join(program))
            .find(|candidate| candidate.is_file())
    }
}
