use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};
use thiserror::Error;

use runner::{run_step, CommandRunner, RunnerCommand};
use waydock_core::apps::{AppSelection, AppToken};
use waydock_core::config::HelperConfig;

/// Written inside the venv once its requirements installed cleanly.
const READY_MARKER: &str = ".waydock-ready";

/// Failing setup steps surface as `runner::RunnerError::StepFailed`.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("helper tool is not installed at {0}; run `waydock setup` first")]
    NotInstalled(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelperCommand {
    Install,
    Uninstall,
    Hack,
    Certified,
}

impl HelperCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            HelperCommand::Install => "install",
            HelperCommand::Uninstall => "uninstall",
            HelperCommand::Hack => "hack",
            HelperCommand::Certified => "certified",
        }
    }
}

impl fmt::Display for HelperCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Local checkout of the external app-installer, run inside its own venv.
pub struct HelperBridge<'a> {
    runner: &'a dyn CommandRunner,
    config: &'a HelperConfig,
    dir: PathBuf,
}

impl<'a> HelperBridge<'a> {
    pub fn new(runner: &'a dyn CommandRunner, config: &'a HelperConfig, dir: PathBuf) -> Self {
        Self { runner, config, dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn venv_python(&self) -> PathBuf {
        self.dir.join("venv").join("bin").join("python3")
    }

    fn ready_marker(&self) -> PathBuf {
        self.dir.join("venv").join(READY_MARKER)
    }

    /// A checkout with a venv whose requirements finished installing.
    pub fn is_present(&self) -> bool {
        self.dir.join(".git").exists() && self.venv_python().exists() && self.ready_marker().exists()
    }

    /// Clones when absent and pulls only when `update` is set. Requirements are
    /// (re)installed when the venv is new, not marked ready, or an update was
    /// requested. Any failing step aborts and leaves the venv unmarked.
    pub fn ensure_present(&self, update: bool) -> Result<()> {
        let dir = self.dir.display().to_string();
        if !self.dir.join(".git").exists() {
            info!("cloning {} into {dir}", self.config.repo_url);
            self.step(
                "clone helper repository",
                RunnerCommand::new(
                    "git",
                    ["clone", "--depth", "1", self.config.repo_url.as_str(), dir.as_str()],
                )
                .inherit_output(),
            )?;
        } else if update {
            info!("updating helper checkout at {dir}");
            self.step(
                "update helper repository",
                RunnerCommand::new("git", ["-C", dir.as_str(), "pull", "--ff-only"]).inherit_output(),
            )?;
        } else {
            debug!("helper checkout present at {dir}; update not requested");
        }

        let created = !self.venv_python().exists();
        if created {
            self.step(
                "create helper virtualenv",
                RunnerCommand::new(self.config.python.as_str(), ["-m", "venv", "venv"])
                    .current_dir(&self.dir),
            )?;
        }
        let marker = self.ready_marker();
        if !created && !update && marker.exists() {
            return Ok(());
        }

        match fs::remove_file(&marker) {
            Ok(()) => debug!("cleared {}", marker.display()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err).with_context(|| format!("remove {}", marker.display())),
        }
        let python = self.venv_python().display().to_string();
        self.step(
            "install helper requirements",
            RunnerCommand::new(
                python,
                ["-m", "pip", "install", "--upgrade", "-r", "requirements.txt"],
            )
            .current_dir(&self.dir)
            .inherit_output(),
        )?;
        if let Some(parent) = marker.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&marker, "").with_context(|| format!("write {}", marker.display()))?;
        Ok(())
    }

    /// Invokes the entry point with `subcommand` and `args` unchanged, returning its exit code.
    pub fn run(&self, subcommand: HelperCommand, args: &[String]) -> Result<i32> {
        if !self.is_present() {
            return Err(BridgeError::NotInstalled(self.dir.clone()).into());
        }
        let command = self.command(subcommand, args);
        info!("helper: {command}");
        let outcome = self.runner.run(&command)?;
        Ok(outcome.exit_code())
    }

    pub fn command(&self, subcommand: HelperCommand, args: &[String]) -> RunnerCommand {
        let python = self.venv_python().display().to_string();
        let argv = std::iter::once(self.config.entry_point.clone())
            .chain(std::iter::once(subcommand.to_string()))
            .chain(args.iter().cloned());
        RunnerCommand::new(python, argv)
            .current_dir(&self.dir)
            .inherit_output()
    }

    pub fn install(&self, selection: &AppSelection) -> Result<i32> {
        self.run(HelperCommand::Install, &selection.to_args())
    }

    pub fn uninstall(&self, selection: &AppSelection) -> Result<i32> {
        self.run(HelperCommand::Uninstall, &selection.to_args())
    }

    pub fn hack(&self, token: AppToken) -> Result<i32> {
        self.run(HelperCommand::Hack, &[token.to_string()])
    }

    pub fn certified(&self) -> Result<i32> {
        self.run(HelperCommand::Certified, &[])
    }

    fn step(&self, step: &str, command: RunnerCommand) -> Result<()> {
        run_step(self.runner, step, &command)?;
        Ok(())
    }
}
