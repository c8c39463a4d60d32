use anyhow::Result;
use log::{info, warn};

use runner::{run_step, CommandOutcome, CommandRunner, RunnerCommand};
use waydock_core::config::{BinderConfig, HostRoot};
use waydock_core::prompt::Prompter;
use waydock_core::types::HostProfile;

use crate::fstab;
use crate::packages::{self, PackageFamily};
use crate::ProvisionError;

/// Error text modprobe prints when the driver is compiled into the kernel.
pub const BUILT_IN_MARKER: &str = "device or resource busy";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    BuiltIn,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinderResolution {
    AlreadyWorking,
    ModuleLoaded,
    BinderfsMounted,
    BuiltWithDkms,
}

/// The only place modprobe output is interpreted.
pub fn classify_modprobe(outcome: &CommandOutcome) -> LoadOutcome {
    if outcome.success() {
        return LoadOutcome::Loaded;
    }
    let text = format!("{}\n{}", outcome.stdout, outcome.stderr).to_lowercase();
    if text.contains(BUILT_IN_MARKER) {
        return LoadOutcome::BuiltIn;
    }
    let reason = outcome
        .stderr
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .map(|line| line.trim().to_string())
        .unwrap_or_else(|| format!("exit code {}", outcome.exit_code()));
    LoadOutcome::Failed(reason)
}

/// Extracts `name/version` from `dkms status` output. Accepts both the
/// `name/version, kernel, arch: state` and the older `name, version, ...` layouts.
pub fn parse_dkms_version(status: &str) -> Option<String> {
    status.lines().find_map(|line| {
        let head = line.split(':').next()?.trim();
        let mut fields = head.split(',').map(str::trim);
        let first = fields.next()?;
        if let Some((name, version)) = first.split_once('/') {
            if !name.is_empty() && !version.is_empty() {
                return Some(format!("{name}/{version}"));
            }
            return None;
        }
        let version = fields.next()?;
        (!first.is_empty() && !version.is_empty()).then(|| format!("{first}/{version}"))
    })
}

pub struct BinderProvisioner<'a> {
    runner: &'a dyn CommandRunner,
    prompter: &'a dyn Prompter,
    root: HostRoot,
    config: &'a BinderConfig,
    profile: &'a HostProfile,
    family: Option<PackageFamily>,
}

impl<'a> BinderProvisioner<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        prompter: &'a dyn Prompter,
        root: HostRoot,
        config: &'a BinderConfig,
        profile: &'a HostProfile,
    ) -> Self {
        Self {
            runner,
            prompter,
            root,
            config,
            profile,
            family: None,
        }
    }

    /// Reuses a package family the caller already resolved instead of asking again.
    pub fn with_family(mut self, family: PackageFamily) -> Self {
        self.family = Some(family);
        self
    }

    pub fn modprobe_command(&self) -> RunnerCommand {
        RunnerCommand::new(
            "modprobe",
            [
                self.config.module.clone(),
                format!("devices={}", self.config.devices_param()),
            ],
        )
    }

    /// Drives binder from whatever state the prober reports to a working one,
    /// or fails with `ProvisionError::BinderUnavailable` after the checklist.
    pub fn provision(&self) -> Result<BinderResolution> {
        if self.is_working() {
            reporting::success("Binder is already working");
            return Ok(BinderResolution::AlreadyWorking);
        }

        let secure_boot = match self.secure_boot_gate()? {
            SecureBootGate::Resolved => return Ok(BinderResolution::AlreadyWorking),
            SecureBootGate::Proceed { enabled } => enabled,
        };

        reporting::step(&format!("Loading {}", self.config.module));
        match self.load_module()? {
            LoadOutcome::Loaded => self.finish_loaded(BinderResolution::ModuleLoaded),
            LoadOutcome::BuiltIn => self.mount_binderfs(),
            LoadOutcome::Failed(reason) => {
                reporting::warning(&format!(
                    "{} could not be loaded ({reason}); building it with DKMS",
                    self.config.module
                ));
                self.build_with_dkms().map_err(|err| {
                    let checklist =
                        reporting::troubleshoot::binder_checklist(self.profile.kernel_flavor, secure_boot);
                    reporting::troubleshoot::print_block("Binder troubleshooting", &checklist);
                    err
                })
            }
        }
    }

    fn is_working(&self) -> bool {
        probe::binder::detect(&self.root, self.config).0.is_working()
    }

    fn secure_boot_gate(&self) -> Result<SecureBootGate> {
        loop {
            if !probe::session::secure_boot_enabled(self.runner) {
                return Ok(SecureBootGate::Proceed { enabled: false });
            }
            reporting::warning("Secure Boot is enabled: unsigned kernel modules cannot be loaded.");
            let choice = self.prompter.select(
                "How do you want to continue?",
                &[
                    "Continue anyway (module loading will likely fail)",
                    "I disabled Secure Boot, check again",
                    "Abort",
                ],
            )?;
            match choice {
                Some(0) => return Ok(SecureBootGate::Proceed { enabled: true }),
                Some(1) => {
                    if self.is_working() {
                        reporting::success("Binder is working now");
                        return Ok(SecureBootGate::Resolved);
                    }
                }
                _ => {
                    warn!("binder provisioning aborted at the Secure Boot prompt");
                    return Err(ProvisionError::BinderUnavailable.into());
                }
            }
        }
    }

    fn load_module(&self) -> Result<LoadOutcome> {
        let outcome = self.runner.run(&self.modprobe_command())?;
        let classified = classify_modprobe(&outcome);
        info!("modprobe {}: {classified:?}", self.config.module);
        Ok(classified)
    }

    fn finish_loaded(&self, resolution: BinderResolution) -> Result<BinderResolution> {
        fstab::write_autoload(&self.root, self.config)?;
        reporting::success(&format!("{} loaded", self.config.module));
        Ok(resolution)
    }

    fn mount_binderfs(&self) -> Result<BinderResolution> {
        let dir = self.config.binderfs_dir.display().to_string();
        reporting::step(&format!("Binder is built into the kernel; mounting binderfs at {dir}"));
        if !probe::binder::mount_present(&self.root) {
            run_step(
                self.runner,
                "create binderfs directory",
                &RunnerCommand::new("mkdir", ["-p", dir.as_str()]),
            )?;
            run_step(
                self.runner,
                "mount binderfs",
                &RunnerCommand::new("mount", ["-t", "binder", "binder", dir.as_str()]),
            )?;
        }
        if fstab::register_binderfs(&self.root, &self.config.binderfs_dir)? {
            reporting::step("Registered binderfs in /etc/fstab");
        }
        reporting::success("binderfs mounted");
        Ok(BinderResolution::BinderfsMounted)
    }

    fn build_with_dkms(&self) -> Result<BinderResolution> {
        let family = match self.family {
            Some(family) => family,
            None => packages::resolve_family(self.profile, self.prompter)?,
        };
        let release = self.profile.kernel_version.as_str();
        let packages = family.dkms_packages(self.profile.kernel_flavor, release);

        reporting::step(&format!("Installing {}", packages.join(" ")));
        run_step(
            self.runner,
            "install dkms packages",
            &family.install_command(&packages),
        )?;

        let status = self
            .runner
            .run(&RunnerCommand::new("dkms", ["status", self.config.module.as_str()]))?;
        match parse_dkms_version(&status.stdout) {
            Some(module) => {
                reporting::step(&format!("Building {module} for {release}"));
                run_step(
                    self.runner,
                    "dkms install",
                    &RunnerCommand::new("dkms", ["install", module.as_str(), "-k", release])
                        .inherit_output(),
                )?;
            }
            None => {
                reporting::step(&format!("Rebuilding DKMS modules for {release}"));
                run_step(
                    self.runner,
                    "dkms autoinstall",
                    &RunnerCommand::new("dkms", ["autoinstall", "-k", release]).inherit_output(),
                )?;
            }
        }
        run_step(
            self.runner,
            "refresh module index",
            &RunnerCommand::new("depmod", ["-a"]),
        )?;

        match self.load_module()? {
            LoadOutcome::Loaded => self.finish_loaded(BinderResolution::BuiltWithDkms),
            LoadOutcome::BuiltIn => self.mount_binderfs(),
            LoadOutcome::Failed(reason) => {
                reporting::failure(&format!(
                    "{} still fails to load after the DKMS build: {reason}",
                    self.config.module
                ));
                Err(ProvisionError::BinderUnavailable.into())
            }
        }
    }
}

enum SecureBootGate {
    Resolved,
    Proceed { enabled: bool },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use runner::ScriptedRunner;
    use waydock_core::prompt::{Answer, ScriptedPrompter};
    use waydock_core::types::KernelFlavor;

    fn arch_profile() -> HostProfile {
        HostProfile {
            distro_id: "arch".to_string(),
            distro_like: Vec::new(),
            kernel_version: "6.9.7-arch1-1".to_string(),
            kernel_flavor: KernelFlavor::Default,
            arch: "x86_64".to_string(),
        }
    }

    fn provision_with(
        root: &std::path::Path,
        runner: &ScriptedRunner,
        prompter: &ScriptedPrompter,
    ) -> Result<BinderResolution> {
        let config = BinderConfig::default();
        let profile = arch_profile();
        BinderProvisioner::new(runner, prompter, HostRoot::new(root), &config, &profile).provision()
    }

    #[test]
    fn test_classify_modprobe() {
        assert_eq!(classify_modprobe(&CommandOutcome::ok("")), LoadOutcome::Loaded);
        let busy = CommandOutcome::failed(
            1,
            "modprobe: ERROR: could not insert 'binder_linux': Device or resource busy\n",
        );
        assert_eq!(classify_modprobe(&busy), LoadOutcome::BuiltIn);
        let missing = CommandOutcome::failed(1, "modprobe: FATAL: Module binder_linux not found.\n");
        assert_eq!(
            classify_modprobe(&missing),
            LoadOutcome::Failed("modprobe: FATAL: Module binder_linux not found.".to_string())
        );
    }

    #[test]
    fn test_parse_dkms_version() {
        assert_eq!(
            parse_dkms_version("binder_linux/1.0.0, 6.9.7-arch1-1, x86_64: installed\n"),
            Some("binder_linux/1.0.0".to_string())
        );
        assert_eq!(
            parse_dkms_version("anbox-binder, 1, 5.15.0-91-generic, x86_64: installed\n"),
            Some("anbox-binder/1".to_string())
        );
        assert_eq!(parse_dkms_version(""), None);
    }

    #[test]
    fn test_working_binder_runs_nothing() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("proc")).unwrap();
        fs::write(dir.path().join("proc/modules"), "binder_linux 200704 0 - Live 0x0\n").unwrap();
        let runner = ScriptedRunner::new();
        let prompter = ScriptedPrompter::default();
        let result = provision_with(dir.path(), &runner, &prompter).unwrap();
        assert_eq!(result, BinderResolution::AlreadyWorking);
        assert!(runner.commands().is_empty());
    }

    #[test]
    fn test_loaded_module_writes_autoload() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new();
        let prompter = ScriptedPrompter::default();
        let result = provision_with(dir.path(), &runner, &prompter).unwrap();
        assert_eq!(result, BinderResolution::ModuleLoaded);
        assert!(runner.ran(
            "modprobe",
            &["binder_linux", "devices=binder,hwbinder,vndbinder"]
        ));
        assert!(dir.path().join("etc/modules-load.d/waydroid-binder.conf").exists());
    }

    #[test]
    fn test_built_in_driver_mounts_binderfs() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new();
        runner.respond(
            "modprobe",
            &[],
            CommandOutcome::failed(1, "could not insert 'binder_linux': Device or resource busy"),
        );
        let prompter = ScriptedPrompter::default();
        let result = provision_with(dir.path(), &runner, &prompter).unwrap();
        assert_eq!(result, BinderResolution::BinderfsMounted);
        assert!(runner.ran("mount", &["-t", "binder", "binder", "/dev/binderfs"]));
        let fstab = fs::read_to_string(dir.path().join("etc/fstab")).unwrap();
        assert_eq!(fstab, "binder /dev/binderfs binder nofail 0 0\n");
        assert!(!runner.ran("dkms", &[]));
    }

    #[test]
    fn test_dkms_build_with_resolved_version() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new();
        runner.respond("modprobe", &[], CommandOutcome::failed(1, "Module binder_linux not found"));
        runner.respond("modprobe", &[], CommandOutcome::ok(""));
        runner.respond(
            "dkms",
            &["status"],
            CommandOutcome::ok("binder_linux/1.0, 6.9.7-arch1-1, x86_64: added\n"),
        );
        let prompter = ScriptedPrompter::default();
        let result = provision_with(dir.path(), &runner, &prompter).unwrap();
        assert_eq!(result, BinderResolution::BuiltWithDkms);
        assert!(runner.ran("pacman", &["-S", "--needed", "--noconfirm", "linux-headers"]));
        assert!(runner.ran("dkms", &["install", "binder_linux/1.0", "-k", "6.9.7-arch1-1"]));
        assert!(!runner.ran("dkms", &["autoinstall"]));
        assert!(runner.ran("depmod", &["-a"]));
        assert_eq!(runner.count("modprobe", &[]), 2);
    }

    #[test]
    fn test_dkms_autoinstall_without_version() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new();
        runner.respond("modprobe", &[], CommandOutcome::failed(1, "not found"));
        runner.respond("modprobe", &[], CommandOutcome::ok(""));
        let prompter = ScriptedPrompter::default();
        provision_with(dir.path(), &runner, &prompter).unwrap();
        assert!(runner.ran("dkms", &["autoinstall", "-k", "6.9.7-arch1-1"]));
    }

    #[test]
    fn test_persistent_failure_is_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new();
        runner.respond("modprobe", &[], CommandOutcome::failed(1, "not found"));
        let prompter = ScriptedPrompter::default();
        let err = provision_with(dir.path(), &runner, &prompter).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProvisionError>(),
            Some(ProvisionError::BinderUnavailable)
        ));
        assert_eq!(runner.count("modprobe", &[]), 2);
    }

    #[test]
    fn test_dkms_step_failure_is_named() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new();
        runner.respond("modprobe", &[], CommandOutcome::failed(1, "not found"));
        runner.respond("dkms", &["autoinstall"], CommandOutcome::failed(10, "bad headers"));
        let prompter = ScriptedPrompter::default();
        let err = provision_with(dir.path(), &runner, &prompter).unwrap_err();
        assert_eq!(err.to_string(), "dkms autoinstall failed (exit code 10): bad headers");
        assert!(!runner.ran("depmod", &[]));
    }

    #[test]
    fn test_secure_boot_abort_skips_loading() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::with_programs(&["mokutil"]);
        runner.respond("mokutil", &["--sb-state"], CommandOutcome::ok("SecureBoot enabled\n"));
        let prompter = ScriptedPrompter::new([Answer::Select(Some(2))]);
        assert!(provision_with(dir.path(), &runner, &prompter).is_err());
        assert!(!runner.ran("modprobe", &[]));
    }

    #[test]
    fn test_secure_boot_recheck_then_continue() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::with_programs(&["mokutil"]);
        runner.respond("mokutil", &["--sb-state"], CommandOutcome::ok("SecureBoot enabled\n"));
        let prompter = ScriptedPrompter::new([Answer::Select(Some(1)), Answer::Select(Some(0))]);
        let result = provision_with(dir.path(), &runner, &prompter).unwrap();
        assert_eq!(result, BinderResolution::ModuleLoaded);
        assert_eq!(runner.count("mokutil", &[]), 2);
        assert_eq!(prompter.asked().len(), 2);
    }

    fn gentoo_profile() -> HostProfile {
        HostProfile {
            distro_id: "gentoo".to_string(),
            distro_like: Vec::new(),
            kernel_version: "6.9.7-gentoo".to_string(),
            kernel_flavor: KernelFlavor::Default,
            arch: "x86_64".to_string(),
        }
    }

    #[test]
    fn test_unknown_distro_asks_for_package_manager() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new();
        runner.respond("modprobe", &[], CommandOutcome::failed(1, "not found"));
        runner.respond("modprobe", &[], CommandOutcome::ok(""));
        let prompter = ScriptedPrompter::new([Answer::Select(Some(0))]);
        let config = BinderConfig::default();
        let profile = gentoo_profile();
        let result = BinderProvisioner::new(&runner, &prompter, HostRoot::new(dir.path()), &config, &profile)
            .provision()
            .unwrap();

        assert_eq!(result, BinderResolution::BuiltWithDkms);
        assert_eq!(prompter.asked(), vec!["How should dependencies be installed?"]);
        assert!(runner.ran("pacman", &["-S", "--needed", "--noconfirm", "linux-headers"]));
        assert!(runner.ran("dkms", &["autoinstall", "-k", "6.9.7-gentoo"]));
    }

    #[test]
    fn test_unknown_distro_abort_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new();
        runner.respond("modprobe", &[], CommandOutcome::failed(1, "not found"));
        let prompter = ScriptedPrompter::new([Answer::Select(Some(4))]);
        let config = BinderConfig::default();
        let profile = gentoo_profile();
        let err = BinderProvisioner::new(&runner, &prompter, HostRoot::new(dir.path()), &config, &profile)
            .provision()
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ProvisionError>(),
            Some(ProvisionError::UnsupportedDistro(id)) if id == "gentoo"
        ));
        assert_eq!(prompter.asked().len(), 1);
        assert!(!runner.ran("dkms", &[]));
    }

    #[test]
    fn test_known_family_skips_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new();
        runner.respond("modprobe", &[], CommandOutcome::failed(1, "not found"));
        runner.respond("modprobe", &[], CommandOutcome::ok(""));
        let prompter = ScriptedPrompter::default();
        let config = BinderConfig::default();
        let profile = gentoo_profile();
        BinderProvisioner::new(&runner, &prompter, HostRoot::new(dir.path()), &config, &profile)
            .with_family(PackageFamily::Zypper)
            .provision()
            .unwrap();

        assert!(prompter.asked().is_empty());
        assert!(runner.ran("zypper", &["--non-interactive", "install", "kernel-devel", "dkms"]));
    }
}
