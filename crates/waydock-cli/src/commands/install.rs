use anyhow::Result;
use log::warn;

use provision::packages::{install_dependencies, resolve_family};
use provision::{BinderProvisioner, FirewallOutcome};
use reporting::{RunSummary, StepStatus};
use runner::{run_step, RunnerCommand};

use crate::app::Context;
use crate::commands::service::CONTAINER_UNIT;

/// Dependencies, binder, firewall, Wayland advisory, image init and service enable.
/// A binder or firewall failure degrades the run (exit 1) without stopping it.
pub fn full_install(ctx: &Context) -> Result<i32> {
    let prober = ctx.prober();
    let profile = prober.host_profile();
    let mut summary = RunSummary::start("Full install");

    reporting::heading("Dependencies");
    let family = resolve_family(&profile, ctx.prompter)?;
    install_dependencies(ctx.runner, family)?;
    summary.record("dependencies", StepStatus::Done, Some(family.to_string()));

    reporting::heading("Binder");
    let binder = BinderProvisioner::new(
        ctx.runner,
        ctx.prompter,
        ctx.root.clone(),
        &ctx.config.binder,
        &profile,
    )
    .with_family(family);
    match binder.provision() {
        Ok(resolution) => {
            summary.record("binder", StepStatus::Done, Some(format!("{resolution:?}")));
        }
        Err(err) => {
            reporting::failure(&format!("Binder setup failed: {err:#}"));
            reporting::warning("Continuing without binder; Android will not boot until it works.");
            summary.record("binder", StepStatus::Degraded, Some(err.to_string()));
        }
    }

    reporting::heading("Firewall");
    match provision::firewall::configure(ctx.runner, &ctx.config.firewall.interface) {
        Ok(FirewallOutcome::NoBackend) => {
            summary.record("firewall", StepStatus::Skipped, Some("no backend".to_string()));
        }
        Ok(FirewallOutcome::PendingReboot(backend)) => summary.record(
            "firewall",
            StepStatus::Done,
            Some(format!("{backend}, reboot may be required")),
        ),
        Ok(FirewallOutcome::Applied(backend) | FirewallOutcome::AlreadyConfigured(backend)) => {
            summary.record("firewall", StepStatus::Done, Some(backend.to_string()));
        }
        Err(err) => {
            reporting::failure(&format!("Firewall setup failed: {err:#}"));
            summary.record("firewall", StepStatus::Failed, Some(err.to_string()));
        }
    }

    if prober.is_wayland_active() {
        summary.record("wayland", StepStatus::Done, None);
    } else {
        reporting::warning("No Wayland session detected; the Android UI needs one to display.");
        summary.record("wayland", StepStatus::Skipped, Some("not detected".to_string()));
    }

    reporting::heading("Container");
    if prober.waydroid_state().initialized {
        summary.record("init", StepStatus::Skipped, Some("already initialized".to_string()));
    } else {
        let image = ctx.config.session.init_image.as_str();
        reporting::step(&format!("Initializing WayDroid ({image} image)"));
        run_step(
            ctx.runner,
            "waydroid init",
            &RunnerCommand::new("waydroid", ["init", "-s", image]).inherit_output(),
        )?;
        summary.record("init", StepStatus::Done, Some(image.to_string()));
    }
    run_step(
        ctx.runner,
        "enable container service",
        &RunnerCommand::new("systemctl", ["enable", "--now", CONTAINER_UNIT]),
    )?;
    summary.record("service", StepStatus::Done, None);

    summary.finish();
    println!("\n{}", summary.human_summary());
    if summary.is_degraded() {
        warn!("full install finished degraded");
        return Ok(1);
    }
    reporting::success("WayDroid is installed");
    Ok(0)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::app::testing::*;
    use runner::{CommandOutcome, ScriptedRunner};
    use waydock_core::prompt::ScriptedPrompter;

    fn arch_host(dir: &std::path::Path) {
        fs::create_dir_all(dir.join("host/etc")).unwrap();
        fs::write(dir.join("host/etc/os-release"), "ID=arch\n").unwrap();
        fs::create_dir_all(dir.join("host/proc/sys/kernel")).unwrap();
        fs::write(dir.join("host/proc/sys/kernel/osrelease"), "6.9.7-arch1-1\n").unwrap();
    }

    #[test]
    fn test_full_install_sequence() {
        let dir = tempfile::tempdir().unwrap();
        arch_host(dir.path());
        let env = root_env();
        let runner = ScriptedRunner::with_programs(&["waydroid", "systemctl", "ufw"]);
        runner.respond("ufw", &["status"], CommandOutcome::ok("waydroid0 ALLOW FWD\n"));
        let prompter = ScriptedPrompter::default();
        let ctx = context(dir.path(), &env, &runner, &prompter, &NoProcesses);

        assert_eq!(full_install(&ctx).unwrap(), 0);
        let programs: Vec<String> = runner
            .commands()
            .iter()
            .filter(|cmd| cmd.program != "systemctl" || cmd.args[0] != "is-active")
            .map(|cmd| format!("{} {}", cmd.program, cmd.args.first().cloned().unwrap_or_default()))
            .collect();
        let position = |needle: &str| programs.iter().position(|entry| entry == needle).unwrap();
        assert!(position("pacman -S") < position("modprobe binder_linux"));
        assert!(position("modprobe binder_linux") < position("ufw status"));
        assert!(position("ufw status") < position("waydroid init"));
        assert!(position("waydroid init") < position("systemctl enable"));
        assert!(runner.ran("waydroid", &["init", "-s", "VANILLA"]));
    }

    #[test]
    fn test_binder_failure_continues_degraded() {
        let dir = tempfile::tempdir().unwrap();
        arch_host(dir.path());
        let env = root_env();
        let runner = ScriptedRunner::with_programs(&["waydroid", "systemctl"]);
        runner.respond("modprobe", &[], CommandOutcome::failed(1, "Module not found"));
        let prompter = ScriptedPrompter::default();
        let ctx = context(dir.path(), &env, &runner, &prompter, &NoProcesses);

        assert_eq!(full_install(&ctx).unwrap(), 1);
        assert!(runner.ran("systemctl", &["enable", "--now", "waydroid-container"]));
    }

    #[test]
    fn test_failed_package_install_aborts() {
        let dir = tempfile::tempdir().unwrap();
        arch_host(dir.path());
        let env = root_env();
        let runner = ScriptedRunner::new();
        runner.respond("pacman", &["-S"], CommandOutcome::failed(1, "error: failed to commit"));
        let prompter = ScriptedPrompter::default();
        let ctx = context(dir.path(), &env, &runner, &prompter, &NoProcesses);

        assert!(full_install(&ctx).is_err());
        assert!(!runner.ran("modprobe", &[]));
    }
}
