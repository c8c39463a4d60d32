use std::thread;
use std::time::Duration;

use anyhow::{bail, Result};
use log::info;

use runner::{run_step, DesktopUser, RunnerCommand};

use crate::app::Context;
use crate::commands::service;

/// Checks the container can host a UI and starts it when stopped.
fn ensure_ready(ctx: &Context) -> Result<DesktopUser> {
    let prober = ctx.prober();
    let state = prober.waydroid_state();
    if !state.installed {
        bail!("waydroid is not installed; run `waydock install` first");
    }
    if !state.initialized {
        bail!("waydroid is not initialized; run `waydock install` first");
    }
    if !state.container_active {
        reporting::step("Starting the container");
        run_step(ctx.runner, "start container", &service::systemctl("start"))?;
    }

    let user = prober.desktop_user();
    if user.wayland_display.is_none() && !prober.is_wayland_active() {
        reporting::warning("No Wayland session detected; WayDroid can only display on Wayland.");
    }
    Ok(user)
}

fn waydroid(args: &[&str]) -> RunnerCommand {
    RunnerCommand::new("waydroid", args.iter().copied())
}

pub fn show_ui(ctx: &Context) -> Result<i32> {
    let user = ensure_ready(ctx)?;
    let session = ctx
        .runner
        .spawn_detached(&user.wrap(waydroid(&["show-full-ui"])))?;
    reporting::success(&format!("Android UI launched for {} ({session})", user.name));
    Ok(0)
}

/// Starts a session, waits a fixed interval, enables multi-window mode, then opens the UI.
/// Neither detached process is tracked afterwards.
pub fn multi_window(ctx: &Context) -> Result<i32> {
    let user = ensure_ready(ctx)?;
    let session = ctx
        .runner
        .spawn_detached(&user.wrap(waydroid(&["session", "start"])))?;
    info!("session started detached: {session}");

    let settle = ctx.config.session.settle_secs;
    reporting::step(&format!("Waiting {settle}s for the session to come up"));
    thread::sleep(Duration::from_secs(settle));

    run_step(
        ctx.runner,
        "enable multi-window mode",
        &user.wrap(waydroid(&["prop", "set", "persist.waydroid.multi_windows", "true"])),
    )?;
    let ui = ctx
        .runner
        .spawn_detached(&user.wrap(waydroid(&["show-full-ui"])))?;
    reporting::success(&format!("Multi-window session launched ({ui})"));
    Ok(0)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::app::testing::*;
    use runner::{CommandOutcome, ScriptedRunner};
    use waydock_core::prompt::ScriptedPrompter;

    fn initialized(dir: &std::path::Path) {
        let cfg = dir.join("host/var/lib/waydroid");
        fs::create_dir_all(&cfg).unwrap();
        fs::write(cfg.join("waydroid.cfg"), "[waydroid]\n").unwrap();
        let runtime = dir.join("host/run/user/1000");
        fs::create_dir_all(&runtime).unwrap();
        fs::write(runtime.join("wayland-0"), "").unwrap();
    }

    #[test]
    fn test_ui_runs_as_desktop_user() {
        let dir = tempfile::tempdir().unwrap();
        initialized(dir.path());
        let env = root_env();
        let runner = ScriptedRunner::with_programs(&["waydroid", "systemctl"]);
        runner.respond("systemctl", &["is-active"], CommandOutcome::ok("active\n"));
        let prompter = ScriptedPrompter::default();
        let ctx = context(dir.path(), &env, &runner, &prompter, &NoProcesses);

        assert_eq!(show_ui(&ctx).unwrap(), 0);
        let spawned = runner.spawned();
        assert_eq!(spawned.len(), 1);
        assert_eq!(spawned[0].program, "sudo");
        assert_eq!(
            spawned[0].args,
            vec![
                "-u",
                "alice",
                "env",
                "XDG_RUNTIME_DIR=/run/user/1000",
                "WAYLAND_DISPLAY=wayland-0",
                "waydroid",
                "show-full-ui"
            ]
        );
        assert!(!runner.ran("systemctl", &["start"]));
    }

    #[test]
    fn test_ui_starts_stopped_container() {
        let dir = tempfile::tempdir().unwrap();
        initialized(dir.path());
        let env = root_env();
        let runner = ScriptedRunner::with_programs(&["waydroid", "systemctl"]);
        runner.respond("systemctl", &["is-active"], CommandOutcome::failed(3, ""));
        let prompter = ScriptedPrompter::default();
        let ctx = context(dir.path(), &env, &runner, &prompter, &NoProcesses);

        show_ui(&ctx).unwrap();
        assert!(runner.ran("systemctl", &["start", "waydroid-container"]));
    }

    #[test]
    fn test_multi_window_sequence() {
        let dir = tempfile::tempdir().unwrap();
        initialized(dir.path());
        let env = root_env();
        let runner = ScriptedRunner::with_programs(&["waydroid", "systemctl"]);
        runner.respond("systemctl", &["is-active"], CommandOutcome::ok("active\n"));
        let prompter = ScriptedPrompter::default();
        let ctx = context(dir.path(), &env, &runner, &prompter, &NoProcesses);

        assert_eq!(multi_window(&ctx).unwrap(), 0);
        let spawned = runner.spawned();
        assert_eq!(spawned.len(), 2);
        assert!(spawned[0].args.ends_with(&["waydroid".to_string(), "session".to_string(), "start".to_string()]));
        assert!(spawned[1].args.ends_with(&["waydroid".to_string(), "show-full-ui".to_string()]));
        assert!(runner.ran("sudo", &["-u", "alice"]));
    }

    #[test]
    fn test_ui_refuses_without_waydroid() {
        let dir = tempfile::tempdir().unwrap();
        let env = root_env();
        let runner = ScriptedRunner::new();
        let prompter = ScriptedPrompter::default();
        let ctx = context(dir.path(), &env, &runner, &prompter, &NoProcesses);
        assert!(show_ui(&ctx).is_err());
        assert!(runner.spawned().is_empty());
    }
}
