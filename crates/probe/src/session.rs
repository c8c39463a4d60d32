use std::fs;

use log::debug;

use runner::{CommandRunner, RunnerCommand};
use waydock_core::config::HostRoot;
use waydock_core::env::EnvSnapshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokingUser {
    pub name: String,
    pub uid: u32,
    /// Root acting on behalf of a different, unprivileged user.
    pub elevated_for_user: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WaylandProbe {
    pub active: bool,
    pub display: Option<String>,
}

/// Resolves the real desktop user behind sudo, pkexec or doas.
pub fn resolve_invoking_user(env: &EnvSnapshot, runner: &dyn CommandRunner) -> InvokingUser {
    if env.is_root() {
        if let Some(name) = env.get("SUDO_USER").filter(|name| *name != "root") {
            let uid = env
                .get("SUDO_UID")
                .and_then(|value| value.parse().ok())
                .or_else(|| lookup_uid(runner, name));
            if let Some(uid) = uid {
                return elevated(name.to_string(), uid);
            }
        }
        if let Some(uid) = env.get("PKEXEC_UID").and_then(|value| value.parse::<u32>().ok()) {
            if uid != 0 {
                let name = lookup_name(runner, uid).unwrap_or_else(|| uid.to_string());
                return elevated(name, uid);
            }
        }
        if let Some(name) = env.get("DOAS_USER").filter(|name| *name != "root") {
            if let Some(uid) = lookup_uid(runner, name) {
                return elevated(name.to_string(), uid);
            }
        }
    }

    let name = env
        .get("USER")
        .or_else(|| env.get("LOGNAME"))
        .map(str::to_string)
        .unwrap_or_else(|| if env.is_root() { "root".to_string() } else { env.euid().to_string() });
    InvokingUser {
        name,
        uid: env.euid(),
        elevated_for_user: false,
    }
}

fn elevated(name: String, uid: u32) -> InvokingUser {
    InvokingUser {
        name,
        uid,
        elevated_for_user: true,
    }
}

fn lookup_uid(runner: &dyn CommandRunner, name: &str) -> Option<u32> {
    let outcome = runner.run(&RunnerCommand::new("id", ["-u", name])).ok()?;
    if !outcome.success() {
        return None;
    }
    outcome.first_stdout_line()?.parse().ok()
}

fn lookup_name(runner: &dyn CommandRunner, uid: u32) -> Option<String> {
    let outcome = runner
        .run(&RunnerCommand::new("id", ["-nu".to_string(), uid.to_string()]))
        .ok()?;
    if !outcome.success() {
        return None;
    }
    outcome.first_stdout_line().map(str::to_string)
}

/// Tiered Wayland detection. Elevation wrappers scrub the session variables,
/// so the user's runtime directory and logind are consulted before our own
/// environment.
pub fn probe_wayland(
    root: &HostRoot,
    env: &EnvSnapshot,
    runner: &dyn CommandRunner,
    user: &InvokingUser,
) -> WaylandProbe {
    if user.elevated_for_user {
        if let Some(display) = wayland_socket(root, user.uid) {
            debug!("wayland socket {display} found for {}", user.name);
            return WaylandProbe {
                active: true,
                display: Some(display),
            };
        }
    }

    if runner.is_available("loginctl") && logind_session_is_wayland(runner, &user.name) {
        return WaylandProbe {
            active: true,
            display: wayland_socket(root, user.uid)
                .or_else(|| env.get("WAYLAND_DISPLAY").map(str::to_string)),
        };
    }

    if let Some(display) = env.get("WAYLAND_DISPLAY") {
        return WaylandProbe {
            active: true,
            display: Some(display.to_string()),
        };
    }
    if env.get("XDG_SESSION_TYPE") == Some("wayland") {
        return WaylandProbe {
            active: true,
            display: None,
        };
    }
    WaylandProbe::default()
}

fn wayland_socket(root: &HostRoot, uid: u32) -> Option<String> {
    let entries = fs::read_dir(root.user_runtime_dir(uid)).ok()?;
    let mut sockets: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("wayland-") && !name.ends_with(".lock"))
        .collect();
    sockets.sort();
    sockets.into_iter().next()
}

fn logind_session_is_wayland(runner: &dyn CommandRunner, user: &str) -> bool {
    let display = runner.run(&RunnerCommand::new(
        "loginctl",
        ["show-user", user, "--property=Display", "--value"],
    ));
    let Some(session) = display
        .ok()
        .filter(|outcome| outcome.success())
        .and_then(|outcome| outcome.first_stdout_line().map(str::to_string))
    else {
        return false;
    };
    runner
        .run(&RunnerCommand::new(
            "loginctl",
            ["show-session", session.as_str(), "--property=Type", "--value"],
        ))
        .map(|outcome| outcome.success() && outcome.first_stdout_line() == Some("wayland"))
        .unwrap_or(false)
}

/// `mokutil --sb-state`; a missing utility reads as "not enabled".
pub fn secure_boot_enabled(runner: &dyn CommandRunner) -> bool {
    if !runner.is_available("mokutil") {
        debug!("mokutil not installed; Secure Boot state unknown");
        return false;
    }
    match runner.run(&RunnerCommand::new("mokutil", ["--sb-state"])) {
        Ok(outcome) => {
            let text = format!("{}{}", outcome.stdout, outcome.stderr);
            text.contains("SecureBoot enabled")
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runner::{CommandOutcome, ScriptedRunner};

    #[test]
    fn test_sudo_user_resolved_with_sudo_uid() {
        let env = EnvSnapshot::from_vars([("SUDO_USER", "alice"), ("SUDO_UID", "1000")], 0);
        let user = resolve_invoking_user(&env, &ScriptedRunner::new());
        assert_eq!(user, elevated("alice".to_string(), 1000));
    }

    #[test]
    fn test_sudo_user_uid_looked_up() {
        let env = EnvSnapshot::from_vars([("SUDO_USER", "bob")], 0);
        let runner = ScriptedRunner::new();
        runner.respond("id", &["-u", "bob"], CommandOutcome::ok("1001\n"));
        assert_eq!(resolve_invoking_user(&env, &runner).uid, 1001);
    }

    #[test]
    fn test_pkexec_uid_resolved() {
        let env = EnvSnapshot::from_vars([("PKEXEC_UID", "1002")], 0);
        let runner = ScriptedRunner::new();
        runner.respond("id", &["-nu", "1002"], CommandOutcome::ok("carol\n"));
        assert_eq!(resolve_invoking_user(&env, &runner), elevated("carol".to_string(), 1002));
    }

    #[test]
    fn test_plain_user_is_not_elevated() {
        let env = EnvSnapshot::from_vars([("USER", "dave"), ("SUDO_USER", "eve")], 1003);
        let user = resolve_invoking_user(&env, &ScriptedRunner::new());
        assert_eq!(user.name, "dave");
        assert_eq!(user.uid, 1003);
        assert!(!user.elevated_for_user);
    }

    #[test]
    fn test_wayland_socket_under_user_runtime_dir() {
        let dir = tempfile::tempdir().unwrap();
        let root = HostRoot::new(dir.path());
        let runtime = root.user_runtime_dir(1000);
        fs::create_dir_all(&runtime).unwrap();
        fs::write(runtime.join("wayland-0.lock"), "").unwrap();
        fs::write(runtime.join("wayland-0"), "").unwrap();

        let env = EnvSnapshot::from_vars([("SUDO_USER", "alice"), ("SUDO_UID", "1000")], 0);
        let runner = ScriptedRunner::new();
        let user = resolve_invoking_user(&env, &runner);
        let probe = probe_wayland(&root, &env, &runner, &user);
        assert!(probe.active);
        assert_eq!(probe.display.as_deref(), Some("wayland-0"));
        assert!(runner.commands().is_empty());
    }

    #[test]
    fn test_wayland_from_logind_session_type() {
        let dir = tempfile::tempdir().unwrap();
        let root = HostRoot::new(dir.path());
        let env = EnvSnapshot::from_vars([("SUDO_USER", "alice"), ("SUDO_UID", "1000")], 0);
        let runner = ScriptedRunner::with_programs(&["loginctl"]);
        runner.respond("loginctl", &["show-user"], CommandOutcome::ok("3\n"));
        runner.respond("loginctl", &["show-session", "3"], CommandOutcome::ok("wayland\n"));
        let user = resolve_invoking_user(&env, &runner);
        assert!(probe_wayland(&root, &env, &runner, &user).active);
    }

    #[test]
    fn test_wayland_from_own_environment() {
        let dir = tempfile::tempdir().unwrap();
        let root = HostRoot::new(dir.path());
        let runner = ScriptedRunner::new();
        let env = EnvSnapshot::from_vars([("USER", "dave"), ("XDG_SESSION_TYPE", "wayland")], 1003);
        let user = resolve_invoking_user(&env, &runner);
        assert!(probe_wayland(&root, &env, &runner, &user).active);

        let env = EnvSnapshot::from_vars([("USER", "dave"), ("XDG_SESSION_TYPE", "x11")], 1003);
        assert!(!probe_wayland(&root, &env, &runner, &user).active);
    }

    #[test]
    fn test_secure_boot_states() {
        let runner = ScriptedRunner::new();
        assert!(!secure_boot_enabled(&runner));

        runner.make_available("mokutil");
        runner.respond("mokutil", &["--sb-state"], CommandOutcome::ok("SecureBoot enabled\n"));
        assert!(secure_boot_enabled(&runner));
    }
}
