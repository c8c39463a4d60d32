use serde::{Deserialize, Serialize};

use crate::command::RunnerCommand;

const DROPPED_VARS: [&str; 2] = ["LD_PRELOAD", "LD_LIBRARY_PATH"];

/// The desktop user a root process acts for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesktopUser {
    pub name: String,
    pub uid: u32,
    pub wayland_display: Option<String>,
    /// Running elevated for someone else; commands must switch back to them.
    pub switch_user: bool,
}

impl DesktopUser {
    pub fn runtime_dir(&self) -> String {
        format!("/run/user/{}", self.uid)
    }

    /// Rewrites `command` so it runs inside this user's graphical session.
    pub fn wrap(&self, command: RunnerCommand) -> RunnerCommand {
        let env: Vec<(String, String)> = sanitize_env(&command.env);
        if !self.switch_user {
            let mut direct = command;
            direct.env = env;
            return direct;
        }

        let mut args = vec![
            "-u".to_string(),
            self.name.clone(),
            "env".to_string(),
            format!("XDG_RUNTIME_DIR={}", self.runtime_dir()),
        ];
        if let Some(display) = &self.wayland_display {
            args.push(format!("WAYLAND_DISPLAY={display}"));
        }
        args.extend(env.iter().map(|(key, value)| format!("{key}={value}")));
        args.push(command.program);
        args.extend(command.args);

        RunnerCommand {
            program: "sudo".to_string(),
            args,
            cwd: command.cwd,
            env: Vec::new(),
            output: command.output,
        }
    }
}

pub fn sanitize_env(env: &[(String, String)]) -> Vec<(String, String)> {
    env.iter()
        .filter(|(key, _)| !DROPPED_VARS.contains(&key.as_str()))
        .cloned()
        .collect()
}
