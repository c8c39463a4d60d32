use std::path::Path;

use anyhow::Result;
use log::info;

use helper_bridge::HelperBridge;
use probe::Prober;
use runner::CommandRunner;
use waydock_core::config::{Config, ConfigPaths, HostRoot};
use waydock_core::env::EnvSnapshot;
use waydock_core::error::CoreError;
use waydock_core::lock::{LockManager, ProcessTable};
use waydock_core::prompt::Prompter;

use crate::cli;
use crate::commands::{self, Action};
use crate::menu;

/// Loads the config file. `clean` falls back to defaults when the file is
/// malformed so a broken config cannot block lock recovery.
pub fn load_config(path: &Path, action: &Action) -> Result<Config> {
    match Config::load_or_default(path) {
        Ok(config) => Ok(config),
        Err(err) if *action == Action::Clean => {
            reporting::warning(&format!("Ignoring unreadable config for clean: {err:#}"));
            Ok(Config::default_config())
        }
        Err(err) => Err(err),
    }
}

/// Everything a command needs, resolved once at startup and passed explicitly.
pub struct Context<'a> {
    pub config: Config,
    pub paths: ConfigPaths,
    pub root: HostRoot,
    pub env: &'a EnvSnapshot,
    pub runner: &'a dyn CommandRunner,
    pub prompter: &'a dyn Prompter,
    pub procs: &'a dyn ProcessTable,
}

impl Context<'_> {
    pub fn prober(&self) -> Prober<'_> {
        Prober::new(self.root.clone(), self.runner, self.env, &self.config)
    }

    pub fn helper(&self) -> HelperBridge<'_> {
        HelperBridge::new(self.runner, &self.config.helper, self.paths.helper_dir.clone())
    }

    pub fn lock_manager(&self) -> LockManager {
        LockManager::new(self.paths.lock_file.clone(), self.config.lock.stale_after_secs)
    }
}

pub fn check_privileges(action: &Action, env: &EnvSnapshot) -> Result<(), CoreError> {
    if action.requires_root() && !env.is_root() {
        let command = format!("waydock {}", action.name());
        return Err(CoreError::RootRequired(command.trim_end().to_string()));
    }
    Ok(())
}

/// Runs one action to completion and returns the process exit code.
pub fn run(action: Action, ctx: &Context) -> Result<i32> {
    if action == Action::Clean {
        return commands::clean::execute(ctx);
    }
    check_privileges(&action, ctx.env)?;

    if action.takes_lock() {
        let guard = ctx.lock_manager().acquire(ctx.procs, ctx.prompter)?;
        guard.release_on_signal()?;
        info!("interactive session started as pid {}", guard.record().pid);
        let result = menu::run(ctx);
        guard.release();
        return result;
    }
    dispatch(action, ctx)
}

pub fn dispatch(action: Action, ctx: &Context) -> Result<i32> {
    info!("running {}", action.name());
    match action {
        Action::Menu => menu::run(ctx),
        Action::FullInstall => commands::install::full_install(ctx),
        Action::InstallApps { selection } => commands::helper::install_apps(ctx, &selection),
        Action::RemoveApps { selection } => commands::helper::remove_apps(ctx, &selection),
        Action::InstallDeps => commands::deps::execute(ctx),
        Action::Setup { update } => commands::helper::setup(ctx, update),
        Action::CheckBinder => commands::binder::execute(ctx),
        Action::Ui => commands::session::show_ui(ctx),
        Action::Multi => commands::session::multi_window(ctx),
        Action::Service(service) => commands::service::execute(ctx, service),
        Action::Certified => commands::helper::certified(ctx),
        Action::Hack { token } => commands::helper::hack(ctx, token),
        Action::Clean => commands::clean::execute(ctx),
        Action::Info { json } => commands::info::execute(ctx, json),
        Action::Config(config) => commands::config::execute(ctx, config),
        Action::Help => {
            cli::print_help()?;
            Ok(0)
        }
    }
}


#[cfg(test)]
mod tests {
    use std::fs;

    use runner::ScriptedRunner;
    use waydock_core::apps::{AppSelection, AppToken};
    use waydock_core::lock::LockError;
    use waydock_core::prompt::ScriptedPrompter;

    use super::testing::*;
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    fn parse(args: &[&str]) -> Action {
        let mut argv = vec!["waydock"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap().action().unwrap()
    }

    fn tree_entries(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
        let mut entries: Vec<_> = fs::read_dir(dir).unwrap().map(|e| e.unwrap().path()).collect();
        entries.sort();
        entries
    }

    #[test]
    fn test_menu_as_non_root_is_refused_without_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let env = user_env();
        let runner = ScriptedRunner::new();
        let prompter = ScriptedPrompter::default();
        let ctx = context(dir.path(), &env, &runner, &prompter, &NoProcesses);
        let before = tree_entries(dir.path());

        let err = run(parse(&[]), &ctx).unwrap_err();
        assert!(err.to_string().contains("must be run as root"));
        assert!(matches!(err.downcast_ref::<CoreError>(), Some(CoreError::RootRequired(_))));
        assert!(!ctx.paths.lock_file.exists());
        assert_eq!(tree_entries(dir.path()), before);
        assert!(runner.commands().is_empty());
    }

    #[test]
    fn test_clean_removes_any_lock_without_root() {
        let dir = tempfile::tempdir().unwrap();
        let env = user_env();
        let runner = ScriptedRunner::new();
        let prompter = ScriptedPrompter::default();
        let ctx = context(dir.path(), &env, &runner, &prompter, &AllAlive);
        fs::create_dir_all(ctx.paths.lock_file.parent().unwrap()).unwrap();
        fs::write(&ctx.paths.lock_file, "garbage, not a lock record").unwrap();

        assert_eq!(run(parse(&["clean"]), &ctx).unwrap(), 0);
        assert!(!ctx.paths.lock_file.exists());
        assert_eq!(run(parse(&["clean"]), &ctx).unwrap(), 0);
    }

    #[test]
    fn test_malformed_config_only_tolerated_by_clean() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[lock\nstale_after_secs = ").unwrap();

        let config = load_config(&path, &Action::Clean).unwrap();
        assert_eq!(config.paths.lock_file, Config::default_config().paths.lock_file);
        assert!(load_config(&path, &Action::Menu).is_err());
        assert!(load_config(&path, &Action::Info { json: false }).is_err());
    }

    #[test]
    fn test_install_tokens_forwarded_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        install_helper(dir.path());
        let env = root_env();
        let runner = ScriptedRunner::new();
        let prompter = ScriptedPrompter::default();
        let ctx = context(dir.path(), &env, &runner, &prompter, &NoProcesses);

        assert_eq!(run(parse(&["install", "gapps", "magisk"]), &ctx).unwrap(), 0);
        let python = dir.path().join("helper/venv/bin/python3").display().to_string();
        let invocations: Vec<_> = runner
            .commands()
            .into_iter()
            .filter(|cmd| cmd.program == python && cmd.args.first().map(String::as_str) == Some("main.py"))
            .collect();
        assert_eq!(invocations.len(), 1);
        assert_eq!(invocations[0].args[1..], ["install", "gapps", "magisk"]);
        assert_eq!(invocations[0].cwd.as_deref(), Some(dir.path().join("helper").as_path()));
    }

    #[test]
    fn test_helper_exit_code_becomes_result() {
        let dir = tempfile::tempdir().unwrap();
        install_helper(dir.path());
        let env = root_env();
        let runner = ScriptedRunner::new();
        let python = dir.path().join("helper/venv/bin/python3").display().to_string();
        runner.respond(&python, &["main.py", "uninstall"], runner::CommandOutcome::failed(2, ""));
        let prompter = ScriptedPrompter::default();
        let ctx = context(dir.path(), &env, &runner, &prompter, &NoProcesses);
        let selection = AppSelection::new(vec![AppToken::Gapps], None).unwrap();

        assert_eq!(run(Action::RemoveApps { selection }, &ctx).unwrap(), 2);
    }

    #[test]
    fn test_menu_refuses_while_lock_held() {
        let dir = tempfile::tempdir().unwrap();
        let env = root_env();
        let runner = ScriptedRunner::new();
        let prompter = ScriptedPrompter::default();
        let ctx = context(dir.path(), &env, &runner, &prompter, &AllAlive);
        fs::create_dir_all(ctx.paths.lock_file.parent().unwrap()).unwrap();
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs();
        let record = format!("4242|{now}");
        fs::write(&ctx.paths.lock_file, &record).unwrap();

        let err = run(Action::Menu, &ctx).unwrap_err();
        assert!(matches!(err.downcast_ref::<LockError>(), Some(LockError::Held { pid: 4242, .. })));
        assert_eq!(fs::read_to_string(&ctx.paths.lock_file).unwrap(), record);
    }

    #[test]
    fn test_menu_releases_lock_on_exit() {
        let dir = tempfile::tempdir().unwrap();
        let env = root_env();
        let runner = ScriptedRunner::new();
        let prompter = ScriptedPrompter::default();
        let ctx = context(dir.path(), &env, &runner, &prompter, &NoProcesses);

        assert_eq!(run(Action::Menu, &ctx).unwrap(), 0);
        assert!(!ctx.paths.lock_file.exists());
    }

    #[test]
    fn test_status_needs_no_root() {
        let dir = tempfile::tempdir().unwrap();
        let env = user_env();
        let runner = ScriptedRunner::new();
        let prompter = ScriptedPrompter::default();
        let ctx = context(dir.path(), &env, &runner, &prompter, &NoProcesses);
        assert_eq!(run(parse(&["status"]), &ctx).unwrap(), 0);
        assert!(runner.ran("systemctl", &["status", "waydroid-container"]));
    }

    #[test]
    fn test_start_requires_root() {
        let dir = tempfile::tempdir().unwrap();
        let env = user_env();
        let runner = ScriptedRunner::new();
        let prompter = ScriptedPrompter::default();
        let ctx = context(dir.path(), &env, &runner, &prompter, &NoProcesses);
        let err = run(parse(&["start"]), &ctx).unwrap_err();
        assert_eq!(
            err.to_string(),
            "this command must be run as root (try: sudo waydock start)"
        );
    }
}
