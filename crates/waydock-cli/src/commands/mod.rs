use waydock_core::apps::{AppSelection, AppToken};

pub mod binder;
pub mod clean;
pub mod config;
pub mod deps;
pub mod helper;
pub mod info;
pub mod install;
pub mod service;
pub mod session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    Start,
    Stop,
    Restart,
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigAction {
    Print,
    Init { force: bool },
}

/// One dispatchable operation, from the command line or the menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Menu,
    FullInstall,
    InstallApps { selection: AppSelection },
    RemoveApps { selection: AppSelection },
    InstallDeps,
    Setup { update: bool },
    CheckBinder,
    Ui,
    Multi,
    Service(ServiceAction),
    Certified,
    Hack { token: AppToken },
    Clean,
    Info { json: bool },
    Config(ConfigAction),
    Help,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Menu => "",
            Action::FullInstall => "install",
            Action::InstallApps { .. } => "install",
            Action::RemoveApps { .. } => "remove",
            Action::InstallDeps => "install-deps",
            Action::Setup { .. } => "setup",
            Action::CheckBinder => "check-binder",
            Action::Ui => "ui",
            Action::Multi => "multi",
            Action::Service(ServiceAction::Start) => "start",
            Action::Service(ServiceAction::Stop) => "stop",
            Action::Service(ServiceAction::Restart) => "restart",
            Action::Service(ServiceAction::Status) => "status",
            Action::Certified => "certified",
            Action::Hack { .. } => "hack",
            Action::Clean => "clean",
            Action::Info { .. } => "info",
            Action::Config(_) => "config",
            Action::Help => "help",
        }
    }

    pub fn requires_root(&self) -> bool {
        !matches!(
            self,
            Action::Clean
                | Action::Help
                | Action::Info { .. }
                | Action::Config(_)
                | Action::Service(ServiceAction::Status)
        )
    }

    /// Only the interactive session holds the instance lock.
    pub fn takes_lock(&self) -> bool {
        matches!(self, Action::Menu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privilege_table() {
        assert!(Action::Menu.requires_root());
        assert!(Action::FullInstall.requires_root());
        assert!(Action::Service(ServiceAction::Start).requires_root());
        assert!(!Action::Service(ServiceAction::Status).requires_root());
        assert!(!Action::Clean.requires_root());
        assert!(!Action::Help.requires_root());
    }

    #[test]
    fn test_only_menu_takes_lock() {
        assert!(Action::Menu.takes_lock());
        assert!(!Action::FullInstall.takes_lock());
        assert!(!Action::Clean.takes_lock());
    }
}
