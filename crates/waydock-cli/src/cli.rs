use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};

use waydock_core::apps::{AppSelection, AppToken};
use waydock_core::error::CoreError;

use crate::commands::{Action, ConfigAction, ServiceAction};

#[derive(Parser, Debug)]
#[command(
    name = "waydock",
    version,
    about = "Install and manage the WayDroid Android container",
    disable_help_subcommand = true
)]
pub struct Cli {
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log debug output to the log file
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Answer yes to every confirmation
    #[arg(long, short, global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Full provisioning, or install apps through the helper when tokens are given
    Install {
        tokens: Vec<String>,
        #[arg(long)]
        ca_cert: Option<PathBuf>,
    },
    /// Install apps through the helper tool
    #[command(name = "install-apps", alias = "install-cmd")]
    InstallApps {
        #[arg(required = true)]
        tokens: Vec<String>,
        #[arg(long)]
        ca_cert: Option<PathBuf>,
    },
    /// Remove apps through the helper tool
    #[command(alias = "uninstall")]
    Remove {
        #[arg(required = true)]
        tokens: Vec<String>,
    },
    /// Install packages and configure the firewall
    InstallDeps,
    /// Clone or update the helper tool
    Setup {
        #[arg(long)]
        no_update: bool,
    },
    /// Detect binder and provision it when missing
    CheckBinder,
    /// Launch the full Android UI
    Ui,
    /// Launch a session in multi-window mode
    Multi,
    Start,
    Stop,
    Restart,
    Status,
    /// Print the Android ID for Play certification
    Certified,
    /// Apply a single helper hack
    Hack { token: String },
    /// Remove the lock file left by a previous run
    Clean,
    /// Print the detected environment
    Info {
        #[arg(long)]
        json: bool,
    },
    Config {
        #[arg(long, conflicts_with = "init")]
        print: bool,
        #[arg(long)]
        init: bool,
        #[arg(long, requires = "init")]
        force: bool,
    },
    Help,
}

impl Cli {
    pub fn action(self) -> Result<Action, CoreError> {
        match self.command {
            Some(command) => Action::try_from(command),
            None => Ok(Action::Menu),
        }
    }
}

pub fn print_help() -> Result<()> {
    Cli::command().print_help()?;
    println!();
    Ok(())
}

/// Parses tokens against the fixed vocabulary; the first unknown token is a typed error.
pub fn parse_tokens(tokens: &[String]) -> Result<Vec<AppToken>, CoreError> {
    tokens.iter().map(|token| token.parse::<AppToken>()).collect()
}

pub fn selection(tokens: &[String], ca_cert: Option<PathBuf>) -> Result<AppSelection, CoreError> {
    if let Some(cert) = &ca_cert {
        if !cert.is_file() {
            return Err(CoreError::InvalidConfig(format!(
                "certificate {} does not exist",
                cert.display()
            )));
        }
    }
    AppSelection::new(parse_tokens(tokens)?, ca_cert)
}

impl TryFrom<Commands> for Action {
    type Error = CoreError;

    fn try_from(command: Commands) -> Result<Self, Self::Error> {
        let action = match command {
            Commands::Install { tokens, ca_cert } if tokens.is_empty() => {
                if ca_cert.is_some() {
                    return Err(CoreError::InvalidConfig(
                        "--ca-cert only applies when installing apps".to_string(),
                    ));
                }
                Action::FullInstall
            }
            Commands::Install { tokens, ca_cert } | Commands::InstallApps { tokens, ca_cert } => {
                Action::InstallApps {
                    selection: selection(&tokens, ca_cert)?,
                }
            }
            Commands::Remove { tokens } => Action::RemoveApps {
                selection: AppSelection::without_certificate(parse_tokens(&tokens)?),
            },
            Commands::InstallDeps => Action::InstallDeps,
            Commands::Setup { no_update } => Action::Setup { update: !no_update },
            Commands::CheckBinder => Action::CheckBinder,
            Commands::Ui => Action::Ui,
            Commands::Multi => Action::Multi,
            Commands::Start => Action::Service(ServiceAction::Start),
            Commands::Stop => Action::Service(ServiceAction::Stop),
            Commands::Restart => Action::Service(ServiceAction::Restart),
            Commands::Status => Action::Service(ServiceAction::Status),
            Commands::Certified => Action::Certified,
            Commands::Hack { token } => Action::Hack {
                token: token.parse()?,
            },
            Commands::Clean => Action::Clean,
            Commands::Info { json } => Action::Info { json },
            Commands::Config { init: true, force, .. } => Action::Config(ConfigAction::Init { force }),
            Commands::Config { .. } => Action::Config(ConfigAction::Print),
            Commands::Help => Action::Help,
        };
        Ok(action)
    }
}
