use anyhow::Result;
use log::info;

use waydock_core::apps::{AppSelection, AppToken};

use crate::app::{self, Context};
use crate::cli;
use crate::commands::{Action, ServiceAction};

const ENTRIES: [&str; 16] = [
    "Full install (dependencies, binder, firewall, container)",
    "Install dependencies and configure the firewall",
    "Set up or update the helper tool",
    "Check binder",
    "Launch the full UI",
    "Launch a multi-window session",
    "Start the container",
    "Stop the container",
    "Restart the container",
    "Container status",
    "Install apps",
    "Remove apps",
    "Apply a hack",
    "Get the Android ID for Play certification",
    "Show the detected environment",
    "Exit",
];

const HACKS: [AppToken; 2] = [AppToken::Nodataperm, AppToken::Hidestatusbar];

/// Interactive loop. Failures are reported and the loop continues; EOF or
/// "Exit" ends the session.
pub fn run(ctx: &Context) -> Result<i32> {
    reporting::heading("waydock");
    loop {
        let Some(choice) = ctx.prompter.select("What do you want to do?", &ENTRIES)? else {
            return Ok(0);
        };
        let action = match choice {
            0 => Some(Action::FullInstall),
            1 => Some(Action::InstallDeps),
            2 => Some(Action::Setup { update: true }),
            3 => Some(Action::CheckBinder),
            4 => Some(Action::Ui),
            5 => Some(Action::Multi),
            6 => Some(Action::Service(ServiceAction::Start)),
            7 => Some(Action::Service(ServiceAction::Stop)),
            8 => Some(Action::Service(ServiceAction::Restart)),
            9 => Some(Action::Service(ServiceAction::Status)),
            10 => prompt_selection(ctx, true)?.map(|selection| Action::InstallApps { selection }),
            11 => prompt_selection(ctx, false)?.map(|selection| Action::RemoveApps { selection }),
            12 => prompt_hack(ctx)?.map(|token| Action::Hack { token }),
            13 => Some(Action::Certified),
            14 => Some(Action::Info { json: false }),
            _ => {
                info!("menu exited");
                return Ok(0);
            }
        };
        let Some(action) = action else {
            continue;
        };
        let name = action.name();
        match app::dispatch(action, ctx) {
            Ok(0) => {}
            Ok(code) => reporting::warning(&format!("{name} finished with exit code {code}")),
            Err(err) => reporting::failure(&format!("{name}: {err:#}")),
        }
    }
}

/// Parses "1 5 magisk"-style input: menu numbers or token names.
pub fn parse_app_input(line: &str) -> Result<Vec<String>, String> {
    line.split_whitespace()
        .map(|word| match word.parse::<usize>() {
            Ok(number) if (1..=AppToken::ALL.len()).contains(&number) => {
                Ok(AppToken::ALL[number - 1].to_string())
            }
            Ok(number) => Err(format!("no app numbered {number}")),
            Err(_) => Ok(word.to_string()),
        })
        .collect()
}

fn prompt_selection(ctx: &Context, install: bool) -> Result<Option<AppSelection>> {
    println!();
    for (index, token) in AppToken::ALL.iter().enumerate() {
        println!("  {:>2}) {:<14} {}", index + 1, token.as_str(), token.label());
    }
    let Some(line) = ctx.prompter.input("Apps (numbers or names, space separated): ")? else {
        return Ok(None);
    };
    let words = match parse_app_input(&line) {
        Ok(words) if words.is_empty() => return Ok(None),
        Ok(words) => words,
        Err(message) => {
            reporting::failure(&message);
            return Ok(None);
        }
    };
    let tokens = match cli::parse_tokens(&words) {
        Ok(tokens) => tokens,
        Err(err) => {
            reporting::failure(&err.to_string());
            return Ok(None);
        }
    };
    if !install {
        return Ok(Some(AppSelection::without_certificate(tokens)));
    }

    let ca_cert = if tokens.contains(&AppToken::Mitm) {
        ctx.prompter
            .input("Path to the CA certificate: ")?
            .map(std::path::PathBuf::from)
    } else {
        None
    };
    match cli::selection(&words, ca_cert) {
        Ok(selection) => Ok(Some(selection)),
        Err(err) => {
            reporting::failure(&err.to_string());
            Ok(None)
        }
    }
}

fn prompt_hack(ctx: &Context) -> Result<Option<AppToken>> {
    let labels: Vec<&str> = HACKS.iter().map(|token| token.label()).collect();
    let choice = ctx.prompter.select("Which hack?", &labels)?;
    Ok(choice.and_then(|index| HACKS.get(index).copied()))
}
