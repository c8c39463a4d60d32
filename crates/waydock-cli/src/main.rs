use anyhow::Result;
use clap::Parser;

use runner::SystemRunner;
use waydock_core::config::{ConfigPaths, HostRoot};
use waydock_core::env::EnvSnapshot;
use waydock_core::lock::SystemProcessTable;
use waydock_core::prompt::StdinPrompter;

mod app;
mod cli;
mod commands;
mod logging;
mod menu;

use app::Context;
use cli::Cli;
use commands::Action;

fn main() {
    // Unknown commands exit 1 like every other failure; --help and --version exit 0.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() { 1 } else { 0 };
            let _ = err.print();
            std::process::exit(code);
        }
    };
    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            reporting::failure(&format!("{err:#}"));
            1
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let verbose = cli.verbose;
    let assume_yes = cli.yes;
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(ConfigPaths::default_config_path);
    let action = cli.action()?;

    let config = app::load_config(&config_path, &action)?;
    let paths = ConfigPaths::resolve(config_path, &config)?;
    let env = EnvSnapshot::capture();

    // clean and refused commands must not create the log file.
    if action != Action::Clean && app::check_privileges(&action, &env).is_ok() {
        logging::init(&paths.log_file, verbose);
    }

    let runner = SystemRunner::new();
    let prompter = StdinPrompter::new(assume_yes);
    let procs = SystemProcessTable;
    let ctx = Context {
        config,
        paths,
        root: HostRoot::default(),
        env: &env,
        runner: &runner,
        prompter: &prompter,
        procs: &procs,
    };
    app::run(action, &ctx)
}
