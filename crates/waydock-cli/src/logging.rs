use std::fs::OpenOptions;
use std::path::Path;

use env_logger::{Env, Target};
use log::LevelFilter;

/// Mirrors log records into `log_file`; falls back to warnings on stderr when
/// the file cannot be opened. Never fatal.
pub fn init(log_file: &Path, verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let file = log_file
        .parent()
        .map(std::fs::create_dir_all)
        .transpose()
        .and_then(|_| OpenOptions::new().create(true).append(true).open(log_file));

    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or(default_level));
    builder.format_timestamp_secs();
    match file {
        Ok(file) => {
            builder.target(Target::Pipe(Box::new(file)));
        }
        Err(_) => {
            builder.target(Target::Stderr).filter_level(LevelFilter::Warn);
        }
    }
    // A second init (tests, menu re-entry) keeps the first logger.
    let _ = builder.try_init();
}
