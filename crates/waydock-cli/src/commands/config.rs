use anyhow::{anyhow, Result};

use waydock_core::config::Config;

use crate::app::Context;
use crate::commands::ConfigAction;

pub fn execute(ctx: &Context, action: ConfigAction) -> Result<i32> {
    match action {
        ConfigAction::Print => {
            println!("# effective configuration ({})", ctx.paths.config_path.display());
            println!("{}", ctx.config.to_toml_string()?);
        }
        ConfigAction::Init { force } => {
            let path = &ctx.paths.config_path;
            if path.exists() && !force {
                return Err(anyhow!(
                    "Config already exists at {} (use --force to overwrite)",
                    path.display()
                ));
            }
            Config::default_config().save(path)?;
            println!("Config written to {}", path.display());
        }
    }
    Ok(0)
}
