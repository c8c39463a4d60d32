use anyhow::Result;

use provision::packages::{install_dependencies, resolve_family};

use crate::app::Context;

/// Packages plus firewall; no binder or container work.
pub fn execute(ctx: &Context) -> Result<i32> {
    let profile = ctx.prober().host_profile();
    reporting::heading("Dependencies");
    let family = resolve_family(&profile, ctx.prompter)?;
    install_dependencies(ctx.runner, family)?;

    reporting::heading("Firewall");
    provision::firewall::configure(ctx.runner, &ctx.config.firewall.interface)?;
    Ok(0)
}
