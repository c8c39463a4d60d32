use anyhow::Result;

use provision::BinderProvisioner;

use crate::app::Context;

pub fn execute(ctx: &Context) -> Result<i32> {
    let prober = ctx.prober();
    reporting::heading("Binder");
    let state = prober.binder_state();
    reporting::step(&format!("Binder state: {state}"));
    if state.is_working() {
        reporting::success("Binder is working");
        return Ok(0);
    }
    let profile = prober.host_profile();
    let resolution = BinderProvisioner::new(
        ctx.runner,
        ctx.prompter,
        ctx.root.clone(),
        &ctx.config.binder,
        &profile,
    )
    .provision()?;
    log::info!("binder provisioned: {resolution:?}");
    Ok(0)
}
