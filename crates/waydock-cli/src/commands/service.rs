use anyhow::Result;

use runner::{run_step, RunnerCommand};

use crate::app::Context;
use crate::commands::ServiceAction;

pub const CONTAINER_UNIT: &str = "waydroid-container";

pub fn systemctl(verb: &str) -> RunnerCommand {
    RunnerCommand::new("systemctl", [verb, CONTAINER_UNIT])
}

pub fn execute(ctx: &Context, action: ServiceAction) -> Result<i32> {
    let (verb, done) = match action {
        ServiceAction::Start => ("start", "Container started"),
        ServiceAction::Stop => ("stop", "Container stopped"),
        ServiceAction::Restart => ("restart", "Container restarted"),
        ServiceAction::Status => {
            let outcome = ctx
                .runner
                .run(&systemctl("status").arg("--no-pager").inherit_output())?;
            return Ok(outcome.exit_code());
        }
    };
    run_step(ctx.runner, &format!("{verb} container"), &systemctl(verb))?;
    reporting::success(done);
    Ok(0)
}
