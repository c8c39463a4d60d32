use anyhow::Result;

use crate::app::Context;

pub fn execute(ctx: &Context, json: bool) -> Result<i32> {
    let report = ctx.prober().report()?;
    if json {
        println!("{}", reporting::json::render_environment(&report));
    } else {
        println!("{}", reporting::human::environment_summary(&report));
    }
    Ok(0)
}
