use anyhow::Result;

use crate::app::Context;

/// Removes the lock file whatever it contains; no root, no state checks.
pub fn execute(ctx: &Context) -> Result<i32> {
    let manager = ctx.lock_manager();
    if manager.force_clean()? {
        println!("Removed lock file {}", manager.path().display());
    } else {
        println!("No lock file at {}", manager.path().display());
    }
    Ok(0)
}
