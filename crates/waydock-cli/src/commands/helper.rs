use anyhow::Result;

use helper_bridge::HelperBridge;
use waydock_core::apps::{AppSelection, AppToken};

use crate::app::Context;

pub const CERTIFICATION_URL: &str = "https://www.google.com/android/uncertified";

pub fn setup(ctx: &Context, update: bool) -> Result<i32> {
    let helper = ctx.helper();
    reporting::heading("Helper tool");
    reporting::step(&format!("Preparing {}", helper.dir().display()));
    helper.ensure_present(update)?;
    reporting::success("Helper tool ready");
    Ok(0)
}

/// Clones the helper on first use; never pulls.
fn prepared<'c>(ctx: &'c Context) -> Result<HelperBridge<'c>> {
    let helper = ctx.helper();
    helper.ensure_present(false)?;
    Ok(helper)
}

fn finish(what: &str, code: i32) -> Result<i32> {
    if code == 0 {
        reporting::success(&format!("{what} finished"));
    } else {
        reporting::failure(&format!("{what} failed (helper exit code {code})"));
    }
    Ok(code)
}

pub fn install_apps(ctx: &Context, selection: &AppSelection) -> Result<i32> {
    let helper = prepared(ctx)?;
    reporting::step(&format!("Installing {}", selection.to_args().join(" ")));
    finish("App install", helper.install(selection)?)
}

pub fn remove_apps(ctx: &Context, selection: &AppSelection) -> Result<i32> {
    let helper = prepared(ctx)?;
    reporting::step(&format!("Removing {}", selection.to_args().join(" ")));
    finish("App removal", helper.uninstall(selection)?)
}

pub fn hack(ctx: &Context, token: AppToken) -> Result<i32> {
    let helper = prepared(ctx)?;
    reporting::step(&format!("Applying hack {token}"));
    finish("Hack", helper.hack(token)?)
}

pub fn certified(ctx: &Context) -> Result<i32> {
    let helper = prepared(ctx)?;
    let code = helper.certified()?;
    if code == 0 {
        reporting::success(&format!(
            "Register the Android ID printed above at {CERTIFICATION_URL}"
        ));
    }
    finish("Certification lookup", code)
}
