//! Logout command implementation.

use anyhow::Result;
use clap::Args;

use crate::context::CliContext;
use crate::output;

#[derive(Args, Debug)]
pub struct LogoutArgs {}

pub async fn run(ctx: &CliContext, _args: LogoutArgs) -> Result<()> {
    ctx.client().logout().await;
    output::success("Logged out");
    Ok(())
}
