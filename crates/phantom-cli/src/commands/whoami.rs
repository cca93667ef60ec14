//! Whoami command implementation.

use anyhow::Result;
use clap::Args;

use crate::context::CliContext;
use crate::output;

#[derive(Args, Debug)]
pub struct WhoamiArgs {
    /// Print the session state as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(ctx: &CliContext, args: WhoamiArgs) -> Result<()> {
    if args.json {
        let state = ctx.client().bootstrap().await;
        return output::json(&state);
    }

    let user = ctx.require_session().await?;

    output::field("Username", &user.username);
    output::field("User ID", &user.user_id.to_string());
    output::field("API", ctx.client().api().rest().config().api_url.as_str());
    output::field("Store", &ctx.store_path().display().to_string());

    Ok(())
}
