//! Categories command implementation.

use anyhow::Result;
use clap::Args;

use crate::context::{CliContext, api_result};
use crate::output;

#[derive(Args, Debug)]
pub struct CategoriesArgs {
    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

pub async fn run(ctx: &CliContext, args: CategoriesArgs) -> Result<()> {
    ctx.require_session().await?;

    let categories = api_result(
        ctx.client().api().list_categories().await,
        "Failed to list categories",
    )?;

    if args.json {
        return output::json(&categories);
    }

    for category in &categories {
        output::category_line(category);
    }

    Ok(())
}
