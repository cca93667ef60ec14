//! Google Calendar integration commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;

use crate::context::{CliContext, api_result};
use crate::output;

#[derive(Args, Debug)]
pub struct CalendarArgs {
    #[command(subcommand)]
    pub command: CalendarSubcommand,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum CalendarSubcommand {
    /// Show whether a Google account is linked
    Status,

    /// Print the URL that links a Google account
    Connect,

    /// Unlink the Google account
    Disconnect,
}

pub async fn run(ctx: &CliContext, args: CalendarArgs) -> Result<()> {
    ctx.require_session().await?;
    let api = ctx.client().api();

    match args.command {
        CalendarSubcommand::Status => {
            let status = api_result(
                api.google_calendar_status().await,
                "Failed to fetch calendar status",
            )?;
            if args.json {
                return output::json(&status);
            }
            let state = if status.connected {
                "connected".green()
            } else {
                "not connected".yellow()
            };
            output::field("Google Calendar", &state.to_string());
        }
        CalendarSubcommand::Connect => {
            let connect = api_result(
                api.google_calendar_connect().await,
                "Failed to start calendar authorization",
            )?;
            if args.json {
                return output::json(&connect);
            }
            println!("Open this URL to grant calendar access:");
            println!("{}", connect.authorization_url.bold());
        }
        CalendarSubcommand::Disconnect => {
            let reply = api_result(
                api.google_calendar_disconnect().await,
                "Failed to disconnect calendar",
            )?;
            if args.json {
                return output::json(&reply);
            }
            output::success("Google Calendar disconnected");
        }
    }

    Ok(())
}
