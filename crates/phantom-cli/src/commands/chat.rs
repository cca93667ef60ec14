use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;

use crate::context::{CliContext, api_result};
use crate::output;

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Message to send to the assistant
    pub message: Option<String>,

    /// Show the most recent exchanges instead of sending a message
    #[arg(long, value_name = "LIMIT", conflicts_with = "message")]
    pub history: Option<u32>,

    /// Print the raw JSON reply
    #[arg(long)]
    pub json: bool,
}

pub async fn run(ctx: &CliContext, args: ChatArgs) -> Result<()> {
    ctx.require_session().await?;
    let api = ctx.client().api();

    if let Some(limit) = args.history {
        let history = api_result(api.chat_history(limit).await, "Failed to fetch chat history")?;
        if args.json {
            return output::json(&history);
        }

        for exchange in &history.conversations {
            println!(
                "{} {}",
                exchange.timestamp.format("%Y-%m-%d %H:%M").to_string().dimmed(),
                exchange.intent.dimmed()
            );
            println!("  {} {}", "you:".bold(), exchange.message);
            println!("  {} {}", "assistant:".bold(), exchange.response);
        }
        return Ok(());
    }

    let Some(message) = args.message else {
        bail!("Nothing to send. Pass a message or --history");
    };

    let reply = api_result(api.send_chat(&message).await, "Failed to send message")?;
    if args.json {
        return output::json(&reply);
    }

    println!("{}", reply.response);
    if let Some(ref error) = reply.error {
        output::error(error);
    }
    if !reply.actions.is_empty() {
        output::field("Actions", &reply.actions.len().to_string());
    }

    Ok(())
}
