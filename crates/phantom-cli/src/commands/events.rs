//! Event subcommands.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, FixedOffset, NaiveDate};
use clap::{Args, Subcommand};
use colored::Colorize;

use phantom_core::models::{EventPatch, EventQuery, NewEvent};

use crate::context::{CliContext, api_result};
use crate::output;

#[derive(Args, Debug)]
pub struct EventsCommand {
    #[command(subcommand)]
    pub command: EventsSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum EventsSubcommand {
    /// List events, optionally within a time range
    List(ListArgs),

    /// Show a single event
    Show(ShowArgs),

    /// Create an event
    Create(CreateArgs),

    /// Mark an event completed
    Complete(IdArgs),

    /// Delete an event
    Delete(IdArgs),
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Range start (RFC 3339 or YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<String>,

    /// Range end (RFC 3339 or YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<String>,

    /// Only events in this category id
    #[arg(long)]
    pub category: Option<i64>,

    /// Only events whose category priority is at least this
    #[arg(long)]
    pub priority: Option<i32>,

    /// Print JSON, one event per line
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    pub id: i64,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    pub title: String,

    /// Category id
    #[arg(long)]
    pub category: i64,

    /// Start time (RFC 3339)
    #[arg(long)]
    pub start: String,

    /// End time (RFC 3339)
    #[arg(long)]
    pub end: String,

    #[arg(long)]
    pub description: Option<String>,

    /// Do not let the scheduler move this event
    #[arg(long)]
    pub fixed: bool,
}

#[derive(Args, Debug)]
pub struct IdArgs {
    pub id: i64,
}

pub async fn handle(ctx: &CliContext, cmd: EventsCommand) -> Result<()> {
    ctx.require_session().await?;

    match cmd.command {
        EventsSubcommand::List(args) => list(ctx, args).await,
        EventsSubcommand::Show(args) => show(ctx, args).await,
        EventsSubcommand::Create(args) => create(ctx, args).await,
        EventsSubcommand::Complete(args) => complete(ctx, args).await,
        EventsSubcommand::Delete(args) => delete(ctx, args).await,
    }
}

async fn list(ctx: &CliContext, args: ListArgs) -> Result<()> {
    let query = EventQuery {
        start_date: args.from.as_deref().map(parse_time).transpose()?,
        end_date: args.to.as_deref().map(parse_time).transpose()?,
        category: args.category,
        priority: args.priority,
    };

    let events = api_result(
        ctx.client().api().list_events(&query).await,
        "Failed to list events",
    )?;

    if events.is_empty() {
        eprintln!("{}", "No events found.".dimmed());
        return Ok(());
    }

    for event in &events {
        if args.json {
            output::json(event)?;
        } else {
            output::event_line(event);
        }
    }

    Ok(())
}

async fn show(ctx: &CliContext, args: ShowArgs) -> Result<()> {
    let event = api_result(
        ctx.client().api().get_event(args.id).await,
        "Failed to fetch event",
    )?;

    if args.pretty {
        output::json_pretty(&event)
    } else {
        output::json(&event)
    }
}

async fn create(ctx: &CliContext, args: CreateArgs) -> Result<()> {
    let mut event = NewEvent::new(
        args.title,
        args.category,
        parse_time(&args.start)?,
        parse_time(&args.end)?,
    );
    if let Some(description) = args.description {
        event = event.with_description(description);
    }
    if args.fixed {
        event = event.fixed();
    }

    let created = api_result(
        ctx.client().api().create_event(&event).await,
        "Failed to create event",
    )?;

    output::success("Event created");
    output::field("ID", &created.id.to_string());
    output::event_line(&created);

    Ok(())
}

async fn complete(ctx: &CliContext, args: IdArgs) -> Result<()> {
    let updated = api_result(
        ctx.client()
            .api()
            .update_event(args.id, &EventPatch::completed())
            .await,
        "Failed to update event",
    )?;

    output::success("Event completed");
    output::event_line(&updated);
    Ok(())
}

async fn delete(ctx: &CliContext, args: IdArgs) -> Result<()> {
    api_result(
        ctx.client().api().delete_event(args.id).await,
        "Failed to delete event",
    )?;

    output::success(&format!("Event {} deleted", args.id));
    Ok(())
}

/// Accept RFC 3339 timestamps, or a bare date meaning midnight UTC.
fn parse_time(s: &str) -> Result<DateTime<FixedOffset>> {
    if let Ok(time) = DateTime::parse_from_rfc3339(s) {
        return Ok(time);
    }

    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid time '{s}': expected RFC 3339 or YYYY-MM-DD"))?;
    let Some(midnight) = date.and_hms_opt(0, 0, 0) else {
        bail!("Invalid date '{s}'");
    };

    Ok(midnight.and_utc().fixed_offset())
}
