//! Output formatting helpers.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use phantom_core::models::{Category, Event};

/// Print a success message.
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print an error message.
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a labeled field.
pub fn field(label: &str, value: &str) {
    println!("{}: {}", label.dimmed(), value);
}

/// Print a value as compact JSON.
pub fn json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string(value)?;
    println!("{}", json);
    Ok(())
}

/// Print a value as pretty-printed JSON.
pub fn json_pretty<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

/// One line per event: id, time range, title and category.
pub fn event_line(event: &Event) {
    let done = if event.is_completed { "✓" } else { " " };
    let category = event.category_name.as_deref().unwrap_or("-");
    println!(
        "{} {:>5}  {} → {}  {}  {}",
        done.green(),
        event.id,
        event.start_time.format("%Y-%m-%d %H:%M"),
        event.end_time.format("%H:%M"),
        event.title.bold(),
        category.dimmed()
    );
}

pub fn category_line(category: &Category) {
    println!(
        "{:>3}  {}  {}  {}",
        category.id,
        category.name.bold(),
        format!("priority {}", category.priority_level).dimmed(),
        category.color
    );
}
