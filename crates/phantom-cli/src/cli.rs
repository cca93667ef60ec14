//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::commands::{
    calendar, categories, chat, events, login, logout, preferences, register, whoami,
};

/// Command-line client for the Phantom scheduling API.
#[derive(Parser, Debug)]
#[command(name = "phantom")]
#[command(author, version = env!("PHANTOM_VERSION"), about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where the API and the token file live.
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// API base URL
    #[arg(long, env = "PHANTOM_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Token file (defaults to the platform data directory)
    #[arg(long, env = "PHANTOM_STORE", global = true)]
    pub store: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, env = "PHANTOM_TIMEOUT_SECS", global = true)]
    pub timeout: Option<u64>,

    /// Token verification endpoint, relative to the API URL
    #[arg(long, env = "PHANTOM_VERIFY_PATH", global = true)]
    pub verify_path: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in and store the session
    Login(login::LoginArgs),

    /// Create a new account
    Register(register::RegisterArgs),

    /// Sign out and forget the stored session
    Logout(logout::LogoutArgs),

    /// Display the signed-in user
    Whoami(whoami::WhoamiArgs),

    /// Calendar events
    Events(events::EventsCommand),

    /// List event categories
    Categories(categories::CategoriesArgs),

    /// Talk to the scheduling assistant
    Chat(chat::ChatArgs),

    /// Show or change preferences
    Preferences(preferences::PreferencesArgs),

    /// Google Calendar connection
    Calendar(calendar::CalendarArgs),
}
