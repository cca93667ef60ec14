//! Subcommand implementations.

pub mod calendar;
pub mod categories;
pub mod chat;
pub mod events;
pub mod login;
pub mod logout;
pub mod preferences;
pub mod register;
pub mod whoami;

use anyhow::Result;

use crate::cli::{Commands, ConnectionArgs};
use crate::context::CliContext;

pub async fn handle(cmd: Commands, connection: &ConnectionArgs) -> Result<()> {
    let ctx = CliContext::open(connection)?;

    match cmd {
        Commands::Login(args) => login::run(&ctx, args).await,
        Commands::Register(args) => register::run(&ctx, args).await,
        Commands::Logout(args) => logout::run(&ctx, args).await,
        Commands::Whoami(args) => whoami::run(&ctx, args).await,
        Commands::Events(cmd) => events::handle(&ctx, cmd).await,
        Commands::Categories(args) => categories::run(&ctx, args).await,
        Commands::Chat(args) => chat::run(&ctx, args).await,
        Commands::Preferences(args) => preferences::run(&ctx, args).await,
        Commands::Calendar(args) => calendar::run(&ctx, args).await,
    }
}
