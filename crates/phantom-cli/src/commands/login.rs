//! Login command implementation.

use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;

use crate::context::CliContext;
use crate::output;

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Account username
    #[arg(long)]
    pub username: String,

    /// Account password
    #[arg(long, env = "PHANTOM_PASSWORD", hide_env_values = true)]
    pub password: String,
}

pub async fn run(ctx: &CliContext, args: LoginArgs) -> Result<()> {
    eprintln!("{}", "Logging in...".dimmed());

    let outcome = ctx.client().login(&args.username, &args.password).await;
    if !outcome.success {
        let message = outcome.error.unwrap_or_else(|| "Login failed".to_string());
        output::error(&message);
        bail!("Login failed");
    }

    output::success("Logged in successfully");
    println!();
    if let Some(user) = ctx.client().session().user() {
        output::field("Username", &user.username);
        output::field("User ID", &user.user_id.to_string());
    }

    Ok(())
}
