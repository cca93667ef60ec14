//! Register command implementation.

use anyhow::{Result, bail};
use clap::Args;

use crate::context::CliContext;
use crate::output;

#[derive(Args, Debug)]
pub struct RegisterArgs {
    /// Username (letters, digits and @.+-_)
    #[arg(long)]
    pub username: String,

    /// Display name
    #[arg(long)]
    pub name: String,

    /// Password (at least 8 characters)
    #[arg(long, env = "PHANTOM_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Password confirmation (defaults to --password)
    #[arg(long)]
    pub password_confirm: Option<String>,
}

pub async fn run(ctx: &CliContext, args: RegisterArgs) -> Result<()> {
    let confirm = args.password_confirm.as_deref().unwrap_or(&args.password);

    let outcome = ctx
        .client()
        .register(&args.username, &args.name, &args.password, confirm)
        .await;

    if !outcome.success {
        let message = outcome
            .error
            .unwrap_or_else(|| "Registration failed".to_string());
        output::error(&message);
        bail!("Registration failed");
    }

    output::success("Account created");
    output::field("Username", &args.username);
    println!();
    println!("Run 'phantom login --username {}' to sign in.", args.username);

    Ok(())
}
