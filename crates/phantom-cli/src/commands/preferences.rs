use anyhow::Result;
use clap::Args;

use phantom_core::models::{Preferences, PreferencesPatch};

use crate::context::{CliContext, api_result};
use crate::output;

#[derive(Args, Debug)]
pub struct PreferencesArgs {
    /// Set the timezone (IANA name, e.g. Asia/Dhaka)
    #[arg(long)]
    pub timezone: Option<String>,

    /// Set the default event duration in minutes
    #[arg(long, value_name = "MINUTES")]
    pub duration: Option<u32>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(ctx: &CliContext, args: PreferencesArgs) -> Result<()> {
    ctx.require_session().await?;
    let api = ctx.client().api();

    let patch = PreferencesPatch {
        timezone: args.timezone,
        default_event_duration: args.duration,
    };

    let preferences = if patch.is_empty() {
        api_result(api.preferences().await, "Failed to fetch preferences")?
    } else {
        let updated = api_result(
            api.update_preferences(&patch).await,
            "Failed to update preferences",
        )?;
        if !args.json {
            output::success("Preferences updated");
        }
        updated
    };

    if args.json {
        output::json(&preferences)
    } else {
        print_preferences(&preferences);
        Ok(())
    }
}

fn print_preferences(preferences: &Preferences) {
    output::field("Timezone", &preferences.timezone);
    output::field(
        "Default duration",
        &format!("{} min", preferences.default_event_duration),
    );
}
