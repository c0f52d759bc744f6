use clap::Subcommand;

use crate::cli::utils::output_outcome;
use crate::cli::OutputFormat;
use crate::elevation::ElevationService;

#[derive(Subcommand)]
pub enum GrantCommands {
    #[command(about = "Show a session's grant")]
    Show {
        #[arg(long, help = "Session id")]
        session: String,
    },

    #[command(about = "Revoke a session's grant")]
    Revoke {
        #[arg(long, help = "Session id")]
        session: String,
    },
}

pub async fn handle(cmd: GrantCommands, service: &ElevationService, output_format: OutputFormat) -> anyhow::Result<()> {
    let outcome = match cmd {
        GrantCommands::Show { session } => service.status(&session).await,
        GrantCommands::Revoke { session } => service.revoke_grant(&session).await,
    };
    output_outcome(&output_format, outcome)
}
