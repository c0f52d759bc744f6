use clap::Subcommand;

use crate::cli::utils::output_outcome;
use crate::cli::OutputFormat;
use crate::elevation::{ElevationService, DEFAULT_ACTION};

#[derive(Subcommand)]
pub enum ChallengeCommands {
    #[command(about = "Issue a code for a session and send it out-of-band")]
    Request {
        #[arg(long, help = "Session id")]
        session: String,
        #[arg(long, default_value = DEFAULT_ACTION, help = "Action the code authorizes")]
        action: String,
    },

    #[command(about = "Verify a code for a session")]
    Verify {
        #[arg(long, help = "Session id")]
        session: String,
        #[arg(help = "Six character code")]
        code: String,
    },
}

pub async fn handle(cmd: ChallengeCommands, service: &ElevationService, output_format: OutputFormat) -> anyhow::Result<()> {
    let outcome = match cmd {
        ChallengeCommands::Request { session, action } => service.request_challenge(&session, &action).await,
        ChallengeCommands::Verify { session, code } => service.verify_challenge(&session, &code).await,
    };
    output_outcome(&output_format, outcome)
}
