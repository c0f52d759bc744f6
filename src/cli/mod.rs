pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::elevation::ElevationService;

#[derive(Parser)]
#[command(name = "enginex")]
#[command(about = "Enginex CLI - Operator tooling for temporary privilege elevation")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Roll back an overdue activation and purge expired rows (for a systemd timer)")]
    Sweep {
        #[arg(long, value_name = "SECS", help = "Wait this many seconds before sweeping")]
        after: Option<u64>,
    },

    #[command(about = "Show the activation window and optionally a session's grant")]
    Status {
        #[arg(long, help = "Session id to include grant details for")]
        session: Option<String>,
    },

    #[command(about = "Activate privileges for a session that verified a challenge")]
    Activate {
        #[arg(long, help = "Session id")]
        session: String,
        #[arg(long, help = "User id recorded on the grant")]
        user: String,
    },

    #[command(about = "Close the privilege window now")]
    Deactivate,

    #[command(about = "Challenge issue and verification")]
    Challenge {
        #[command(subcommand)]
        cmd: commands::challenge::ChallengeCommands,
    },

    #[command(about = "Session grant management")]
    Grant {
        #[command(subcommand)]
        cmd: commands::grant::GrantCommands,
    },

    #[command(about = "Mint a session token for the HTTP API")]
    Token {
        #[arg(long, help = "User id (sub claim)")]
        user: String,
        #[arg(long, help = "Session id (sid claim)")]
        session: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli, config: &AppConfig) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let service = || ElevationService::builder(config).build();

    match cli.command {
        Commands::Sweep { after } => {
            if let Some(secs) = after {
                tokio::time::sleep(std::time::Duration::from_secs(secs)).await;
            }
            commands::privilege::sweep(&service()?, output_format).await
        }
        Commands::Status { session } => {
            commands::privilege::status(&service()?, session.as_deref(), output_format).await
        }
        Commands::Activate { session, user } => {
            commands::privilege::activate(&service()?, &session, &user, output_format).await
        }
        Commands::Deactivate => commands::privilege::deactivate(&service()?, output_format).await,
        Commands::Challenge { cmd } => commands::challenge::handle(cmd, &service()?, output_format).await,
        Commands::Grant { cmd } => commands::grant::handle(cmd, &service()?, output_format).await,
        Commands::Token { user, session } => commands::token::handle(&user, &session, config, output_format),
    }
}
