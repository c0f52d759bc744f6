use clap::Parser;
use enginex_panel::cli::utils::ReportedError;
use enginex_panel::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let config = enginex_panel::config::config();
    enginex_panel::logging::init("warn", &config.security);

    let cli = Cli::parse();

    if let Err(e) = enginex_panel::cli::run(cli, config).await {
        if e.downcast_ref::<ReportedError>().is_none() {
            match std::env::var("CLI_VERBOSE").as_deref() {
                Ok("true") | Ok("1") => eprintln!("Error: {e:?}"),
                _ => eprintln!("Error: {e}"),
            }
        }
        std::process::exit(1);
    }

    Ok(())
}
