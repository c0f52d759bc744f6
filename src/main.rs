use std::time::Duration;

use enginex_panel::app::{app, AppState};
use enginex_panel::elevation::{ElevationService, SweepOutcome};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up JWT_SECRET, TELEGRAM_*, etc.
    let _ = dotenvy::dotenv();

    // Initialize configuration (this loads the config singleton)
    let config = enginex_panel::config::config();
    enginex_panel::logging::init("info", &config.security);
    tracing::info!("Starting Enginex Panel in {:?} mode", config.environment);

    if config.security.jwt_secret.is_empty() {
        anyhow::bail!("JWT_SECRET must be set outside development");
    }

    let service = ElevationService::builder(config).build()?;

    // A window left open by a previous process is re-armed or rolled back now
    match service.recover()? {
        SweepOutcome::Idle => {}
        outcome => tracing::warn!("Recovered activation state on startup: {:?}", outcome),
    }
    service.spawn_sweeper(Duration::from_secs(config.elevation.sweep_interval_secs.max(1)));

    let state = AppState::new(service, &config.security.jwt_secret);
    let app = app(state, &config.security);

    let bind_addr = format!("{}:{}", config.server.bind_host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!("Enginex Panel listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
