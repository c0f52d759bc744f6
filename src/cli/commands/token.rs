use serde_json::json;

use crate::auth::{generate_jwt, Claims};
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::AppConfig;

/// Sign a session token with the configured secret. The panel's login flow
/// normally does this; the command exists for operators and local testing.
pub fn handle(user: &str, session: &str, config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    let claims = Claims::new(user, session, config.security.jwt_expiry_hours);
    let token = generate_jwt(&claims, &config.security.jwt_secret)?;

    match output_format {
        OutputFormat::Json => output_success(
            &output_format,
            "Token issued",
            Some(json!({ "token": token, "expires_at": claims.exp })),
        ),
        OutputFormat::Text => {
            println!("{}", token);
            Ok(())
        }
    }
}
