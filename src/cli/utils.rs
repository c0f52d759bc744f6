use serde_json::{json, Value};

use crate::cli::OutputFormat;
use crate::elevation::ElevationOutcome;

/// Output a success message in the appropriate format
pub fn output_success(output_format: &OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let (Some(Value::Object(fields)), Some(target)) = (data, response.as_object_mut()) {
                target.extend(fields);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output an error message in the appropriate format
pub fn output_error(output_format: &OutputFormat, message: &str, error_code: Option<&str>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": false,
                "error": message
            });

            if let Some(code) = error_code {
                response["error_code"] = json!(code);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            eprintln!("Error: {}", message);
        }
    }
    Ok(())
}

/// Print an elevation outcome. A failed outcome also fails the command so
/// scripts see a non-zero exit.
pub fn output_outcome(output_format: &OutputFormat, outcome: ElevationOutcome) -> anyhow::Result<()> {
    if outcome.success {
        return output_success(output_format, &outcome.message, outcome.data);
    }

    let code = outcome.failure.map(|kind| format!("{:?}", kind));
    output_error(output_format, &outcome.message, code.as_deref())?;
    Err(ReportedError.into())
}

/// Marker for failures already printed by `output_outcome`
#[derive(Debug, thiserror::Error)]
#[error("command failed")]
pub struct ReportedError;
