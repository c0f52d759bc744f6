use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::elevation::ElevationOutcome;
use crate::error::ApiError;

/// Wrapper for API responses that automatically adds success envelope
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub status_code: Option<StatusCode>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a successful API response with default 200 status
    pub fn success(data: T) -> Self {
        Self {
            data,
            status_code: None,
        }
    }

    /// Create an API response with custom status code
    pub fn with_status(data: T, status_code: StatusCode) -> Self {
        Self {
            data,
            status_code: Some(status_code),
        }
    }
}

impl ApiResponse<Value> {
    /// Successful outcomes become `{success, message, data}`; failures become
    /// the matching `ApiError`
    pub fn from_outcome(outcome: ElevationOutcome) -> ApiResult {
        Self::from_outcome_with_status(outcome, StatusCode::OK)
    }

    pub fn from_outcome_with_status(outcome: ElevationOutcome, status: StatusCode) -> ApiResult {
        if !outcome.success {
            return Err(ApiError::from(outcome));
        }
        Ok(Self::with_status(outcome.data.unwrap_or(Value::Null), status).with_message(outcome.message))
    }

    fn with_message(self, message: String) -> MessageResponse {
        MessageResponse { inner: self, message }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        envelope(self.status_code, &self.data, None)
    }
}

/// `ApiResponse` with an operator-facing message next to the data
#[derive(Debug)]
pub struct MessageResponse {
    inner: ApiResponse<Value>,
    message: String,
}

impl IntoResponse for MessageResponse {
    fn into_response(self) -> Response {
        envelope(self.inner.status_code, &self.inner.data, Some(&self.message))
    }
}

fn envelope<T: Serialize>(status: Option<StatusCode>, data: &T, message: Option<&str>) -> Response {
    let status = status.unwrap_or(StatusCode::OK);

    // Convert data to JSON Value for consistent envelope format
    let data_value = match serde_json::to_value(data) {
        Ok(value) => value,
        Err(e) => {
            tracing::error!("Failed to serialize response data: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "error": "Failed to serialize response data"
                })),
            )
                .into_response();
        }
    };

    let mut body = json!({
        "success": true,
        "data": data_value
    });
    if let Some(message) = message {
        body["message"] = json!(message);
    }

    (status, Json(body)).into_response()
}

pub type ApiResult = Result<MessageResponse, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elevation::FailureKind;

    #[test]
    fn failed_outcome_becomes_api_error() {
        let outcome = ElevationOutcome::fail(FailureKind::Rejected, "Invalid or expired code");
        let err = ApiResponse::<Value>::from_outcome(outcome).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn successful_outcome_keeps_status_ok() {
        let outcome = ElevationOutcome::ok("Identity verified", json!({ "verified": true }));
        let response = ApiResponse::<Value>::from_outcome(outcome).unwrap().into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
