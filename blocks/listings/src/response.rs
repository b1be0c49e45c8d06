use lambda_http::{http::StatusCode, Body, Error, Response};
use serde::Serialize;

use crate::error::ApiError;

pub fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(serde_json::to_string(value)?.into())
        .map_err(Box::new)?)
}

pub fn error_response(status: StatusCode, message: &str) -> Result<Response<Body>, Error> {
    json_response(status, &serde_json::json!({ "error": message }))
}

pub fn not_found() -> Result<Response<Body>, Error> {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

pub fn method_not_allowed() -> Result<Response<Body>, Error> {
    error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

/// Turn a flow result into a response: `status` on success, the error's own
/// status otherwise.
pub fn respond<T: Serialize>(
    status: StatusCode,
    result: Result<T, ApiError>,
) -> Result<Response<Body>, Error> {
    match result {
        Ok(value) => json_response(status, &value),
        Err(e) => e.into_response(),
    }
}

/// Parse a JSON request body, reporting bad input as a validation error.
pub fn parse_body<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::error!("Failed to parse request body: {}", e);
        ApiError::Validation(format!("Invalid request body: {}", e))
    })
}
