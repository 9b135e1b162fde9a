//! The §7 error code taxonomy and its translation into HTTP status codes.
//! Every middleware stage and route handler surfaces failures as a
//! `GatewayError`; nothing in this crate panics or returns a bare
//! `StatusCode` to the caller.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use thiserror::Error;

use crate::context::RequestContext;
use crate::envelope::error_response;

#[derive(Error, Debug, Clone)]
#[error("{code}: {message}")]
pub struct GatewayError {
    pub code: String,
    pub message: String,
    pub details: Option<Value>,
}

impl GatewayError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Maps the error's code prefix (and a handful of specific codes with a
    /// status that diverges from their prefix's default) to a status code.
    pub fn status(&self) -> StatusCode {
        status_for_code(&self.code)
    }

    pub fn into_response_with(self, ctx: Option<&RequestContext>) -> Response {
        error_response(self.status(), &self.code, &self.message, self.details, ctx)
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        self.into_response_with(None)
    }
}

/// `AUTH_*`->401, `PERM_*`->403, `REQ_*`->400 (`REQ_004` payload-too-large
/// ->413), `RES_*`->404, `PROXY_*`->502 (`PROXY_002` not-allow-listed
/// ->403), `OUTPUT_*`->500, `SRV_*`->500 (`SRV_002` unavailable ->503).
pub fn status_for_code(code: &str) -> StatusCode {
    match code {
        "REQ_004" => return StatusCode::PAYLOAD_TOO_LARGE,
        "PROXY_002" => return StatusCode::FORBIDDEN,
        "SRV_002" => return StatusCode::SERVICE_UNAVAILABLE,
        _ => {}
    }
    match code.split('_').next().unwrap_or("") {
        "AUTH" => StatusCode::UNAUTHORIZED,
        "PERM" => StatusCode::FORBIDDEN,
        "REQ" => StatusCode::BAD_REQUEST,
        "RES" => StatusCode::NOT_FOUND,
        "PROXY" => StatusCode::BAD_GATEWAY,
        "OUTPUT" => StatusCode::INTERNAL_SERVER_ERROR,
        "SRV" => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
