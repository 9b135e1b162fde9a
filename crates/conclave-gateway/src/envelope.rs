//! Response Envelope (C8): every handler's output is wrapped in
//! `{success, data, meta}` or `{success: false, error, meta}` before it
//! leaves the gateway.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use crate::context::RequestContext;

fn meta(ctx: Option<&RequestContext>, pagination: Option<Value>) -> Value {
    let mut m = json!({
        "traceId": ctx.map(|c| c.trace_id.clone()).unwrap_or_default(),
        "requestId": ctx.map(|c| c.request_id.clone()).unwrap_or_default(),
        "duration": ctx.map(|c| c.elapsed_ms()).unwrap_or(0),
    });
    if let Some(pagination) = pagination {
        m["pagination"] = pagination;
    }
    m
}

pub fn success_response(status: StatusCode, data: Value, ctx: Option<&RequestContext>) -> Response {
    success_response_paginated(status, data, ctx, None)
}

pub fn success_response_paginated(
    status: StatusCode,
    data: Value,
    ctx: Option<&RequestContext>,
    pagination: Option<Value>,
) -> Response {
    (
        status,
        Json(json!({
            "success": true,
            "data": data,
            "meta": meta(ctx, pagination),
        })),
    )
        .into_response()
}

pub fn error_response(
    status: StatusCode,
    code: &str,
    message: &str,
    details: Option<Value>,
    ctx: Option<&RequestContext>,
) -> Response {
    let mut error = json!({ "code": code, "message": message });
    if let Some(details) = details {
        error["details"] = details;
    }
    (
        status,
        Json(json!({
            "success": false,
            "error": error,
            "meta": meta(ctx, None),
        })),
    )
        .into_response()
}
