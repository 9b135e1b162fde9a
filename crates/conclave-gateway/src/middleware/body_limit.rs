//! Stage 2: body limit (§4.7.2). A declared `Content-Length` over the cap
//! is rejected immediately; otherwise the body is buffered with a hard cap
//! so an unbounded or chunked body can never exceed it.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::Response;

use crate::context::RequestContext;
use crate::envelope::error_response;
use crate::error::status_for_code;
use crate::state::GatewayState;

pub async fn body_limit_stage(State(state): State<GatewayState>, request: Request, next: Next) -> Response {
    if !matches!(*request.method(), Method::POST | Method::PUT | Method::PATCH) {
        return next.run(request).await;
    }

    let max = state.config.max_body_size;
    let ctx = request.extensions().get::<RequestContext>().cloned();

    if let Some(declared) = content_length(&request) {
        if declared > max {
            return too_large(max, ctx.as_ref());
        }
    }

    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, max).await {
        Ok(bytes) => bytes,
        Err(_) => return too_large(max, ctx.as_ref()),
    };
    let request = Request::from_parts(parts, Body::from(bytes));
    next.run(request).await
}

fn content_length(request: &Request) -> Option<usize> {
    request
        .headers()
        .get(axum::http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
}

fn too_large(max: usize, ctx: Option<&RequestContext>) -> Response {
    error_response(
        status_for_code("REQ_004"),
        "REQ_004",
        &format!("request body exceeds the {max} byte limit"),
        None,
        ctx,
    )
}
