//! Stage 3: JSON structured logger (§4.7.3). Wraps everything downstream so
//! it can log the final status and duration; reads back the `AuthUser` the
//! auth stage stashes on the response once one exists.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing::info;

use crate::context::{AuthUser, RequestContext};
use crate::state::GatewayState;

pub async fn logging_stage(State(state): State<GatewayState>, request: Request, next: Next) -> Response {
    let ctx = request.extensions().get::<RequestContext>().cloned();
    let method = request.method().to_string();
    let route = request.uri().path().to_string();
    let service = state.config.service_name.clone();

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let user_id = response.extensions().get::<AuthUser>().map(|u| u.id.clone());
    let duration_ms = ctx.as_ref().map(|c| c.elapsed_ms()).unwrap_or(0);

    info!(
        service = %service,
        method = %method,
        route = %route,
        status,
        duration = duration_ms,
        trace_id = ctx.as_ref().map(|c| c.trace_id.as_str()).unwrap_or(""),
        span_id = ctx.as_ref().map(|c| c.span_id.as_str()).unwrap_or(""),
        request_id = ctx.as_ref().map(|c| c.request_id.as_str()).unwrap_or(""),
        user_id = user_id.as_deref(),
        "request handled"
    );

    response
}
