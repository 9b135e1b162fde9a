//! Route table and middleware assembly (§6.2, §4.7). `build_router` wires
//! the ordered security pipeline around the handlers in request order:
//! trace -> body_limit -> logging -> auth -> rbac -> input_filter ->
//! output_filter -> handler. Axum applies the *last* `.layer()` call
//! outermost, so stages are layered innermost-first below.

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::handlers;
use crate::middleware::{
    auth_stage, body_limit_stage, input_filter_stage, logging_stage, output_filter_stage, rbac_stage, trace_stage,
};
use crate::state::GatewayState;

fn cors_layer(state: &GatewayState) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);
    if state.config.cors_origins.iter().any(|o| o == "*") {
        layer.allow_origin(tower_http::cors::Any)
    } else {
        let origins: Vec<_> = state
            .config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        layer
            .allow_origin(AllowOrigin::list(origins))
            .allow_credentials(state.config.cors_credentials)
    }
}

pub fn build_router(state: GatewayState) -> Router {
    let api = Router::new()
        .route("/tasks", get(handlers::list_tasks).post(handlers::create_task))
        .route(
            "/tasks/{id}",
            get(handlers::get_task).patch(handlers::patch_task).delete(handlers::delete_task),
        )
        .route("/agents", get(handlers::list_agents).post(handlers::create_agent))
        .route(
            "/agents/{id}",
            get(handlers::get_agent).patch(handlers::patch_agent).delete(handlers::delete_agent),
        )
        .route("/agents/{id}/status", get(handlers::agent_status))
        .route("/execute", post(handlers::execute_task))
        .route("/execute/tool", post(handlers::execute_tool))
        .route("/execute/proxy", post(handlers::execute_proxy))
        .route("/execute/mcp", post(handlers::execute_mcp))
        .route("/execute/history", get(handlers::execute_history))
        .route("/execute/{id}", get(handlers::execute_by_id));

    Router::new()
        .route("/", get(handlers::banner))
        .route("/health", get(handlers::health))
        .nest("/api", api)
        .layer(from_fn_with_state(state.clone(), output_filter_stage))
        .layer(from_fn_with_state(state.clone(), input_filter_stage))
        .layer(from_fn_with_state(state.clone(), rbac_stage))
        .layer(from_fn_with_state(state.clone(), auth_stage))
        .layer(from_fn_with_state(state.clone(), logging_stage))
        .layer(from_fn_with_state(state.clone(), body_limit_stage))
        .layer(from_fn_with_state(state.clone(), trace_stage))
        .layer(cors_layer(&state))
        .with_state(state)
}
