//! Stage 5: RBAC (§4.7.5). Skipped for public paths and in dev mode (no
//! configured JWT secret, so there is no authenticated user to check).

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use conclave_types::jwt::Role;

use crate::context::{AuthUser, RequestContext};
use crate::error::GatewayError;
use crate::rbac::{is_permitted, Operation, Resource};
use crate::state::GatewayState;

pub async fn rbac_stage(State(state): State<GatewayState>, request: Request, next: Next) -> Response {
    let ctx = request.extensions().get::<RequestContext>().cloned();
    let path = request.uri().path().to_string();
    if state.is_public_path(&path) || state.config.jwt_secret.is_none() {
        return next.run(request).await;
    }

    let resource = Resource::from_path(&path);
    let roles: Vec<Role> = request
        .extensions()
        .get::<AuthUser>()
        .map(|u| u.roles.clone())
        .unwrap_or_default();
    let operation = Operation::from_method(request.method(), resource);

    if !is_permitted(&roles, resource, operation) {
        return GatewayError::new("PERM_002", "insufficient permissions for this resource").into_response_with(ctx.as_ref());
    }

    next.run(request).await
}
