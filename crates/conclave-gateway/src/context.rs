//! Per-request trace/identity bookkeeping threaded through the pipeline via
//! request/response extensions.

use std::time::Instant;

use conclave_types::jwt::{JwtClaims, Role};

/// Populated by the trace stage, read by every later stage.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub trace_id: String,
    pub span_id: String,
    pub request_id: String,
    pub request_start: Instant,
}

impl RequestContext {
    pub fn elapsed_ms(&self) -> i64 {
        self.request_start.elapsed().as_millis() as i64
    }
}

/// Populated by the auth stage once a token verifies; absent in dev mode or
/// on a public path.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub roles: Vec<Role>,
    pub claims: JwtClaims,
}
