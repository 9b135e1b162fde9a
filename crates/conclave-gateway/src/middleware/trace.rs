//! Stage 1: trace context (§4.7.1). Adopts an inbound W3C `traceparent`
//! when it parses, otherwise mints a fresh trace/span id; always stamps the
//! response with `traceparent`, `X-Trace-Id`, `X-Span-Id`, `X-Request-Id`.

use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

use crate::context::RequestContext;
use crate::state::GatewayState;

pub async fn trace_stage(State(_state): State<GatewayState>, mut request: Request, next: Next) -> Response {
    let inbound = request
        .headers()
        .get("traceparent")
        .and_then(|v| v.to_str().ok())
        .and_then(parse_traceparent);
    let trace_id = inbound.map(|(t, _)| t).unwrap_or_else(new_id32);
    let span_id = new_id16();
    let request_id = Uuid::new_v4().to_string();

    let ctx = RequestContext {
        trace_id: trace_id.clone(),
        span_id: span_id.clone(),
        request_id: request_id.clone(),
        request_start: Instant::now(),
    };
    request.extensions_mut().insert(ctx);

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    let traceparent = format!("00-{trace_id}-{span_id}-01");
    if let Ok(v) = HeaderValue::from_str(&traceparent) {
        headers.insert("traceparent", v);
    }
    if let Ok(v) = HeaderValue::from_str(&trace_id) {
        headers.insert("x-trace-id", v);
    }
    if let Ok(v) = HeaderValue::from_str(&span_id) {
        headers.insert("x-span-id", v);
    }
    if let Ok(v) = HeaderValue::from_str(&request_id) {
        headers.insert("x-request-id", v);
    }
    response
}

fn new_id32() -> String {
    Uuid::new_v4().simple().to_string()
}

fn new_id16() -> String {
    new_id32()[..16].to_string()
}

/// `version-traceid-parentid-flags`, each hex and the id fields non-zero.
fn parse_traceparent(value: &str) -> Option<(String, String)> {
    let parts: Vec<&str> = value.trim().split('-').collect();
    let [version, trace_id, parent_id, flags] = parts[..] else {
        return None;
    };
    if version.len() != 2 || trace_id.len() != 32 || parent_id.len() != 16 || flags.len() != 2 {
        return None;
    }
    let all_hex = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit());
    if !all_hex(version) || !all_hex(trace_id) || !all_hex(parent_id) || !all_hex(flags) {
        return None;
    }
    if trace_id.chars().all(|c| c == '0') || parent_id.chars().all(|c| c == '0') {
        return None;
    }
    Some((trace_id.to_lowercase(), parent_id.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_valid_traceparent() {
        let header = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";
        let (trace_id, parent_id) = parse_traceparent(header).unwrap();
        assert_eq!(trace_id, "4bf92f3577b34da6a3ce929d0e0e4736");
        assert_eq!(parent_id, "00f067aa0ba902b7");
    }

    #[test]
    fn rejects_all_zero_trace_id() {
        let header = "00-00000000000000000000000000000000-00f067aa0ba902b7-01";
        assert!(parse_traceparent(header).is_none());
    }

    #[test]
    fn rejects_malformed_header() {
        assert!(parse_traceparent("not-a-traceparent").is_none());
    }
}
