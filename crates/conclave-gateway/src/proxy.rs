//! Outbound proxy (§4.7.8). Invoked only from `/api/execute/proxy`: checks
//! the target against the allow-list, forwards the request with injected
//! trace headers, and relays status/headers/body back to the caller.

use std::time::Duration;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::RequestContext;
use crate::error::GatewayError;
use crate::state::GatewayState;

#[derive(Debug, Deserialize)]
pub struct ProxyRequest {
    pub target_url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Serialize)]
pub struct ProxyResponse {
    pub success: bool,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Value,
    pub duration_ms: i64,
}

/// `(host, method, path)` must match an allow-list entry. An entry is one
/// of: a bare host (matches any method/path on that host), `host/path`
/// (matches any method under that path prefix), or `METHOD host/path`.
fn is_allowed(allowed_hosts: &[String], host: &str, method: &str, path: &str) -> bool {
    if allowed_hosts.is_empty() {
        return false;
    }
    allowed_hosts.iter().any(|entry| {
        let entry = entry.trim();
        let (method_part, rest) = match entry.split_once(' ') {
            Some((m, r)) => (Some(m), r),
            None => (None, entry),
        };
        if let Some(m) = method_part {
            if !m.eq_ignore_ascii_case(method) {
                return false;
            }
        }
        let (entry_host, entry_path) = match rest.split_once('/') {
            Some((h, p)) => (h, format!("/{p}")),
            None => (rest, String::new()),
        };
        if !entry_host.eq_ignore_ascii_case(host) {
            return false;
        }
        entry_path.is_empty() || path.starts_with(&entry_path)
    })
}

pub async fn execute_proxy_request(
    state: &GatewayState,
    ctx: Option<&RequestContext>,
    request: ProxyRequest,
) -> Result<ProxyResponse, GatewayError> {
    let url = request
        .target_url
        .parse::<reqwest::Url>()
        .map_err(|e| GatewayError::new("PROXY_001", format!("invalid target url: {e}")))?;
    let host = url.host_str().unwrap_or("").to_string();
    let method_str = request.method.to_uppercase();

    if !is_allowed(&state.config.allowed_hosts, &host, &method_str, url.path()) {
        return Err(GatewayError::new(
            "PROXY_002",
            format!("host '{host}' is not allow-listed for outbound requests"),
        ));
    }

    let method = Method::from_bytes(method_str.as_bytes())
        .map_err(|_| GatewayError::new("PROXY_001", "unsupported HTTP method"))?;

    const MAX_ATTEMPTS: u32 = 3;
    let start = std::time::Instant::now();
    let mut attempt = 0;
    loop {
        attempt += 1;
        let mut builder = state
            .http_client
            .request(method.clone(), url.clone())
            .timeout(Duration::from_millis(request.timeout_ms));
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(ctx) = ctx {
            builder = builder
                .header("X-Trace-Id", ctx.trace_id.clone())
                .header("X-Request-Id", ctx.request_id.clone())
                .header("X-Forwarded-By", state.config.service_name.clone());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let outcome = builder.send().await;
        let response = match outcome {
            Ok(response) => response,
            Err(e) => {
                return Err(GatewayError::new("PROXY_001", format!("outbound request failed: {e}")));
            }
        };
        let status = response.status().as_u16();
        if status >= 500 && attempt < MAX_ATTEMPTS {
            tokio::time::sleep(Duration::from_millis(200 * attempt as u64)).await;
            continue;
        }

        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.to_string(), v.to_string())))
            .collect();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        let duration_ms = start.elapsed().as_millis() as i64;

        return Ok(ProxyResponse {
            success: true,
            status,
            headers,
            body,
            duration_ms,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_allows_any_method_and_path() {
        let allowed = vec!["api.example.com".to_string()];
        assert!(is_allowed(&allowed, "api.example.com", "POST", "/v1/anything"));
        assert!(!is_allowed(&allowed, "evil.test", "GET", "/"));
    }

    #[test]
    fn host_with_path_prefix_restricts_scope() {
        let allowed = vec!["api.example.com/v1".to_string()];
        assert!(is_allowed(&allowed, "api.example.com", "GET", "/v1/widgets"));
        assert!(!is_allowed(&allowed, "api.example.com", "GET", "/v2/widgets"));
    }

    #[test]
    fn method_qualified_entry_restricts_verb() {
        let allowed = vec!["POST api.example.com/hooks".to_string()];
        assert!(is_allowed(&allowed, "api.example.com", "POST", "/hooks/run"));
        assert!(!is_allowed(&allowed, "api.example.com", "GET", "/hooks/run"));
    }

    #[test]
    fn empty_allow_list_denies_everything() {
        assert!(!is_allowed(&[], "api.example.com", "GET", "/"));
    }
}
