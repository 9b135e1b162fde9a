//! Stage 4: JWT auth (§4.7.4). HS256 only; `alg: none` and any other
//! algorithm are rejected outright. Skipped for public paths and, in dev
//! mode (no configured secret), skipped entirely.

use axum::extract::{Request, State};
use axum::http::{header, Method};
use axum::middleware::Next;
use axum::response::Response;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use conclave_types::jwt::{JwtClaims, Role};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};

use crate::context::{AuthUser, RequestContext};
use crate::error::GatewayError;
use crate::state::GatewayState;

const CLOCK_SKEW_SECS: u64 = 60;

pub async fn auth_stage(State(state): State<GatewayState>, mut request: Request, next: Next) -> Response {
    let ctx = request.extensions().get::<RequestContext>().cloned();
    let path = request.uri().path().to_string();
    if request.method() == Method::OPTIONS || state.is_public_path(&path) {
        return next.run(request).await;
    }

    let Some(secret) = state.config.jwt_secret.clone() else {
        return next.run(request).await;
    };

    let token = match request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(extract_bearer)
    {
        Some(token) => token,
        None => return GatewayError::new("AUTH_001", "missing bearer credential").into_response_with(ctx.as_ref()),
    };

    // `jsonwebtoken::Algorithm` has no `none` variant, so a `{"alg":"none"}`
    // header fails `decode_header`'s own deserialization before we ever see
    // it — peek the raw header segment first so that case is named.
    if let Some(alg) = raw_header_alg(&token) {
        if alg.eq_ignore_ascii_case("none") {
            return GatewayError::new("AUTH_003", "algorithm none is not accepted").into_response_with(ctx.as_ref());
        }
    }

    let header = match jsonwebtoken::decode_header(&token) {
        Ok(header) => header,
        Err(_) => {
            return GatewayError::new("AUTH_003", "invalid token header").into_response_with(ctx.as_ref());
        }
    };
    if header.alg != Algorithm::HS256 {
        return GatewayError::new("AUTH_003", format!("unsupported algorithm {:?} (only none or HS256 are recognized, and none is rejected)", header.alg))
            .into_response_with(ctx.as_ref());
    }
    if let Some(typ) = &header.typ {
        if typ != "JWT" {
            return GatewayError::new("AUTH_003", "unsupported token type").into_response_with(ctx.as_ref());
        }
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = CLOCK_SKEW_SECS;
    if !state.config.jwt_issuer.is_empty() {
        validation.set_issuer(&[state.config.jwt_issuer.clone()]);
    }
    validation.validate_aud = false;

    let key = DecodingKey::from_secret(secret.as_bytes());
    let data = match jsonwebtoken::decode::<JwtClaims>(&token, &key, &validation) {
        Ok(data) => data,
        Err(error) => {
            let code = if matches!(error.kind(), ErrorKind::ExpiredSignature) {
                "AUTH_002"
            } else {
                "AUTH_003"
            };
            return GatewayError::new(code, format!("token verification failed: {error}")).into_response_with(ctx.as_ref());
        }
    };

    let claims = data.claims;
    let roles = if claims.roles.is_empty() {
        vec![Role::Viewer]
    } else {
        claims.roles.clone()
    };
    let user = AuthUser {
        id: claims.sub.clone(),
        roles,
        claims,
    };
    request.extensions_mut().insert(user.clone());
    let mut response = next.run(request).await;
    response.extensions_mut().insert(user);
    response
}

/// Decodes the unverified header segment and reads its `alg` field
/// directly, bypassing `jsonwebtoken`'s own `Algorithm` deserialization
/// (which has no `none` variant and would just error out).
fn raw_header_alg(token: &str) -> Option<String> {
    let segment = token.split('.').next()?;
    let bytes = URL_SAFE_NO_PAD.decode(segment).ok()?;
    let value: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    value.get("alg")?.as_str().map(|s| s.to_string())
}

fn extract_bearer(value: &str) -> Option<String> {
    let trimmed = value.trim();
    let bearer = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?;
    let token = bearer.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_bearer_token_case_insensitively() {
        assert_eq!(extract_bearer("Bearer abc.def.ghi"), Some("abc.def.ghi".to_string()));
        assert_eq!(extract_bearer("bearer abc"), Some("abc".to_string()));
        assert_eq!(extract_bearer("Basic abc"), None);
        assert_eq!(extract_bearer("Bearer "), None);
    }

    #[test]
    fn raw_header_alg_reads_none_even_though_it_is_not_a_recognized_algorithm() {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none","typ":"JWT"}"#);
        let token = format!("{header}.e30.");
        assert_eq!(raw_header_alg(&token), Some("none".to_string()));
    }
}
