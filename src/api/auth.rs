//! Kitchen staff authentication for the `/api` routes
//!
//! Kitchen displays present the shared key as `Authorization: Bearer <key>`,
//! or as `X-Kitchen-Key` where a proxy strips the authorization header.
//! Table sessions on `/ws` never pass through here.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};

use super::{error_response, ApiState, ErrorResponse};

const KITCHEN_KEY_HEADER: &str = "x-kitchen-key";

/// Key presented by a kitchen client, if any
fn presented_key(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            let (scheme, token) = v.split_once(' ')?;
            scheme.eq_ignore_ascii_case("bearer").then_some(token.trim())
        });

    bearer
        .or_else(|| {
            headers
                .get(KITCHEN_KEY_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
        })
        .filter(|key| !key.is_empty())
}

/// Reject kitchen calls that do not carry the configured key
pub async fn require_api_key(
    State(state): State<Arc<ApiState>>,
    req: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    // Single-till setups run without a key
    let Some(expected) = state.api_key.as_deref() else {
        return Ok(next.run(req).await);
    };

    match presented_key(req.headers()) {
        Some(key) if key == expected => Ok(next.run(req).await),
        Some(_) => {
            tracing::warn!(path = %req.uri().path(), "kitchen request with wrong key");
            Err((
                StatusCode::UNAUTHORIZED,
                error_response("invalid_api_key", "Kitchen key rejected"),
            ))
        }
        None => {
            tracing::debug!(path = %req.uri().path(), "kitchen request without key");
            Err((
                StatusCode::UNAUTHORIZED,
                error_response("missing_api_key", "Kitchen key required"),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(name: &'static str, value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        assert_eq!(presented_key(&headers("authorization", "Bearer till-1")), Some("till-1"));
        assert_eq!(presented_key(&headers("authorization", "bearer  till-1 ")), Some("till-1"));
        assert_eq!(presented_key(&headers("authorization", "Basic dGlsbA==")), None);
    }

    #[test]
    fn kitchen_header_is_accepted() {
        assert_eq!(presented_key(&headers("x-kitchen-key", "till-2")), Some("till-2"));
    }

    #[test]
    fn blank_keys_count_as_missing() {
        assert_eq!(presented_key(&HeaderMap::new()), None);
        assert_eq!(presented_key(&headers("authorization", "Bearer ")), None);
        assert_eq!(presented_key(&headers("x-kitchen-key", "  ")), None);
    }
}
