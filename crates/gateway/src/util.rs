use axum::http::{header::AUTHORIZATION, HeaderMap};

use crate::GatewayError;

pub fn require_bearer(headers: &HeaderMap) -> Result<String, GatewayError> {
    bearer_token(headers)?.ok_or_else(|| GatewayError::AuthenticationFailed("missing authorization header".into()))
}

/// The bearer token, if an `Authorization` header is present at all.
pub fn bearer_token(headers: &HeaderMap) -> Result<Option<String>, GatewayError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| GatewayError::AuthenticationFailed("malformed authorization header".into()))?;

    let mut parts = value.split_whitespace();
    let scheme = parts.next().unwrap_or("");
    if !scheme.eq_ignore_ascii_case("Bearer") {
        return Err(GatewayError::AuthenticationFailed(
            "invalid authorization scheme".into(),
        ));
    }

    let token = parts.next().unwrap_or("");
    if token.is_empty() {
        return Err(GatewayError::AuthenticationFailed("missing bearer token".into()));
    }

    Ok(Some(token.to_string()))
}
