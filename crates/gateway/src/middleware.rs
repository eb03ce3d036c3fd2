//! Request middleware: bearer authentication and request logging.

use std::{sync::Arc, time::Instant};

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use gigboard_auth::Identity;
use tracing::{debug, info};

use crate::error::GatewayError;
use crate::state::GatewayState;
use crate::util::require_bearer;

/// Verify the bearer credential and attach the caller's [`Identity`] to the
/// request extensions.
pub async fn auth_middleware(
    State(state): State<Arc<GatewayState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    let token = require_bearer(request.headers())?;

    let identity = state.authenticate(Some(&token)).await.map_err(|error| {
        debug!(uri = %request.uri(), error = %error, "request rejected at authentication");
        GatewayError::from(error)
    })?;

    request.extensions_mut().insert::<Identity>(identity);
    Ok(next.run(request).await)
}

pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let start = Instant::now();
    let response = next.run(request).await;

    info!(
        method = %method,
        uri = %uri,
        status = %response.status(),
        duration_ms = start.elapsed().as_millis() as u64,
        "request completed"
    );

    response
}
