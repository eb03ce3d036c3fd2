//! WebSocket endpoint for live messaging

pub mod connection;

use std::sync::Arc;

use axum::{
    extract::{Query, State, WebSocketUpgrade},
    http::HeaderMap,
    response::Response,
    routing::get,
    Router,
};
use serde::Deserialize;
use tracing::warn;

use crate::error::{GatewayError, GatewayResult};
use crate::state::GatewayState;
use crate::util::bearer_token;

#[derive(Debug, Default, Deserialize)]
pub struct ConnectQuery {
    /// Browsers cannot set headers on a WebSocket handshake, so the
    /// credential may also travel as `?token=`.
    pub token: Option<String>,
}

pub fn create_websocket_routes() -> Router<Arc<GatewayState>> {
    Router::new().route("/ws", get(websocket_handler))
}

/// Authenticate the handshake, then upgrade. Refused handshakes get a 401
/// and never reach the router.
pub async fn websocket_handler(
    Query(params): Query<ConnectQuery>,
    headers: HeaderMap,
    State(state): State<Arc<GatewayState>>,
    upgrade: Option<WebSocketUpgrade>,
) -> GatewayResult<Response> {
    let credential = match bearer_token(&headers)? {
        Some(token) => Some(token),
        None => params.token,
    };

    let identity = state
        .authenticate(credential.as_deref())
        .await
        .map_err(|error| {
            warn!(error = %error, "websocket handshake refused");
            GatewayError::from(error)
        })?;

    let upgrade = upgrade.ok_or_else(|| {
        GatewayError::InvalidRequest("expected a websocket upgrade request".into())
    })?;

    Ok(upgrade.on_upgrade(move |socket| connection::serve(socket, state, identity)))
}
