//! REST API endpoints for the gateway

pub mod conversations;
pub mod health;

use std::sync::Arc;

use axum::{middleware as axum_middleware, routing::get, Router};
use chrono::{DateTime, SecondsFormat, Utc};

use crate::middleware::auth_middleware;
use crate::state::GatewayState;

pub use conversations::{
    ConversationResponse, HistoryQuery, HistoryResponse, MessageResponse, PartyResponse,
    ReadResponse,
};
pub use health::HealthResponse;

pub fn create_rest_routes(state: Arc<GatewayState>) -> Router<Arc<GatewayState>> {
    let authenticated = conversations::create_conversation_routes()
        .route_layer(axum_middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", authenticated)
}

pub(crate) fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}
