//! # Gigboard Gateway Crate
//!
//! HTTP and WebSocket surface of the messaging core.
//!
//! ## Architecture
//!
//! - **REST**: conversation listing, history pages and read marks, plus a
//!   health probe
//! - **WebSocket**: `/ws`, authenticated at the handshake, carrying tagged
//!   JSON frames to and from the messaging service
//! - **State**: shared services handed to every handler
//! - **Middleware**: bearer authentication and request logging
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gigboard_gateway::{create_router, GatewayState};
//!
//! let state = GatewayState::new(pool, authenticator, messaging, &config.auth);
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:7070").await?;
//! axum::serve(listener, create_router(state)).await?;
//! ```

pub mod error;
pub mod middleware;
pub mod rest;
pub mod state;
pub mod util;
pub mod websocket;

pub use error::{ErrorResponse, GatewayError, GatewayResult};
pub use state::GatewayState;

use std::sync::Arc;

use axum::{http::Method, middleware as axum_middleware, Router};
use tower_http::cors::{Any, CorsLayer};

pub fn create_router(state: GatewayState) -> Router {
    let state = Arc::new(state);

    let router = Router::new()
        .merge(rest::create_rest_routes(state.clone()))
        .merge(websocket::create_websocket_routes())
        .with_state(state);

    #[cfg(debug_assertions)]
    let router = router.merge(api_docs::swagger_ui());

    router
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers(Any),
        )
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
}

#[cfg(debug_assertions)]
mod api_docs {
    use utoipa::{
        openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
        Modify, OpenApi,
    };
    use utoipa_swagger_ui::SwaggerUi;

    use crate::rest;

    #[derive(OpenApi)]
    #[openapi(
        paths(
            rest::health::health_check,
            rest::conversations::list_conversations,
            rest::conversations::list_messages,
            rest::conversations::mark_read,
        ),
        components(schemas(
            rest::HealthResponse,
            rest::ConversationResponse,
            rest::PartyResponse,
            rest::MessageResponse,
            rest::HistoryResponse,
            rest::ReadResponse,
            crate::ErrorResponse,
        )),
        modifiers(&BearerAuth),
        tags(
            (name = "Health", description = "Liveness and database probe"),
            (name = "Conversations", description = "Conversation history and read state")
        ),
        info(
            title = "Gigboard Messaging API",
            version = "0.1.0",
            description = "Conversations between clients and workers"
        )
    )]
    pub struct ApiDoc;

    struct BearerAuth;

    impl Modify for BearerAuth {
        fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
            if let Some(components) = openapi.components.as_mut() {
                components.add_security_scheme(
                    "bearer_auth",
                    SecurityScheme::Http(
                        HttpBuilder::new()
                            .scheme(HttpAuthScheme::Bearer)
                            .bearer_format("JWT")
                            .build(),
                    ),
                );
            }
        }
    }

    pub fn swagger_ui() -> SwaggerUi {
        SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())
    }
}
