use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::Utc;
use gigboard_auth::{Authenticator, Identity};
use gigboard_config::{AuthConfig, DatabaseConfig, MessagingConfig};
use gigboard_database::initialize_database;
use gigboard_gateway::{create_router, GatewayState};
use gigboard_messaging::{ContextRefs, MessagingService};
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

const SECRET: &str = "gateway-test-secret";

struct TestApp {
    _temp_dir: TempDir,
    router: Router,
    messaging: Arc<MessagingService>,
}

impl TestApp {
    async fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let pool = initialize_database(&DatabaseConfig {
            url: format!("sqlite://{}", temp_dir.path().join("gateway.db").display()),
            max_connections: 4,
        })
        .await
        .unwrap();

        for (user_id, username) in [("u1", "alice"), ("u2", "bob"), ("u3", "carol")] {
            sqlx::query("INSERT INTO users (user_id, username, avatar_url) VALUES (?, ?, NULL)")
                .bind(user_id)
                .bind(username)
                .execute(&pool)
                .await
                .unwrap();
        }

        let auth = AuthConfig {
            jwt_secret: SECRET.to_string(),
            ..AuthConfig::default()
        };
        let messaging = Arc::new(MessagingService::new(
            pool.clone(),
            &MessagingConfig::default(),
        ));
        let state = GatewayState::new(
            pool.clone(),
            Authenticator::new(pool, &auth),
            messaging.clone(),
            &auth,
        );

        Self {
            _temp_dir: temp_dir,
            router: create_router(state),
            messaging,
        }
    }

    async fn request(&self, method: &str, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let response = self
            .router
            .clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    async fn send(&self, from: &str, to: &str, content: &str) -> String {
        self.messaging
            .send_message(&identity(from), to, content, &ContextRefs::default())
            .await
            .unwrap()
            .conversation_id
    }
}

fn identity(user_id: &str) -> Identity {
    Identity {
        user_id: user_id.to_string(),
        username: user_id.to_string(),
        avatar_url: None,
    }
}

fn token_for(user_id: &str) -> String {
    let claims = json!({
        "sub": user_id,
        "exp": Utc::now().timestamp() + 3600,
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

#[tokio::test]
async fn health_reports_database_status() {
    let app = TestApp::new().await;

    let (status, body) = app.request("GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "ok");
}

#[tokio::test]
async fn api_requires_a_valid_bearer_token() {
    let app = TestApp::new().await;

    let (status, body) = app.request("GET", "/api/conversations", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "401");

    let (status, _) = app
        .request("GET", "/api/conversations", Some("not-a-jwt"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .request("GET", "/api/conversations", Some(&token_for("ghost")))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn conversation_list_carries_counterpart_and_unread_flag() {
    let app = TestApp::new().await;
    let token = token_for("u2");

    let (status, body) = app.request("GET", "/api/conversations", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let conversation_id = app.send("u1", "u2", "hello bob").await;

    let (status, body) = app.request("GET", "/api/conversations", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let list = body.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["id"], conversation_id.as_str());
    assert_eq!(list[0]["counterpart"]["user_id"], "u1");
    assert_eq!(list[0]["counterpart"]["username"], "alice");
    assert_eq!(list[0]["last_message"]["content"], "hello bob");
    assert_eq!(list[0]["is_unread"], true);

    let uri = format!("/api/conversations/{conversation_id}/read");
    let (status, body) = app.request("POST", &uri, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);

    let (_, body) = app.request("GET", "/api/conversations", Some(&token)).await;
    assert_eq!(body[0]["is_unread"], false);
}

#[tokio::test]
async fn history_pages_backwards_with_a_cursor() {
    let app = TestApp::new().await;
    let token = token_for("u1");

    let mut conversation_id = String::new();
    for n in 0..5 {
        conversation_id = app.send("u1", "u2", &format!("message {n}")).await;
    }

    let uri = format!("/api/conversations/{conversation_id}/messages?limit=3");
    let (status, first) = app.request("GET", &uri, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let contents: Vec<&str> = first["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, ["message 2", "message 3", "message 4"]);
    let cursor = first["next_cursor"].as_str().unwrap().to_string();

    let uri = format!(
        "/api/conversations/{conversation_id}/messages?limit=3&cursor={}",
        cursor.replace('+', "%2B")
    );
    let (status, second) = app.request("GET", &uri, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let contents: Vec<&str> = second["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, ["message 0", "message 1"]);
    assert!(second["next_cursor"].is_null());
}

#[tokio::test]
async fn history_rejects_bad_parameters_and_outsiders() {
    let app = TestApp::new().await;
    let conversation_id = app.send("u1", "u2", "private").await;
    let base = format!("/api/conversations/{conversation_id}/messages");

    let (status, _) = app
        .request("GET", &format!("{base}?limit=0"), Some(&token_for("u1")))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .request("GET", &format!("{base}?limit=101"), Some(&token_for("u1")))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .request("GET", &format!("{base}?cursor=yesterday"), Some(&token_for("u1")))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("invalid cursor"));

    let (status, _) = app
        .request(
            "GET",
            &format!("{base}?cursor=2024-01-01T00:00:00.000001500Z"),
            Some(&token_for("u1")),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.request("GET", &base, Some(&token_for("u3"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let read_uri = format!("/api/conversations/{conversation_id}/read");
    let (status, _) = app.request("POST", &read_uri, Some(&token_for("u3"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn websocket_handshake_is_refused_without_credentials() {
    let app = TestApp::new().await;

    let (status, _) = app.request("GET", "/ws", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.request("GET", "/ws?token=garbage", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Authenticated, but not an upgrade request.
    let uri = format!("/ws?token={}", token_for("u1"));
    let (status, _) = app.request("GET", &uri, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
