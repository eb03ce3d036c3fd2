//! Conversation REST endpoints: listing, history and read marks.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use gigboard_auth::Identity;
use gigboard_database::{ConversationSummary, Message, Party};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::format_timestamp;
use crate::error::{ErrorResponse, GatewayResult};
use crate::state::GatewayState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PartyResponse {
    pub user_id: String,
    pub username: String,
    pub avatar_url: Option<String>,
}

impl From<Party> for PartyResponse {
    fn from(party: Party) -> Self {
        Self {
            user_id: party.user_id,
            username: party.username,
            avatar_url: party.avatar_url,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    pub sent_at: String,
}

impl From<Message> for MessageResponse {
    fn from(message: Message) -> Self {
        Self {
            id: message.id,
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            content: message.content,
            sent_at: format_timestamp(message.sent_at),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConversationResponse {
    pub id: String,
    pub job_id: Option<String>,
    pub application_id: Option<String>,
    pub client_id: Option<String>,
    pub worker_id: Option<String>,
    pub created_at: String,
    pub last_message_at: Option<String>,
    pub counterpart: Option<PartyResponse>,
    pub last_message: Option<MessageResponse>,
    pub is_unread: bool,
}

impl From<ConversationSummary> for ConversationResponse {
    fn from(summary: ConversationSummary) -> Self {
        let conversation = summary.conversation;
        Self {
            id: conversation.id,
            job_id: conversation.job_id,
            application_id: conversation.application_id,
            client_id: conversation.client_id,
            worker_id: conversation.worker_id,
            created_at: format_timestamp(conversation.created_at),
            last_message_at: conversation.last_message_at.map(format_timestamp),
            counterpart: summary.counterpart.map(PartyResponse::from),
            last_message: summary.last_message.map(MessageResponse::from),
            is_unread: summary.is_unread,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// Page size, 1 to the configured maximum.
    pub limit: Option<u32>,
    /// `next_cursor` from the previous page.
    pub cursor: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HistoryResponse {
    /// Oldest first.
    pub messages: Vec<MessageResponse>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReadResponse {
    pub ok: bool,
    pub last_read_at: String,
}

pub fn create_conversation_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/conversations", get(list_conversations))
        .route("/conversations/:conversation_id/messages", get(list_messages))
        .route("/conversations/:conversation_id/read", post(mark_read))
}

#[utoipa::path(
    get,
    path = "/api/conversations",
    tag = "Conversations",
    responses(
        (status = 200, description = "Caller's conversations, most recent activity first", body = Vec<ConversationResponse>),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_conversations(
    State(state): State<Arc<GatewayState>>,
    Extension(identity): Extension<Identity>,
) -> GatewayResult<Json<Vec<ConversationResponse>>> {
    let summaries = state.messaging.list_conversations(&identity.user_id).await?;
    Ok(Json(summaries.into_iter().map(ConversationResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/api/conversations/{conversation_id}/messages",
    tag = "Conversations",
    params(
        ("conversation_id" = String, Path, description = "Conversation ID"),
        HistoryQuery
    ),
    responses(
        (status = 200, description = "One page of history, oldest first", body = HistoryResponse),
        (status = 400, description = "Invalid limit or cursor", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Caller is not a participant", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_messages(
    Path(conversation_id): Path<String>,
    Query(params): Query<HistoryQuery>,
    State(state): State<Arc<GatewayState>>,
    Extension(identity): Extension<Identity>,
) -> GatewayResult<Json<HistoryResponse>> {
    let page = state
        .messaging
        .history(
            &identity.user_id,
            &conversation_id,
            params.limit,
            params.cursor.as_deref(),
        )
        .await?;

    Ok(Json(HistoryResponse {
        messages: page.messages.into_iter().map(MessageResponse::from).collect(),
        next_cursor: page.next_cursor,
    }))
}

#[utoipa::path(
    post,
    path = "/api/conversations/{conversation_id}/read",
    tag = "Conversations",
    params(
        ("conversation_id" = String, Path, description = "Conversation ID")
    ),
    responses(
        (status = 200, description = "Read watermark advanced", body = ReadResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Caller is not a participant", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn mark_read(
    Path(conversation_id): Path<String>,
    State(state): State<Arc<GatewayState>>,
    Extension(identity): Extension<Identity>,
) -> GatewayResult<Json<ReadResponse>> {
    let watermark = state
        .messaging
        .mark_read(&identity.user_id, &conversation_id)
        .await?;

    Ok(Json(ReadResponse {
        ok: true,
        last_read_at: format_timestamp(watermark),
    }))
}
