//! Wire events exchanged with live connections.
//!
//! Frames are JSON objects tagged by `type`. Unknown types or malformed
//! payloads fail deserialization and never reach the services.

use chrono::{DateTime, Utc};
use gigboard_auth::Identity;
use gigboard_database::{Message, Party};
use serde::{Deserialize, Serialize};

/// Optional references to the marketplace records a conversation is about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextRefs {
    pub job_id: Option<String>,
    pub application_id: Option<String>,
}

impl ContextRefs {
    pub fn new(job_id: Option<String>, application_id: Option<String>) -> Self {
        Self {
            job_id,
            application_id,
        }
    }
}

/// Requests a client may send over its connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientRequest {
    Join {
        conversation_id: String,
    },
    Leave {
        conversation_id: String,
    },
    FindOrCreateConversation {
        request_id: Option<String>,
        recipient_id: String,
        job_id: Option<String>,
        application_id: Option<String>,
    },
    SendMessage {
        request_id: Option<String>,
        recipient_id: String,
        content: String,
        job_id: Option<String>,
        application_id: Option<String>,
        client_temp_id: Option<String>,
    },
    Ping,
}

/// Public profile attached to messages and notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyProfile {
    pub user_id: String,
    pub username: String,
    pub avatar_url: Option<String>,
}

impl From<&Identity> for PartyProfile {
    fn from(identity: &Identity) -> Self {
        Self {
            user_id: identity.user_id.clone(),
            username: identity.username.clone(),
            avatar_url: identity.avatar_url.clone(),
        }
    }
}

impl From<Party> for PartyProfile {
    fn from(party: Party) -> Self {
        Self {
            user_id: party.user_id,
            username: party.username,
            avatar_url: party.avatar_url,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub message_id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    pub sent_at: DateTime<Utc>,
    pub sender: PartyProfile,
}

impl MessagePayload {
    pub fn new(message: Message, sender: PartyProfile) -> Self {
        Self {
            message_id: message.id,
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            content: message.content,
            sent_at: message.sent_at,
            sender,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ConversationAck {
    Ok { conversation_id: String },
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SendMessageAck {
    Ok {
        message: MessagePayload,
        client_temp_id: Option<String>,
    },
    Error {
        message: String,
        client_temp_id: Option<String>,
    },
}

/// Events pushed to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Hello {
        user_id: String,
    },
    Pong,
    ReceiveMessage {
        message: MessagePayload,
    },
    /// Sent on the personal channel of the party who did not initiate.
    ConversationStarted {
        conversation_id: String,
        with: PartyProfile,
    },
    ConversationAck {
        request_id: Option<String>,
        ack: ConversationAck,
    },
    MessageAck {
        request_id: Option<String>,
        ack: SendMessageAck,
    },
    Error {
        message: String,
    },
}
