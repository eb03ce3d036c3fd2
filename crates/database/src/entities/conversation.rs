//! Conversation entity definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Message, Party};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub job_id: Option<String>,
    pub application_id: Option<String>,
    pub client_id: Option<String>,
    pub worker_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_message_at: Option<DateTime<Utc>>,
}

/// The unordered pair of parties in a conversation, stored sorted.
///
/// ```
/// use gigboard_database::ParticipantPair;
///
/// let a = ParticipantPair::new("u2", "u1");
/// let b = ParticipantPair::new("u1", "u2");
/// assert_eq!(a, b);
/// assert_eq!(a.low(), "u1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParticipantPair {
    low: String,
    high: String,
}

impl ParticipantPair {
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Self {
        let (first, second) = (first.into(), second.into());
        if first <= second {
            Self {
                low: first,
                high: second,
            }
        } else {
            Self {
                low: second,
                high: first,
            }
        }
    }

    pub fn low(&self) -> &str {
        &self.low
    }

    pub fn high(&self) -> &str {
        &self.high
    }

    pub fn is_degenerate(&self) -> bool {
        self.low == self.high
    }
}

#[derive(Debug, Clone)]
pub struct NewConversation {
    pub participants: ParticipantPair,
    pub job_id: Option<String>,
    pub application_id: Option<String>,
    pub client_id: Option<String>,
    pub worker_id: Option<String>,
}

impl NewConversation {
    pub fn between(participants: ParticipantPair) -> Self {
        Self {
            participants,
            job_id: None,
            application_id: None,
            client_id: None,
            worker_id: None,
        }
    }
}

/// A conversation as listed for one of its participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub conversation: Conversation,
    pub counterpart: Option<Party>,
    pub last_message: Option<Message>,
    pub is_unread: bool,
}
