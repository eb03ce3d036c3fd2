//! Message entity definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted message. Messages are append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}
