//! Per-participant read watermarks.

use chrono::{DateTime, Utc};
use gigboard_database::{DatabaseError, ParticipantRepository};

use crate::error::{ChatError, ChatResult};

#[derive(Clone)]
pub struct ReadTracker {
    participants: ParticipantRepository,
}

impl ReadTracker {
    pub fn new(participants: ParticipantRepository) -> Self {
        Self { participants }
    }

    /// Move the watermark to now, or to the latest committed message if
    /// that is later. Never moves it backward.
    pub async fn mark_read(&self, conversation_id: &str, user_id: &str) -> ChatResult<DateTime<Utc>> {
        self.participants
            .mark_read(conversation_id, user_id, Utc::now())
            .await
            .map_err(not_a_participant)
    }

    pub async fn is_unread(&self, conversation_id: &str, user_id: &str) -> ChatResult<bool> {
        self.participants
            .is_unread(conversation_id, user_id)
            .await
            .map_err(not_a_participant)
    }
}

fn not_a_participant(error: DatabaseError) -> ChatError {
    match error {
        DatabaseError::NotFound(_) => ChatError::forbidden("not a participant of this conversation"),
        other => other.into(),
    }
}
