//! Append-only message persistence.

use chrono::Utc;
use gigboard_database::{Message, MessageRepository, ParticipantRepository};

use crate::error::{ChatError, ChatResult};

#[derive(Clone)]
pub struct MessageStore {
    messages: MessageRepository,
    participants: ParticipantRepository,
    max_length: usize,
}

impl MessageStore {
    pub fn new(
        messages: MessageRepository,
        participants: ParticipantRepository,
        max_length: usize,
    ) -> Self {
        Self {
            messages,
            participants,
            max_length,
        }
    }

    /// Reject empty content and content longer than the configured limit,
    /// measured in characters.
    pub fn validate_content(&self, content: &str) -> ChatResult<()> {
        if content.trim().is_empty() {
            return Err(ChatError::invalid_request("content must not be empty"));
        }
        if content.chars().count() > self.max_length {
            return Err(ChatError::invalid_request(format!(
                "content exceeds {} characters",
                self.max_length
            )));
        }
        Ok(())
    }

    /// Persist a message. `sent_at` is assigned inside the write transaction
    /// together with the conversation's `last_message_at`.
    pub async fn append(
        &self,
        conversation_id: &str,
        sender_id: &str,
        content: &str,
    ) -> ChatResult<Message> {
        self.validate_content(content)?;

        if !self
            .participants
            .is_participant(conversation_id, sender_id)
            .await?
        {
            return Err(ChatError::forbidden(
                "not a participant of this conversation",
            ));
        }

        let message = self
            .messages
            .append(conversation_id, sender_id, content, Utc::now())
            .await?;
        Ok(message)
    }
}
