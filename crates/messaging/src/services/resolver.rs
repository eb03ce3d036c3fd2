//! Conversation resolution: one canonical conversation per pair of parties.

use gigboard_database::{
    Conversation, ConversationRepository, DatabaseError, NewConversation, ParticipantPair,
    PartyRepository,
};
use tracing::{debug, info};

use crate::error::{ChatError, ChatResult};
use crate::events::ContextRefs;

/// Outcome of [`ConversationResolver::find_or_create`].
#[derive(Debug, Clone)]
pub struct Resolution {
    pub conversation: Conversation,
    /// `true` only for the call whose transaction inserted the row.
    pub created: bool,
}

#[derive(Clone)]
pub struct ConversationResolver {
    conversations: ConversationRepository,
    parties: PartyRepository,
}

impl ConversationResolver {
    pub fn new(conversations: ConversationRepository, parties: PartyRepository) -> Self {
        Self {
            conversations,
            parties,
        }
    }

    /// Return the conversation between `self_id` and `other_id`, creating it
    /// if absent. Context references are only consulted on creation.
    pub async fn find_or_create(
        &self,
        self_id: &str,
        other_id: &str,
        context: &ContextRefs,
    ) -> ChatResult<Resolution> {
        if self_id == other_id {
            return Err(ChatError::invalid_request(
                "cannot start a conversation with yourself",
            ));
        }

        if !self.parties.exists(other_id).await? {
            return Err(ChatError::not_found("recipient not found"));
        }

        let pair = ParticipantPair::new(self_id, other_id);
        if let Some(conversation) = self.conversations.find_between(&pair).await? {
            debug!(conversation_id = %conversation.id, "resolved existing conversation");
            return Ok(Resolution {
                conversation,
                created: false,
            });
        }

        let request = self.new_conversation(pair.clone(), context).await?;

        match self.conversations.create(&request).await {
            Ok(conversation) => {
                info!(
                    conversation_id = %conversation.id,
                    initiator = self_id,
                    recipient = other_id,
                    "conversation created"
                );
                Ok(Resolution {
                    conversation,
                    created: true,
                })
            }
            Err(error) if error.is_duplicate() => {
                debug!(
                    participant_low = pair.low(),
                    participant_high = pair.high(),
                    "lost creation race, re-reading conversation"
                );
                let conversation = self.conversations.find_between(&pair).await?.ok_or_else(|| {
                    DatabaseError::InternalError(
                        "conversation vanished after uniqueness violation".into(),
                    )
                })?;
                Ok(Resolution {
                    conversation,
                    created: false,
                })
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn new_conversation(
        &self,
        pair: ParticipantPair,
        context: &ContextRefs,
    ) -> ChatResult<NewConversation> {
        let mut request = NewConversation::between(pair);

        if let Some(job_id) = &context.job_id {
            let client_id = self
                .parties
                .find_job_client(job_id)
                .await?
                .ok_or_else(|| ChatError::not_found("job not found"))?;
            request.job_id = Some(job_id.clone());
            request.client_id = Some(client_id);
        }

        if let Some(application_id) = &context.application_id {
            let worker_id = self
                .parties
                .find_application_worker(application_id)
                .await?
                .ok_or_else(|| ChatError::not_found("application not found"))?;
            request.application_id = Some(application_id.clone());
            request.worker_id = Some(worker_id);
        }

        Ok(request)
    }
}
