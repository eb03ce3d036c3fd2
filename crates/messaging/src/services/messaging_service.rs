//! Facade over the messaging components, shared by every connection.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use gigboard_auth::Identity;
use gigboard_config::MessagingConfig;
use gigboard_database::{
    Conversation, ConversationRepository, ConversationSummary, MessageRepository,
    ParticipantRepository, PartyRepository,
};
use sqlx::SqlitePool;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{ChatError, ChatResult};
use crate::events::{
    ClientRequest, ContextRefs, ConversationAck, MessagePayload, PartyProfile, SendMessageAck,
    ServerEvent,
};
use crate::router::{ConnectionHandle, InMemoryRouter, RoomRouter};
use crate::sequencer::ConversationSequencer;

use super::history::{HistoryPage, HistoryPaginator};
use super::message_store::MessageStore;
use super::read_tracker::ReadTracker;
use super::resolver::ConversationResolver;

pub struct MessagingService {
    resolver: ConversationResolver,
    store: MessageStore,
    read_tracker: ReadTracker,
    history: HistoryPaginator,
    conversations: ConversationRepository,
    participants: ParticipantRepository,
    router: Arc<dyn RoomRouter>,
    sequencer: ConversationSequencer,
    outbound_buffer: usize,
}

impl MessagingService {
    /// Build the service with the per-process [`InMemoryRouter`].
    pub fn new(pool: SqlitePool, config: &MessagingConfig) -> Self {
        Self::with_router(pool, config, Arc::new(InMemoryRouter::new()))
    }

    pub fn with_router(
        pool: SqlitePool,
        config: &MessagingConfig,
        router: Arc<dyn RoomRouter>,
    ) -> Self {
        let conversations = ConversationRepository::new(pool.clone());
        let participants = ParticipantRepository::new(pool.clone());
        let messages = MessageRepository::new(pool.clone());
        let parties = PartyRepository::new(pool);

        Self {
            sequencer: ConversationSequencer::new(Arc::clone(&router)),
            resolver: ConversationResolver::new(conversations.clone(), parties),
            store: MessageStore::new(
                messages.clone(),
                participants.clone(),
                config.max_message_length,
            ),
            read_tracker: ReadTracker::new(participants.clone()),
            history: HistoryPaginator::new(
                messages,
                config.default_page_size,
                config.max_page_size,
            ),
            conversations,
            participants,
            router,
            outbound_buffer: config.outbound_buffer.max(1),
        }
    }

    pub fn router(&self) -> &Arc<dyn RoomRouter> {
        &self.router
    }

    /// Channel feeding one connection's writer.
    pub fn outbound_channel(&self) -> (mpsc::Sender<ServerEvent>, mpsc::Receiver<ServerEvent>) {
        mpsc::channel(self.outbound_buffer)
    }

    /// Register an authenticated connection and greet it.
    pub async fn connect(
        &self,
        identity: Identity,
        outbound: mpsc::Sender<ServerEvent>,
    ) -> ConnectionHandle {
        let connection = ConnectionHandle::new(identity, outbound);
        self.router.register(&connection).await;
        connection
            .send(ServerEvent::Hello {
                user_id: connection.user_id().to_string(),
            })
            .await;
        info!(connection_id = %connection.id, user_id = connection.user_id(), "connection opened");
        connection
    }

    pub async fn disconnect(&self, connection: &ConnectionHandle) {
        self.router.disconnect(connection.id).await;
        info!(connection_id = %connection.id, user_id = connection.user_id(), "connection closed");
    }

    /// Join a conversation room. Only persisted participants may join.
    pub async fn join(&self, connection: &ConnectionHandle, conversation_id: &str) -> ChatResult<()> {
        if !self
            .participants
            .is_participant(conversation_id, connection.user_id())
            .await?
        {
            warn!(
                connection_id = %connection.id,
                user_id = connection.user_id(),
                conversation_id,
                "join denied"
            );
            return Err(ChatError::forbidden(
                "not authorized to join this conversation",
            ));
        }

        self.router.join(connection, conversation_id).await;
        Ok(())
    }

    pub async fn leave(&self, connection: &ConnectionHandle, conversation_id: &str) {
        self.router.leave(connection.id, conversation_id).await;
    }

    /// Resolve the conversation with `recipient_id`. When this call creates
    /// it, the recipient's live connections are told about it.
    pub async fn find_or_create(
        &self,
        identity: &Identity,
        recipient_id: &str,
        context: &ContextRefs,
    ) -> ChatResult<Conversation> {
        let resolution = self
            .resolver
            .find_or_create(&identity.user_id, recipient_id, context)
            .await?;

        if resolution.created {
            let notified = self.router.notify_user(
                recipient_id,
                ServerEvent::ConversationStarted {
                    conversation_id: resolution.conversation.id.clone(),
                    with: PartyProfile::from(identity),
                },
            );
            debug!(
                conversation_id = %resolution.conversation.id,
                recipient_id,
                notified,
                "conversation start announced"
            );
        }

        Ok(resolution.conversation)
    }

    /// Validate, resolve, persist and broadcast a message.
    pub async fn send_message(
        &self,
        identity: &Identity,
        recipient_id: &str,
        content: &str,
        context: &ContextRefs,
    ) -> ChatResult<MessagePayload> {
        self.store.validate_content(content)?;

        let conversation = self.find_or_create(identity, recipient_id, context).await?;

        let ticket = self.sequencer.begin(&conversation.id);
        let message = self
            .store
            .append(&conversation.id, &identity.user_id, content)
            .await?;
        let payload = MessagePayload::new(message, PartyProfile::from(identity));

        let delivered = ticket.publish(
            payload.sent_at,
            &payload.message_id,
            ServerEvent::ReceiveMessage {
                message: payload.clone(),
            },
        );

        info!(
            conversation_id = %conversation.id,
            message_id = %payload.message_id,
            sender_id = %identity.user_id,
            delivered,
            "message sent"
        );
        Ok(payload)
    }

    pub async fn list_conversations(&self, user_id: &str) -> ChatResult<Vec<ConversationSummary>> {
        Ok(self.conversations.list_for_user(user_id).await?)
    }

    pub async fn history(
        &self,
        user_id: &str,
        conversation_id: &str,
        limit: Option<u32>,
        cursor: Option<&str>,
    ) -> ChatResult<HistoryPage> {
        self.ensure_participant(conversation_id, user_id).await?;
        self.history.list(conversation_id, limit, cursor).await
    }

    pub async fn mark_read(&self, user_id: &str, conversation_id: &str) -> ChatResult<DateTime<Utc>> {
        let watermark = self.read_tracker.mark_read(conversation_id, user_id).await?;
        debug!(conversation_id, user_id, %watermark, "conversation marked read");
        Ok(watermark)
    }

    pub async fn is_unread(&self, user_id: &str, conversation_id: &str) -> ChatResult<bool> {
        self.read_tracker.is_unread(conversation_id, user_id).await
    }

    /// Run one client request to completion and queue its reply, if any.
    pub async fn handle_request(&self, connection: &ConnectionHandle, request: ClientRequest) {
        match request {
            ClientRequest::Ping => {
                connection.send(ServerEvent::Pong).await;
            }
            ClientRequest::Join { conversation_id } => {
                if let Err(error) = self.join(connection, &conversation_id).await {
                    log_failure(connection, "join", &error);
                    connection
                        .send(ServerEvent::Error {
                            message: error.client_message(),
                        })
                        .await;
                }
            }
            ClientRequest::Leave { conversation_id } => {
                self.leave(connection, &conversation_id).await;
            }
            ClientRequest::FindOrCreateConversation {
                request_id,
                recipient_id,
                job_id,
                application_id,
            } => {
                let context = ContextRefs::new(job_id, application_id);
                let ack = match self
                    .find_or_create(&connection.identity, &recipient_id, &context)
                    .await
                {
                    Ok(conversation) => ConversationAck::Ok {
                        conversation_id: conversation.id,
                    },
                    Err(error) => {
                        log_failure(connection, "find_or_create_conversation", &error);
                        ConversationAck::Error {
                            message: error.client_message(),
                        }
                    }
                };
                connection
                    .send(ServerEvent::ConversationAck { request_id, ack })
                    .await;
            }
            ClientRequest::SendMessage {
                request_id,
                recipient_id,
                content,
                job_id,
                application_id,
                client_temp_id,
            } => {
                let context = ContextRefs::new(job_id, application_id);
                let ack = match self
                    .send_message(&connection.identity, &recipient_id, &content, &context)
                    .await
                {
                    Ok(message) => SendMessageAck::Ok {
                        message,
                        client_temp_id,
                    },
                    Err(error) => {
                        log_failure(connection, "send_message", &error);
                        SendMessageAck::Error {
                            message: error.client_message(),
                            client_temp_id,
                        }
                    }
                };
                connection
                    .send(ServerEvent::MessageAck { request_id, ack })
                    .await;
            }
        }
    }

    pub async fn shutdown(&self) {
        self.router.shutdown().await;
    }

    async fn ensure_participant(&self, conversation_id: &str, user_id: &str) -> ChatResult<()> {
        if self
            .participants
            .is_participant(conversation_id, user_id)
            .await?
        {
            Ok(())
        } else {
            Err(ChatError::forbidden("not a participant of this conversation"))
        }
    }
}

fn log_failure(connection: &ConnectionHandle, operation: &str, error: &ChatError) {
    match error {
        ChatError::Persistence(_) => warn!(
            connection_id = %connection.id,
            user_id = connection.user_id(),
            operation,
            error = %error,
            "request failed"
        ),
        _ => debug!(
            connection_id = %connection.id,
            user_id = connection.user_id(),
            operation,
            error = %error,
            "request rejected"
        ),
    }
}
