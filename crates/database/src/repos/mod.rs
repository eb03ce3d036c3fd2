//! Database repository implementations

pub mod conversation_repository;
pub mod message_repository;
pub mod participant_repository;
pub mod party_repository;

pub use conversation_repository::ConversationRepository;
pub use message_repository::MessageRepository;
pub use participant_repository::ParticipantRepository;
pub use party_repository::PartyRepository;
