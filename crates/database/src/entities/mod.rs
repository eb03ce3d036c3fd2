//! Domain entities for the database layer

pub mod conversation;
pub mod message;
pub mod participant;
pub mod party;

pub use conversation::{Conversation, ConversationSummary, NewConversation, ParticipantPair};
pub use message::Message;
pub use participant::Participant;
pub use party::Party;
