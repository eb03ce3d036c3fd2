//! # Gigboard Messaging
//!
//! The real-time messaging core: resolving the canonical conversation
//! between two parties, appending ordered messages, tracking read
//! watermarks, paging history and fanning live messages out to joined
//! connections.
//!
//! ## Architecture
//!
//! - **Services**: resolver, message store, read tracker, history paginator
//!   and the [`MessagingService`] facade
//! - **Router**: live connection registry behind the [`RoomRouter`] trait
//! - **Sequencer**: per-conversation dispatch releasing events in commit order
//! - **Events**: tagged JSON frames exchanged with clients

pub mod error;
pub mod events;
pub mod router;
pub mod sequencer;
pub mod services;

pub use error::{ChatError, ChatResult};
pub use events::{
    ClientRequest, ContextRefs, ConversationAck, MessagePayload, PartyProfile, SendMessageAck,
    ServerEvent,
};
pub use router::{ConnectionHandle, ConnectionId, InMemoryRouter, RoomRouter};
pub use sequencer::{ConversationSequencer, SequenceTicket};
pub use services::{
    decode_cursor, encode_cursor, ConversationResolver, HistoryPage, HistoryPaginator,
    MessageStore, MessagingService, ReadTracker, Resolution,
};
