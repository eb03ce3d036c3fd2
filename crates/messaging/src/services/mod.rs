//! Messaging services

pub mod history;
pub mod message_store;
pub mod messaging_service;
pub mod read_tracker;
pub mod resolver;

pub use history::{decode_cursor, encode_cursor, HistoryPage, HistoryPaginator};
pub use message_store::MessageStore;
pub use messaging_service::MessagingService;
pub use read_tracker::ReadTracker;
pub use resolver::{ConversationResolver, Resolution};
