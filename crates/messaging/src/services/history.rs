//! Backward, cursor-bounded message history.
//!
//! A cursor is the RFC 3339 rendering (microsecond precision) of the
//! `sent_at` of the oldest message on the previous page. Clients treat it
//! as opaque.

use chrono::{DateTime, SecondsFormat, Utc};
use gigboard_database::{Message, MessageRepository};

use crate::error::{ChatError, ChatResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryPage {
    /// Oldest first.
    pub messages: Vec<Message>,
    /// Present only when older messages exist.
    pub next_cursor: Option<String>,
}

#[derive(Clone)]
pub struct HistoryPaginator {
    messages: MessageRepository,
    default_limit: u32,
    max_limit: u32,
}

impl HistoryPaginator {
    pub fn new(messages: MessageRepository, default_limit: u32, max_limit: u32) -> Self {
        Self {
            messages,
            default_limit,
            max_limit,
        }
    }

    pub fn resolve_limit(&self, requested: Option<u32>) -> ChatResult<u32> {
        match requested {
            None => Ok(self.default_limit.clamp(1, self.max_limit.max(1))),
            Some(limit) if (1..=self.max_limit).contains(&limit) => Ok(limit),
            Some(limit) => Err(ChatError::invalid_request(format!(
                "limit must be between 1 and {}, got {limit}",
                self.max_limit
            ))),
        }
    }

    pub async fn list(
        &self,
        conversation_id: &str,
        limit: Option<u32>,
        cursor: Option<&str>,
    ) -> ChatResult<HistoryPage> {
        let limit = self.resolve_limit(limit)? as usize;
        let before = cursor.map(decode_cursor).transpose()?;

        // One extra row tells whether anything older remains.
        let mut messages = self
            .messages
            .find_before(conversation_id, before, limit as i64 + 1)
            .await?;

        let has_more = messages.len() > limit;
        messages.truncate(limit);
        messages.reverse();

        let next_cursor = if has_more {
            messages.first().map(|oldest| encode_cursor(oldest.sent_at))
        } else {
            None
        };

        Ok(HistoryPage {
            messages,
            next_cursor,
        })
    }
}

pub fn encode_cursor(sent_at: DateTime<Utc>) -> String {
    sent_at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Cursors carry whole microseconds, the precision of stored `sent_at`.
/// Finer digits would be truncated in the keyset comparison and skip the
/// message at that microsecond, so they are rejected.
pub fn decode_cursor(cursor: &str) -> ChatResult<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(cursor)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| ChatError::invalid_request("invalid cursor"))?;

    if parsed.timestamp_subsec_nanos() % 1_000 != 0 {
        return Err(ChatError::invalid_request(
            "cursor precision finer than a microsecond",
        ));
    }
    Ok(parsed)
}
