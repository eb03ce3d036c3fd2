//! Per-conversation ordered dispatch.
//!
//! Appends run without any in-memory lock. Each send takes a
//! [`SequenceTicket`] before it touches the store, and hands its committed
//! event back through the ticket. Events are held until no append for the
//! conversation is in flight, then flushed in `sent_at` order. Any append
//! that starts after a flush commits later and therefore sorts later, so
//! joined connections observe commit order. Flushing only queues with
//! `try_send` while the conversation's entry is held; nothing is awaited.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::events::ServerEvent;
use crate::router::RoomRouter;

type SequenceKey = (DateTime<Utc>, String);

#[derive(Default)]
struct Sequence {
    in_flight: usize,
    pending: BTreeMap<SequenceKey, ServerEvent>,
}

pub struct ConversationSequencer {
    router: Arc<dyn RoomRouter>,
    sequences: DashMap<String, Sequence>,
}

impl ConversationSequencer {
    pub fn new(router: Arc<dyn RoomRouter>) -> Self {
        Self {
            router,
            sequences: DashMap::new(),
        }
    }

    /// Announce an append that is about to start.
    pub fn begin(&self, conversation_id: &str) -> SequenceTicket<'_> {
        self.sequences
            .entry(conversation_id.to_string())
            .or_default()
            .in_flight += 1;

        SequenceTicket {
            sequencer: self,
            conversation_id: conversation_id.to_string(),
            finished: false,
        }
    }

    /// Conversations with an append in flight or events awaiting flush.
    pub fn active_sequences(&self) -> usize {
        self.sequences.len()
    }

    fn complete(&self, conversation_id: &str, committed: Option<(SequenceKey, ServerEvent)>) -> usize {
        let mut delivered = 0;
        if let Some(mut sequence) = self.sequences.get_mut(conversation_id) {
            if let Some((key, event)) = committed {
                sequence.pending.insert(key, event);
            }
            sequence.in_flight = sequence.in_flight.saturating_sub(1);
            if sequence.in_flight == 0 {
                for (_, event) in std::mem::take(&mut sequence.pending) {
                    delivered += self.router.broadcast(conversation_id, event);
                }
            }
        }
        self.sequences.remove_if(conversation_id, |_, sequence| {
            sequence.in_flight == 0 && sequence.pending.is_empty()
        });
        delivered
    }
}

/// One in-flight append. Dropping it unpublished (failed or cancelled
/// append) releases its slot so held events still flush.
pub struct SequenceTicket<'a> {
    sequencer: &'a ConversationSequencer,
    conversation_id: String,
    finished: bool,
}

impl SequenceTicket<'_> {
    /// Hand over the committed event. Returns how many deliveries this
    /// call flushed, which may include earlier held events or none at all
    /// while another append is still in flight.
    pub fn publish(mut self, sent_at: DateTime<Utc>, message_id: &str, event: ServerEvent) -> usize {
        self.finished = true;
        self.sequencer.complete(
            &self.conversation_id,
            Some(((sent_at, message_id.to_string()), event)),
        )
    }
}

impl Drop for SequenceTicket<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.sequencer.complete(&self.conversation_id, None);
        }
    }
}
