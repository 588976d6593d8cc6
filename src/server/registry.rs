//! Server-side forward tails for one connection.

use super::log::MessageLog;
use crate::channel::{ClientEvent, ServerEvent};
use crate::types::{MessageId, TailId};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Internal tail state.
struct ServerTail {
    /// Cursor of the last message pushed (or the registration start).
    last_sent: Option<MessageId>,
    inclusive: bool,
    /// Messages pushed since registration.
    sent: usize,
    /// Absolute count requested since registration.
    wanted: usize,
    /// Reached the head in the last push. Quiet until the next extend.
    done: bool,
}

impl ServerTail {
    fn outstanding(&self) -> usize {
        self.wanted.saturating_sub(self.sent)
    }
}

/// Forward tails registered on one connection, keyed by client-chosen id.
///
/// Registrations live as long as the connection. The client never says when
/// it abandons one (on close or re-registration), so a stale registration
/// keeps serving its last window until the window is filled or a batch
/// reaches the head, and then stays quiet.
pub struct TailRegistry {
    tails: RwLock<HashMap<TailId, ServerTail>>,
}

impl TailRegistry {
    pub fn new() -> Self {
        Self {
            tails: RwLock::new(HashMap::new()),
        }
    }

    pub fn tail_count(&self) -> usize {
        self.tails.read().len()
    }

    pub fn contains(&self, tail_id: TailId) -> bool {
        self.tails.read().contains_key(&tail_id)
    }

    /// Apply one client event. Returns the batches to push.
    pub fn apply(&self, event: ClientEvent, log: &MessageLog) -> Vec<ServerEvent> {
        match event {
            ClientEvent::NewTail {
                tail_id,
                start,
                inclusive,
            } => {
                debug!(%tail_id, ?start, inclusive, "new tail");
                self.tails.write().insert(
                    tail_id,
                    ServerTail {
                        last_sent: start,
                        inclusive,
                        sent: 0,
                        wanted: 0,
                        done: false,
                    },
                );
                Vec::new()
            }
            ClientEvent::ExtendTail { tail_id, count } => {
                let mut tails = self.tails.write();
                let Some(tail) = tails.get_mut(&tail_id) else {
                    debug!(%tail_id, "extend for unknown tail ignored");
                    return Vec::new();
                };
                // Counts are absolute, so repeats are harmless.
                tail.wanted = tail.wanted.max(count);
                tail.done = false;
                match Self::flush(tail_id, tail, log) {
                    Ok(event) => event.into_iter().collect(),
                    Err(()) => {
                        tails.remove(&tail_id);
                        Vec::new()
                    }
                }
            }
        }
    }

    /// Push newly appended messages to every tail with outstanding demand
    /// that has not reported the head since its last extend.
    pub fn on_append(&self, log: &MessageLog) -> Vec<ServerEvent> {
        let mut tails = self.tails.write();
        let mut events = Vec::new();
        let mut broken = Vec::new();

        for (tail_id, tail) in tails.iter_mut().filter(|(_, tail)| !tail.done) {
            match Self::flush(*tail_id, tail, log) {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(()) => broken.push(*tail_id),
            }
        }

        for tail_id in broken {
            tails.remove(&tail_id);
        }
        events
    }

    /// Build the next batch for a tail, if it wants more and more exists.
    ///
    /// Err means the tail's cursor is unknown to the log and the tail is dead.
    fn flush(
        tail_id: TailId,
        tail: &mut ServerTail,
        log: &MessageLog,
    ) -> std::result::Result<Option<ServerEvent>, ()> {
        let outstanding = tail.outstanding();
        if outstanding == 0 {
            return Ok(None);
        }

        let (messages, at_head) = log
            .after(tail.last_sent.as_ref(), tail.inclusive, outstanding)
            .map_err(|e| {
                warn!(%tail_id, error = %e, "dropping tail");
            })?;
        if messages.is_empty() {
            return Ok(None);
        }

        if let Some(last) = messages.last() {
            tail.last_sent = Some(last.id.clone());
        }
        tail.inclusive = false;
        tail.sent += messages.len();
        tail.done = at_head;

        Ok(Some(ServerEvent::Messages {
            tail_id,
            messages,
            is_done: at_head,
        }))
    }
}

impl Default for TailRegistry {
    fn default() -> Self {
        Self::new()
    }
}
