//! Append-only in-memory message log.

use crate::error::{Result, TailError};
use crate::types::{Message, MessageId, Notice, Timestamp};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Append-only message log.
///
/// Assigns cursors `1, 2, 3, ...` in arrival order.
pub struct MessageLog {
    /// Messages in stream order.
    entries: RwLock<Vec<Message>>,

    /// Cursor to position in `entries`.
    positions: RwLock<HashMap<MessageId, usize>>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            positions: RwLock::new(HashMap::new()),
        }
    }

    /// Append a notice, stamping it with the next cursor and the current time.
    pub fn append(&self, notice: Notice) -> Message {
        self.append_at(notice, Timestamp::now())
    }

    /// Append a notice with an explicit receive time.
    pub fn append_at(&self, notice: Notice, receive_time: Timestamp) -> Message {
        let mut entries = self.entries.write();
        let position = entries.len();
        let message = Message::new(position as u64 + 1, receive_time, notice);

        self.positions.write().insert(message.id.clone(), position);
        entries.push(message.clone());
        message
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Cursor of the newest message.
    pub fn head(&self) -> Option<MessageId> {
        self.entries.read().last().map(|m| m.id.clone())
    }

    pub fn position(&self, id: &MessageId) -> Option<usize> {
        self.positions.read().get(id).copied()
    }

    /// Up to `limit` messages following `cursor`, oldest first.
    ///
    /// `None` starts from the oldest message. With `inclusive`, the cursor's
    /// own message leads the result. The flag is true when the result reaches
    /// the newest message.
    pub fn after(
        &self,
        cursor: Option<&MessageId>,
        inclusive: bool,
        limit: usize,
    ) -> Result<(Vec<Message>, bool)> {
        let start = match cursor {
            None => 0,
            Some(id) => {
                let position = self
                    .position(id)
                    .ok_or_else(|| TailError::CursorNotFound(id.clone()))?;
                if inclusive {
                    position
                } else {
                    position + 1
                }
            }
        };

        let entries = self.entries.read();
        let start = start.min(entries.len());
        let end = start.saturating_add(limit).min(entries.len());
        Ok((entries[start..end].to_vec(), end == entries.len()))
    }

    /// Up to `limit` messages preceding `cursor`, newest first.
    ///
    /// `None` starts from (and includes) the newest message. The flag is true
    /// when no earlier messages exist beyond the result.
    pub fn before(&self, cursor: Option<&MessageId>, limit: usize) -> Result<(Vec<Message>, bool)> {
        let entries = self.entries.read();
        let end = match cursor {
            None => entries.len(),
            Some(id) => self
                .position(id)
                .ok_or_else(|| TailError::CursorNotFound(id.clone()))?,
        };

        let start = end.saturating_sub(limit);
        let page = entries[start..end].iter().rev().cloned().collect();
        Ok((page, start == 0))
    }
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new()
    }
}
