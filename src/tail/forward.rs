//! Live forward tail over a channel.

use super::{Delivery, TailCallback};
use crate::channel::{Channel, ClientEvent, EventKind, ListenerId, ServerEvent};
use crate::error::Result;
use crate::types::{Batch, Message, MessageId, TailId};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, trace};

/// Cursor bookkeeping for one forward tail.
struct Cursor {
    /// Current registration on the channel.
    tail_id: TailId,
    /// Last delivered message, or the start cursor before any delivery.
    last_sent: Option<MessageId>,
    /// Whether `last_sent` itself is still to be delivered.
    inclusive: bool,
    /// Delivered over the tail's whole life.
    sent_total: usize,
    /// Delivered since `tail_id` was registered.
    sent_recent: usize,
    /// Asked for but not yet delivered.
    wanted: usize,
}

/// Point-in-time view of a forward tail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForwardTailState {
    pub tail_id: TailId,
    pub last_sent: Option<MessageId>,
    pub inclusive: bool,
    pub messages_sent_total: usize,
    pub messages_sent_recent: usize,
    pub messages_wanted: usize,
    pub closed: bool,
}

struct Inner {
    channel: Arc<dyn Channel>,
    cursor: Mutex<Cursor>,
    delivery: Delivery,
    listener: Mutex<Option<ListenerId>>,
}

/// A live cursor over the stream, fed by `messages` pushes on a channel.
///
/// The window only grows: `expand_to(count)` asks the server for `count`
/// messages in total over the tail's life. Batches for other tails sharing
/// the channel, or for an earlier registration of this one, are ignored.
///
/// Dropping the handle closes the tail.
pub struct ForwardTail {
    inner: Arc<Inner>,
}

impl ForwardTail {
    /// Register a new tail on `channel` starting at `start`.
    ///
    /// With `inclusive`, the start message itself is the first delivery.
    /// Emits `new-tail` before returning.
    pub fn open(
        channel: Arc<dyn Channel>,
        start: Option<MessageId>,
        inclusive: bool,
        callback: TailCallback,
    ) -> Result<Self> {
        let tail_id = channel.tail_ids().next();
        let inner = Arc::new(Inner {
            channel: Arc::clone(&channel),
            cursor: Mutex::new(Cursor {
                tail_id,
                last_sent: start,
                inclusive,
                sent_total: 0,
                sent_recent: 0,
                wanted: 0,
            }),
            delivery: Delivery::new(callback),
            listener: Mutex::new(None),
        });

        let weak = Arc::downgrade(&inner);
        let listener_id = channel.on(
            EventKind::Messages,
            Arc::new(move |event: &ServerEvent| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_event(event);
                }
            }),
        );
        *inner.listener.lock() = Some(listener_id);

        let tail = ForwardTail { inner };
        if let Err(e) = tail.inner.announce() {
            tail.close();
            return Err(e);
        }
        Ok(tail)
    }

    /// Grow the window so that `count` messages in total will be delivered.
    ///
    /// No-op once closed.
    pub fn expand_to(&self, count: usize) -> Result<()> {
        if self.inner.delivery.is_closed() {
            return Ok(());
        }

        let event = {
            let mut cursor = self.inner.cursor.lock();
            cursor.wanted = cursor.wanted.max(count.saturating_sub(cursor.sent_total));
            debug!(
                tail_id = %cursor.tail_id,
                wanted = cursor.wanted,
                sent_total = cursor.sent_total,
                "expand forward tail"
            );
            ClientEvent::ExtendTail {
                tail_id: cursor.tail_id,
                count: cursor.wanted + cursor.sent_recent,
            }
        };
        self.inner.channel.emit(event)
    }

    /// Register again under a fresh tail id, resuming after the last
    /// delivered message with the outstanding window carried over.
    ///
    /// Batches still in flight for the old id are dropped.
    pub fn reregister(&self) -> Result<()> {
        if self.inner.delivery.is_closed() {
            return Ok(());
        }

        let tail_id = self.inner.channel.tail_ids().next();
        {
            let mut cursor = self.inner.cursor.lock();
            debug!(old = %cursor.tail_id, new = %tail_id, "re-registering forward tail");
            cursor.tail_id = tail_id;
        }
        self.inner.announce()
    }

    /// Stop all further callbacks and release the channel listener.
    pub fn close(&self) {
        self.inner.close();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.delivery.is_closed()
    }

    pub fn tail_id(&self) -> TailId {
        self.inner.cursor.lock().tail_id
    }

    pub fn state(&self) -> ForwardTailState {
        let cursor = self.inner.cursor.lock();
        ForwardTailState {
            tail_id: cursor.tail_id,
            last_sent: cursor.last_sent.clone(),
            inclusive: cursor.inclusive,
            messages_sent_total: cursor.sent_total,
            messages_sent_recent: cursor.sent_recent,
            messages_wanted: cursor.wanted,
            closed: self.inner.delivery.is_closed(),
        }
    }
}

impl Drop for ForwardTail {
    fn drop(&mut self) {
        self.inner.close();
    }
}

impl Inner {
    /// Emit `new-tail` for the current registration, then `extend-tail` if
    /// a window is already outstanding.
    fn announce(&self) -> Result<()> {
        let events = {
            let mut cursor = self.cursor.lock();
            cursor.sent_recent = 0;

            let mut events = vec![ClientEvent::NewTail {
                tail_id: cursor.tail_id,
                start: cursor.last_sent.clone(),
                inclusive: cursor.inclusive,
            }];
            if cursor.wanted > 0 {
                events.push(ClientEvent::ExtendTail {
                    tail_id: cursor.tail_id,
                    count: cursor.wanted,
                });
            }
            events
        };

        for event in events {
            self.channel.emit(event)?;
        }
        Ok(())
    }

    fn on_event(&self, event: &ServerEvent) {
        let ServerEvent::Messages {
            tail_id,
            messages,
            is_done,
        } = event
        else {
            return;
        };

        {
            let mut cursor = self.cursor.lock();
            if *tail_id != cursor.tail_id {
                return;
            }
            record_delivery(&mut cursor, messages);
            trace!(
                %tail_id,
                count = messages.len(),
                is_done,
                wanted = cursor.wanted,
                "forward batch"
            );
        }

        self.delivery
            .deliver(Ok(Batch::new(messages.clone(), *is_done)));
    }

    fn close(&self) {
        if !self.delivery.close() {
            return;
        }
        if let Some(id) = self.listener.lock().take() {
            self.channel.remove_listener(EventKind::Messages, id);
        }
        debug!(tail_id = %self.cursor.lock().tail_id, "forward tail closed");
    }
}

fn record_delivery(cursor: &mut Cursor, messages: &[Message]) {
    let Some(last) = messages.last() else {
        return;
    };
    cursor.last_sent = Some(last.id.clone());
    cursor.inclusive = false;
    cursor.sent_total += messages.len();
    cursor.sent_recent += messages.len();
    cursor.wanted = cursor.wanted.saturating_sub(messages.len());
}
