//! Per-channel dispatch state.

use super::{EventKind, Listener, ListenerId, ServerEvent};
use crate::types::TailId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic tail identifier source owned by one channel.
#[derive(Debug)]
pub struct TailIdAllocator {
    next_id: AtomicU64,
}

impl TailIdAllocator {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
        }
    }

    /// Return the current value and advance. Never reuses an identifier.
    pub fn next(&self) -> TailId {
        TailId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// The identifier the next call to [`next`](Self::next) will return.
    pub fn peek(&self) -> TailId {
        TailId(self.next_id.load(Ordering::SeqCst))
    }
}

impl Default for TailIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Listeners registered on a channel, grouped by event kind.
pub struct ListenerRegistry {
    /// Registration order is dispatch order.
    listeners: RwLock<HashMap<EventKind, Vec<(ListenerId, Listener)>>>,
    next_id: AtomicU64,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn add(&self, kind: EventKind, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.listeners
            .write()
            .entry(kind)
            .or_default()
            .push((id, listener));
        id
    }

    pub fn remove(&self, kind: EventKind, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let Some(entries) = listeners.get_mut(&kind) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            listeners.remove(&kind);
        }
        removed
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.listeners.read().get(&kind).map_or(0, Vec::len)
    }

    /// Invoke every listener for the event's kind. Returns how many ran.
    ///
    /// The listener list is snapshotted first, so handlers may register or
    /// unregister listeners while being dispatched.
    pub fn dispatch(&self, event: &ServerEvent) -> usize {
        let snapshot: Vec<Listener> = match self.listeners.read().get(&event.kind()) {
            Some(entries) => entries.iter().map(|(_, l)| l.clone()).collect(),
            None => return 0,
        };

        for listener in &snapshot {
            listener(event);
        }
        snapshot.len()
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
