//! Bidirectional named-event transport between client and server.
//!
//! A [`Channel`] carries fire-and-forget [`ClientEvent`]s to the server and
//! dispatches inbound [`ServerEvent`]s to registered listeners. Many tails
//! share one channel; each listener is removed by the [`ListenerId`] it was
//! registered under, so tails never remove each other's handlers.
//!
//! Events of the same kind are dispatched in the order the server sent them.
//!
//! # Example
//!
//! ```ignore
//! let (channel, peer) = LocalChannel::pair();
//!
//! let id = channel.on(EventKind::Messages, Arc::new(|event: &ServerEvent| {
//!     println!("{:?}", event);
//! }));
//! channel.emit(ClientEvent::ExtendTail { tail_id: TailId(1), count: 10 })?;
//! channel.remove_listener(EventKind::Messages, id);
//! ```

mod codec;
mod local;
mod registry;

pub use codec::{decode_frame, encode_frame};
pub use local::{ChannelPeer, LocalChannel};
pub use registry::{ListenerRegistry, TailIdAllocator};

use crate::error::Result;
use crate::types::{Message, MessageId, TailId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Events sent from client to server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Register a forward tail starting at `start`.
    NewTail {
        tail_id: TailId,
        start: Option<MessageId>,
        inclusive: bool,
    },

    /// Ask for up to `count` messages in total since the tail's registration.
    ExtendTail { tail_id: TailId, count: usize },
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::NewTail { .. } => "new-tail",
            ClientEvent::ExtendTail { .. } => "extend-tail",
        }
    }

    pub fn tail_id(&self) -> TailId {
        match self {
            ClientEvent::NewTail { tail_id, .. } | ClientEvent::ExtendTail { tail_id, .. } => {
                *tail_id
            }
        }
    }
}

/// Events pushed from server to client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// A batch for one forward tail.
    Messages {
        tail_id: TailId,
        messages: Vec<Message>,
        is_done: bool,
    },

    /// Live broadcast of a newly received message.
    Message { message: Message },
}

impl ServerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ServerEvent::Messages { .. } => EventKind::Messages,
            ServerEvent::Message { .. } => EventKind::Message,
        }
    }
}

/// Names of inbound events listeners can register for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Messages,
    Message,
}

impl EventKind {
    pub fn name(self) -> &'static str {
        match self {
            EventKind::Messages => "messages",
            EventKind::Message => "message",
        }
    }
}

/// Handle identifying one registered listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Inbound event handler.
pub type Listener = Arc<dyn Fn(&ServerEvent) + Send + Sync>;

/// A persistent, bidirectional event transport.
pub trait Channel: Send + Sync {
    /// Send an event to the remote peer. Fire-and-forget.
    fn emit(&self, event: ClientEvent) -> Result<()>;

    /// Register a handler for every inbound event of `kind`.
    fn on(&self, kind: EventKind, listener: Listener) -> ListenerId;

    /// Unregister exactly the handler registered under `id`.
    ///
    /// Returns false if no such handler was registered.
    fn remove_listener(&self, kind: EventKind, id: ListenerId) -> bool;

    /// Tail identifiers scoped to this channel.
    fn tail_ids(&self) -> &TailIdAllocator;
}
