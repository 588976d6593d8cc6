//! In-process message server.
//!
//! Serves both sides of the tail protocol from one append-only log: forward
//! tails over [`LocalChannel`] connections and reverse paging through
//! [`handle_request`](Server::handle_request). Identifiers are scoped to the
//! connection they were registered on, extend counts are absolute, and no
//! batch is pushed for a tail the connection does not know.
//!
//! # Example
//!
//! ```ignore
//! let server = Arc::new(Server::new());
//! let channel = Arc::new(server.connect());
//! let model = MessageModel::new(channel.clone(), Arc::new(LocalRequestor::new(server.clone())));
//!
//! let tail = model.new_tail(None, Box::new(|batch| println!("{:?}", batch)))?;
//! tail.expand_to(10)?;
//!
//! server.publish(Notice::new("help", "rust", "hello"));
//! server.serve_pending();
//! channel.pump()?;
//! ```

mod api;
mod log;
mod registry;

pub use log::MessageLog;
pub use registry::TailRegistry;

use crate::channel::{ChannelPeer, LocalChannel, ServerEvent};
use crate::error::{Result, TailError};
use crate::requestor::ApiRequest;
use crate::types::{Message, Notice, Timestamp};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// One client connection.
struct Connection {
    id: u64,
    peer: ChannelPeer,
    tails: TailRegistry,
}

impl Connection {
    /// Send events in order. Returns false once the client is gone.
    fn send_all(&self, events: &[ServerEvent]) -> bool {
        for event in events {
            match self.peer.send(event) {
                Ok(()) => {}
                Err(TailError::ChannelClosed) => return false,
                Err(e) => warn!(connection = self.id, error = %e, "dropping event"),
            }
        }
        true
    }
}

/// Owns the log and every connected client.
pub struct Server {
    log: MessageLog,
    connections: RwLock<Vec<Connection>>,
    next_connection: AtomicU64,
}

impl Server {
    pub fn new() -> Self {
        Self {
            log: MessageLog::new(),
            connections: RwLock::new(Vec::new()),
            next_connection: AtomicU64::new(1),
        }
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    /// Open a new client connection.
    pub fn connect(&self) -> LocalChannel {
        let (channel, peer) = LocalChannel::pair();
        let id = self.next_connection.fetch_add(1, Ordering::SeqCst);
        debug!(connection = id, "connected");

        self.connections.write().push(Connection {
            id,
            peer,
            tails: TailRegistry::new(),
        });
        channel
    }

    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }

    /// Append a notice, broadcast it, and feed tails with outstanding demand.
    pub fn publish(&self, notice: Notice) -> Message {
        self.publish_at(notice, Timestamp::now())
    }

    /// [`publish`](Self::publish) with an explicit receive time.
    pub fn publish_at(&self, notice: Notice, receive_time: Timestamp) -> Message {
        let message = self.log.append_at(notice, receive_time);
        let broadcast = ServerEvent::Message {
            message: message.clone(),
        };

        self.for_each_connection(|conn| {
            let mut events = vec![broadcast.clone()];
            events.extend(conn.tails.on_append(&self.log));
            conn.send_all(&events)
        });
        message
    }

    /// Process every queued client event. Returns how many were handled.
    pub fn serve_pending(&self) -> usize {
        let mut handled = 0;
        self.for_each_connection(|conn| loop {
            match conn.peer.try_recv() {
                Ok(Some(event)) => {
                    handled += 1;
                    let events = conn.tails.apply(event, &self.log);
                    if !conn.send_all(&events) {
                        return false;
                    }
                }
                Ok(None) => return true,
                Err(TailError::ChannelClosed) => return false,
                Err(e) => warn!(connection = conn.id, error = %e, "bad client frame"),
            }
        });
        handled
    }

    /// Answer an API request against the log.
    pub fn handle_request(&self, request: &ApiRequest) -> Result<Value> {
        api::handle_request(&self.log, request)
    }

    /// Run `f` on each connection, dropping those for which it returns false.
    fn for_each_connection<F>(&self, mut f: F)
    where
        F: FnMut(&Connection) -> bool,
    {
        let mut dead = Vec::new();
        {
            let connections = self.connections.read();
            for conn in connections.iter() {
                if !f(conn) {
                    dead.push(conn.id);
                }
            }
        }

        if !dead.is_empty() {
            debug!(connections = ?dead, "dropping disconnected clients");
            self.connections.write().retain(|c| !dead.contains(&c.id));
        }
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}
