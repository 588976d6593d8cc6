//! # Message Tailing
//!
//! Client-side tailing of an ordered, append-only message stream.
//!
//! ## Core Concepts
//!
//! - **Channel**: persistent bidirectional event transport; carries live pushes
//! - **Requestor**: single-shot request/response; carries history pages
//! - **Forward tail**: live delivery plus catch-up from a cursor, flow-controlled
//!   by a window that only grows
//! - **Reverse tail**: backward, page-at-a-time scrollback with at most one
//!   request in flight
//!
//! Both tail kinds deliver batches in ascending stream order.
//!
//! ## Example
//!
//! ```ignore
//! use msgtail::{LocalRequestor, MessageModel, Notice, Server};
//! use std::sync::Arc;
//!
//! let server = Arc::new(Server::new());
//! let channel = Arc::new(server.connect());
//! let model = MessageModel::new(channel.clone(), Arc::new(LocalRequestor::new(server.clone())));
//!
//! // Scrollback: last 20 messages, oldest first
//! let history = model.new_reverse_tail(None, Box::new(|page| println!("{:?}", page?)));
//! history.expand_to(20);
//!
//! // Live: everything after message 100
//! let live = model.new_tail(Some(100.into()), Box::new(|batch| println!("{:?}", batch)))?;
//! live.expand_to(50)?;
//! server.serve_pending();
//! channel.pump()?;
//! ```

pub mod channel;
pub mod error;
pub mod model;
pub mod requestor;
pub mod server;
pub mod tail;
pub mod types;

// Re-exports
pub use channel::{
    Channel, ChannelPeer, ClientEvent, EventKind, Listener, ListenerId, LocalChannel,
    ServerEvent, TailIdAllocator,
};
pub use error::{Result, TailError};
pub use model::{MessageModel, ModelConfig};
pub use requestor::{ApiRequest, Completion, HttpRequestor, LocalRequestor, Method, Requestor};
pub use server::{MessageLog, Server, TailRegistry};
pub use tail::{
    ForwardTail, ForwardTailState, ReversePhase, ReverseTail, ReverseTailState, TailCallback,
};
pub use types::*;
