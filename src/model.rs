//! Client-side entry point tying a channel and a requestor together.

use crate::channel::{Channel, EventKind, Listener, ListenerId};
use crate::error::Result;
use crate::requestor::{ApiRequest, Completion, Requestor};
use crate::tail::{ForwardTail, ReverseTail, TailCallback};
use crate::types::{compare_messages, Message, MessageId};
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

/// Client configuration.
#[derive(Clone, Debug)]
pub struct ModelConfig {
    /// Prefix for every API request path.
    pub api_root: String,

    /// Per-request timeout for HTTP requests.
    /// Default: 30s
    pub request_timeout: Duration,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_root: "http://localhost:8080/api".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Opens tails against one server connection.
///
/// Forward tails share the model's channel; reverse tails share its
/// requestor.
#[derive(Clone)]
pub struct MessageModel {
    channel: Arc<dyn Channel>,
    requestor: Arc<dyn Requestor>,
}

impl MessageModel {
    pub fn new(channel: Arc<dyn Channel>, requestor: Arc<dyn Requestor>) -> Self {
        Self { channel, requestor }
    }

    pub fn channel(&self) -> &Arc<dyn Channel> {
        &self.channel
    }

    /// Issue an API request through the model's requestor.
    pub fn request(&self, request: ApiRequest, on_complete: Completion) {
        self.requestor.request(request, on_complete);
    }

    /// Forward tail delivering messages after `start`.
    pub fn new_tail(&self, start: Option<MessageId>, callback: TailCallback) -> Result<ForwardTail> {
        ForwardTail::open(Arc::clone(&self.channel), start, false, callback)
    }

    /// Forward tail whose first delivery includes `start` itself.
    pub fn new_tail_inclusive(
        &self,
        start: Option<MessageId>,
        callback: TailCallback,
    ) -> Result<ForwardTail> {
        ForwardTail::open(Arc::clone(&self.channel), start, true, callback)
    }

    /// Reverse tail paging back from `start` (`None` = from the newest).
    pub fn new_reverse_tail(&self, start: Option<MessageId>, callback: TailCallback) -> ReverseTail {
        ReverseTail::new(Arc::clone(&self.requestor), start, callback)
    }

    /// Listen for every live message broadcast on the channel.
    pub fn on_message(&self, listener: Listener) -> ListenerId {
        self.channel.on(EventKind::Message, listener)
    }

    pub fn remove_message_listener(&self, id: ListenerId) -> bool {
        self.channel.remove_listener(EventKind::Message, id)
    }

    /// Client-side ordering of two messages. Not authoritative.
    pub fn compare_messages(&self, a: &Message, b: &Message) -> Ordering {
        compare_messages(a, b)
    }
}
