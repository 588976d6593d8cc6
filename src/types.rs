//! Core types shared by channels, requestors and tails.

use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Opaque cursor identifying a position in the message stream.
///
/// Servers may hand these out as JSON strings or integers; both decode to the
/// same token. Cursors are compared for equality only. Use
/// [`compare_messages`] when a client-side order is needed.
#[derive(Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(token: impl Into<String>) -> Self {
        MessageId(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for MessageId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(token) => MessageId(token),
            Raw::Number(n) => MessageId(n.to_string()),
        })
    }
}

impl From<u64> for MessageId {
    fn from(n: u64) -> Self {
        MessageId(n.to_string())
    }
}

impl From<&str> for MessageId {
    fn from(token: &str) -> Self {
        MessageId(token.to_string())
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId({})", self.0)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Milliseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        Timestamp(millis)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// Identifier multiplexing one forward tail on a channel.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TailId(pub u64);

impl fmt::Debug for TailId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TailId({})", self.0)
    }
}

impl fmt::Display for TailId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message payload as received from the bus.
///
/// None of these fields matter to the tail protocol.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Notice {
    pub class: String,
    pub instance: String,
    pub sender: String,
    pub recipient: String,
    pub realm: String,
    pub auth: bool,
    pub opcode: String,
    pub signature: String,
    pub body: String,
}

impl Notice {
    /// Notice on `class`/`instance` with the given body.
    pub fn new(class: impl Into<String>, instance: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            instance: instance.into(),
            body: body.into(),
            ..Default::default()
        }
    }
}

/// A single message in the stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Cursor of this message.
    pub id: MessageId,

    /// When the server received the message. Only meaningful for
    /// client-side relative ordering.
    #[serde(default)]
    pub receive_time: Timestamp,

    #[serde(flatten)]
    pub notice: Notice,
}

impl Message {
    pub fn new(id: impl Into<MessageId>, receive_time: Timestamp, notice: Notice) -> Self {
        Self {
            id: id.into(),
            receive_time,
            notice,
        }
    }
}

/// Orders messages by receive time.
///
/// Not authoritative: the server alone decides stream order. This exists for
/// views that need to compare two messages they already hold.
pub fn compare_messages(a: &Message, b: &Message) -> Ordering {
    a.receive_time.cmp(&b.receive_time)
}

/// One delivery to a tail callback, and the body of a page response.
///
/// Messages are always in ascending stream order, whichever direction the
/// tail runs.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    pub messages: Vec<Message>,

    /// No further messages are available in the tail's direction.
    pub is_done: bool,
}

impl Batch {
    pub fn new(messages: Vec<Message>, is_done: bool) -> Self {
        Self { messages, is_done }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Cursors in delivery order.
    pub fn ids(&self) -> Vec<MessageId> {
        self.messages.iter().map(|m| m.id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_id_accepts_number_or_string() {
        let from_number: MessageId = serde_json::from_value(json!(105)).unwrap();
        let from_string: MessageId = serde_json::from_value(json!("105")).unwrap();
        assert_eq!(from_number, from_string);
        assert_eq!(from_number, MessageId::from(105u64));
    }

    #[test]
    fn test_message_decodes_with_only_id() {
        let msg: Message = serde_json::from_value(json!({"id": 48})).unwrap();
        assert_eq!(msg.id, MessageId::from(48u64));
        assert_eq!(msg.receive_time, Timestamp(0));
        assert_eq!(msg.notice, Notice::default());
    }

    #[test]
    fn test_message_wire_shape_is_flat_camel_case() {
        let msg = Message::new(7u64, Timestamp(1_000), Notice::new("help", "rust", "hi"));
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["id"], "7");
        assert_eq!(value["receiveTime"], 1_000);
        assert_eq!(value["class"], "help");
        assert_eq!(value["body"], "hi");
    }

    #[test]
    fn test_compare_messages_uses_receive_time() {
        let early = Message::new(9u64, Timestamp(10), Notice::default());
        let late = Message::new(1u64, Timestamp(20), Notice::default());
        assert_eq!(compare_messages(&early, &late), Ordering::Less);
        assert_eq!(compare_messages(&late, &early), Ordering::Greater);
        assert_eq!(compare_messages(&early, &early), Ordering::Equal);
    }

    #[test]
    fn test_batch_page_decodes_is_done() {
        let batch: Batch = serde_json::from_value(json!({
            "messages": [{"id": 50}, {"id": 49}],
            "isDone": true
        }))
        .unwrap();
        assert!(batch.is_done);
        assert_eq!(batch.ids(), vec![MessageId::from(50u64), MessageId::from(49u64)]);
    }
}
