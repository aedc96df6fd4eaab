//! UI-agnostic chat data types
//!
//! Shared by the session core and any front end. Nothing here depends on a
//! terminal or a network client.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Backend handle for a conversation thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub i64);

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque message identity. Backend ids are their integer rendered as a
/// string; optimistic ids are generated locally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Time-based id for an optimistic message.
    ///
    /// Two messages created in the same millisecond (a user message and a
    /// fast reply) still get distinct ids thanks to the process-wide counter.
    pub fn local() -> Self {
        static SEQ: AtomicU64 = AtomicU64::new(0);
        let seq = SEQ.fetch_add(1, Ordering::Relaxed);
        let millis = chrono::Utc::now().timestamp_millis();
        MessageId(format!("local-{millis}-{seq}"))
    }
}

impl From<i64> for MessageId {
    fn from(id: i64) -> Self {
        MessageId(id.to_string())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A chat message, either confirmed by the backend or added optimistically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub content: String,
    pub role: Role,
    /// RFC 3339 timestamp. Display only; ordering is by position.
    pub timestamp: String,
}

impl Message {
    /// New message with a local id stamped with the current time.
    pub fn new_local(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::local(),
            content: content.into(),
            role,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// An optimistic message waiting for the backend to confirm it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalMessage {
    pub message: Message,
    /// Monotonic per-session insertion number, used to decide which local
    /// messages a refetch supersedes.
    pub seq: u64,
    /// Backend id for this message, when the chat reply reported it.
    pub confirmed_as: Option<MessageId>,
}
