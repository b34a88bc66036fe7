use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque message identifier, unique across all conversations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Lifecycle of a message.
///
/// `Pending` and `Streaming` are the only states in which content may grow.
/// `Complete` and `Error` are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Streaming,
    Complete,
    Error,
}

impl MessageStatus {
    pub fn is_final(&self) -> bool {
        matches!(self, MessageStatus::Complete | MessageStatus::Error)
    }
}

/// A single message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub status: MessageStatus,
}

impl Message {
    /// A message the user sent. Complete on creation.
    pub fn user(text: impl Into<String>) -> Self {
        Self::with_status(Role::User, text.into(), MessageStatus::Complete)
    }

    /// A finished assistant message (welcome text, imported history).
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::with_status(Role::Assistant, text.into(), MessageStatus::Complete)
    }

    /// An empty assistant reply waiting for its first token.
    pub fn pending_assistant() -> Self {
        Self::with_status(Role::Assistant, String::new(), MessageStatus::Pending)
    }

    fn with_status(role: Role, content: String, status: MessageStatus) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content,
            created_at: Utc::now(),
            status,
        }
    }

    pub fn is_final(&self) -> bool {
        self.status.is_final()
    }

    /// Append a streamed token. Returns `false` once the message is final.
    pub fn append(&mut self, text: &str) -> bool {
        if self.is_final() {
            return false;
        }
        self.content.push_str(text);
        self.status = MessageStatus::Streaming;
        true
    }

    /// Mark the message complete, keeping whatever content it has.
    pub fn complete(&mut self) -> bool {
        if self.is_final() {
            return false;
        }
        self.status = MessageStatus::Complete;
        true
    }

    /// Mark the message failed. `content` replaces the body when given.
    pub fn fail(&mut self, content: Option<String>) -> bool {
        if self.is_final() {
            return false;
        }
        if let Some(content) = content {
            self.content = content;
        }
        self.status = MessageStatus::Error;
        true
    }
}
