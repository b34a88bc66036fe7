//! Outbound request body for the streaming completion endpoint.

use serde::{Deserialize, Serialize};

use crate::message::{Message, Role};

/// A role/content pair as the server expects it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: Role,
    pub content: String,
}

impl From<&Message> for WireMessage {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role,
            content: msg.content.clone(),
        }
    }
}

/// `{ messages, usingContext, history? }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    pub messages: Vec<WireMessage>,
    pub using_context: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub history: Option<Vec<WireMessage>>,
}

impl CompletionRequest {
    /// Body for one user turn. `history` is only attached when context
    /// inclusion is on.
    pub fn new(text: impl Into<String>, history: Option<Vec<WireMessage>>) -> Self {
        Self {
            messages: vec![WireMessage {
                role: Role::User,
                content: text.into(),
            }],
            using_context: history.is_some(),
            history,
        }
    }
}
