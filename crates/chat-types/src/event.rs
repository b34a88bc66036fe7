use serde::{Deserialize, Serialize};

use crate::conversation::ConversationId;
use crate::message::MessageId;

/// Change notifications emitted by the store and the stream controller.
/// The presentation layer drains these and re-renders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ChatEvent {
    ConversationCreated { conversation_id: ConversationId },

    /// Title or star changed
    ConversationUpdated { conversation_id: ConversationId },

    ConversationDeleted { conversation_id: ConversationId },

    /// Every conversation was removed
    Cleared,

    ActiveChanged { conversation_id: Option<ConversationId> },

    MessagesAppended {
        conversation_id: ConversationId,
        message_ids: Vec<MessageId>,
    },

    MessageUpdated {
        conversation_id: ConversationId,
        message_id: MessageId,
    },

    StreamStarted {
        conversation_id: ConversationId,
        message_id: MessageId,
    },

    StreamFinished {
        conversation_id: ConversationId,
        message_id: MessageId,
        reason: FinishReason,
    },
}

/// Why a stream handle was retired
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message")]
pub enum FinishReason {
    /// `[DONE]` received, or the body ended cleanly
    Completed,
    /// The server sent an error frame
    ServerError(String),
    /// The request failed below the protocol layer
    TransportFailure(String),
    /// The user stopped the stream
    Cancelled,
    /// A newer send on the same conversation replaced this stream
    Superseded,
}

impl FinishReason {
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            FinishReason::ServerError(_) | FinishReason::TransportFailure(_)
        )
    }
}
