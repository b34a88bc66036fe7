use serde::{Deserialize, Serialize};

use crate::error::ChatError;
use crate::Result;

/// Client configuration. Every field has a default, so partial JSON works.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Prefix for every request URL, e.g. `/api` or `https://host/api`
    pub api_base: String,
    pub stream_endpoint: String,
    /// Send prior history with each new message
    pub using_context: bool,
    pub new_chat_title: String,
    /// Seeded as the first assistant message of every new conversation
    pub welcome_message: String,
    /// Shown when the user cancels before any content arrived
    pub cancel_notice: String,
    /// Shown when the request fails below the protocol layer
    pub failure_notice: String,
    /// Used when an error frame carries no message
    pub server_error_notice: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_base: "/api".to_string(),
            stream_endpoint: "/ai/chat/stream".to_string(),
            using_context: false,
            new_chat_title: "New Chat".to_string(),
            welcome_message: DEFAULT_WELCOME_MESSAGE.to_string(),
            cancel_notice: "Request cancelled".to_string(),
            failure_notice: "Connection error, please try again".to_string(),
            server_error_notice: "The server reported an error".to_string(),
        }
    }
}

impl ChatConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ChatConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.stream_endpoint.starts_with('/') {
            return Err(ChatError::Config(format!(
                "stream_endpoint must start with '/': {}",
                self.stream_endpoint
            )));
        }
        if self.api_base.ends_with('/') {
            return Err(ChatError::Config(format!(
                "api_base must not end with '/': {}",
                self.api_base
            )));
        }
        if self.new_chat_title.trim().is_empty() {
            return Err(ChatError::Config("new_chat_title is empty".to_string()));
        }
        Ok(())
    }
}

const DEFAULT_WELCOME_MESSAGE: &str =
    "Hi! I'm your assistant. Ask me anything and I'll answer as the reply streams in.";
