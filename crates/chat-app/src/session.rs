//! Rust-side facade over store + controller.
//!
//! Everything the JavaScript bindings expose goes through here, keyed by
//! string ids and returning JSON, so it can be exercised without a browser.

use std::rc::Rc;

use serde::Serialize;

use chat_core::controller::{SendRequest, StreamController, StreamHandle};
use chat_core::event_bus::EventBus;
use chat_core::ports::TransportPort;
use chat_core::store::ChatStore;
use chat_types::config::ChatConfig;
use chat_types::conversation::ConversationId;
use chat_types::Result;

#[derive(Clone)]
pub struct ChatSession {
    store: ChatStore,
    controller: StreamController,
    using_context: bool,
}

impl ChatSession {
    pub fn new(config: ChatConfig, transport: Rc<dyn TransportPort>) -> Self {
        let using_context = config.using_context;
        let store = ChatStore::new(config, EventBus::new());
        let controller = StreamController::new(store.clone(), transport);
        Self {
            store,
            controller,
            using_context,
        }
    }

    pub fn store(&self) -> &ChatStore {
        &self.store
    }

    pub fn controller(&self) -> &StreamController {
        &self.controller
    }

    pub fn using_context(&self) -> bool {
        self.using_context
    }

    pub fn set_using_context(&mut self, enabled: bool) {
        self.using_context = enabled;
    }

    pub fn new_chat(&self) -> String {
        self.store.create_conversation().to_string()
    }

    /// Register a reply stream on `conversation`. The caller drives it.
    pub fn begin_send(&self, conversation: &str, text: &str) -> Result<StreamHandle> {
        let id = parse_id(conversation)?;
        self.controller
            .start_stream(id, SendRequest::new(text, self.using_context))
    }

    pub fn cancel(&self, conversation: &str) -> Result<bool> {
        Ok(self.controller.cancel_conversation(parse_id(conversation)?))
    }

    pub fn is_streaming(&self, conversation: &str) -> Result<bool> {
        Ok(self.controller.is_streaming(parse_id(conversation)?))
    }

    pub fn delete_chat(&self, conversation: &str) -> Result<()> {
        self.store.delete_conversation(parse_id(conversation)?)
    }

    pub fn toggle_star(&self, conversation: &str) -> Result<bool> {
        self.store.toggle_star(parse_id(conversation)?)
    }

    pub fn rename(&self, conversation: &str, title: &str) -> Result<()> {
        self.store.rename(parse_id(conversation)?, title)
    }

    pub fn select(&self, conversation: &str) -> Result<()> {
        self.store.select(parse_id(conversation)?)
    }

    pub fn active_id(&self) -> Option<String> {
        self.store.active_id().map(|id| id.to_string())
    }

    pub fn clear_all(&self) {
        self.store.clear_all();
    }

    pub fn summaries_json(&self, query: Option<&str>) -> Result<String> {
        let summaries = match query {
            Some(q) => self.store.search(q),
            None => self.store.summaries(),
        };
        to_json(&summaries)
    }

    pub fn conversation_json(&self, conversation: &str) -> Result<String> {
        let id = parse_id(conversation)?;
        match self.store.conversation(id) {
            Some(c) => to_json(&c),
            None => Err(chat_types::ChatError::ConversationNotFound(id.to_string())),
        }
    }

    pub fn export_json(&self, conversation: &str) -> Result<String> {
        self.store.export_json(parse_id(conversation)?)
    }

    pub fn drain_events_json(&self) -> Result<String> {
        to_json(&self.store.bus().drain())
    }
}

fn parse_id(raw: &str) -> Result<ConversationId> {
    raw.parse()
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}
