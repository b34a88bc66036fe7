//! Chat App — WASM entry point.
//!
//! This crate is the composition root (DI wiring layer).
//! It assembles the fetch transport, store and stream controller and
//! exposes them to JavaScript as a single `ChatClient`.

mod session;

#[cfg(test)]
mod tests;

pub use session::ChatSession;

use std::rc::Rc;

use wasm_bindgen::prelude::*;

use chat_platform::FetchTransport;
use chat_types::config::ChatConfig;
use chat_types::ChatError;

/// WASM entry point — runs once when the module is instantiated.
#[wasm_bindgen(start)]
pub fn start() {
    wasm_logger::init(wasm_logger::Config::default());
    log::info!("Chat client WASM starting...");
}

/// JavaScript-facing chat client. All ids cross the boundary as strings,
/// all structured data as JSON.
#[wasm_bindgen]
pub struct ChatClient {
    session: ChatSession,
}

#[wasm_bindgen]
impl ChatClient {
    /// Build a client from an optional JSON config; missing fields default.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<ChatClient, JsValue> {
        let config = match config_json {
            Some(json) => ChatConfig::from_json(&json).map_err(to_js)?,
            None => ChatConfig::default(),
        };
        let transport = Rc::new(FetchTransport::from_config(&config));
        log::info!("Chat client ready, endpoint {}", transport.url_for(&config.stream_endpoint));
        Ok(Self {
            session: ChatSession::new(config, transport),
        })
    }

    #[wasm_bindgen(js_name = newChat)]
    pub fn new_chat(&self) -> String {
        self.session.new_chat()
    }

    /// Send `text` on a conversation. The reply streams in the background;
    /// progress is observed through `drainEvents`.
    pub fn send(&self, conversation: &str, text: &str) -> Result<(), JsValue> {
        let handle = self.session.begin_send(conversation, text).map_err(to_js)?;
        let controller = self.session.controller().clone();
        wasm_bindgen_futures::spawn_local(async move {
            match controller.drive(&handle).await {
                Ok(reason) => log::debug!("{} finished: {:?}", handle.id(), reason),
                Err(e) => log::warn!("{} could not be driven: {}", handle.id(), e),
            }
        });
        Ok(())
    }

    pub fn cancel(&self, conversation: &str) -> Result<bool, JsValue> {
        self.session.cancel(conversation).map_err(to_js)
    }

    #[wasm_bindgen(js_name = isStreaming)]
    pub fn is_streaming(&self, conversation: &str) -> Result<bool, JsValue> {
        self.session.is_streaming(conversation).map_err(to_js)
    }

    #[wasm_bindgen(js_name = deleteChat)]
    pub fn delete_chat(&self, conversation: &str) -> Result<(), JsValue> {
        self.session.delete_chat(conversation).map_err(to_js)
    }

    #[wasm_bindgen(js_name = toggleStar)]
    pub fn toggle_star(&self, conversation: &str) -> Result<bool, JsValue> {
        self.session.toggle_star(conversation).map_err(to_js)
    }

    pub fn rename(&self, conversation: &str, title: &str) -> Result<(), JsValue> {
        self.session.rename(conversation, title).map_err(to_js)
    }

    pub fn select(&self, conversation: &str) -> Result<(), JsValue> {
        self.session.select(conversation).map_err(to_js)
    }

    #[wasm_bindgen(js_name = activeId)]
    pub fn active_id(&self) -> Option<String> {
        self.session.active_id()
    }

    #[wasm_bindgen(js_name = clearAll)]
    pub fn clear_all(&self) {
        self.session.clear_all();
    }

    #[wasm_bindgen(js_name = setUsingContext)]
    pub fn set_using_context(&mut self, enabled: bool) {
        self.session.set_using_context(enabled);
    }

    /// Sidebar rows as JSON, newest first, optionally filtered.
    pub fn summaries(&self, query: Option<String>) -> Result<String, JsValue> {
        self.session.summaries_json(query.as_deref()).map_err(to_js)
    }

    pub fn conversation(&self, conversation: &str) -> Result<String, JsValue> {
        self.session.conversation_json(conversation).map_err(to_js)
    }

    pub fn export(&self, conversation: &str) -> Result<String, JsValue> {
        self.session.export_json(conversation).map_err(to_js)
    }

    #[wasm_bindgen(js_name = drainEvents)]
    pub fn drain_events(&self) -> Result<String, JsValue> {
        self.session.drain_events_json().map_err(to_js)
    }
}

fn to_js(e: ChatError) -> JsValue {
    JsValue::from_str(&e.to_string())
}
