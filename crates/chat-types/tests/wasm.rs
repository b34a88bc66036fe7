//! WASM-target tests for chat-types.
//!
//! Checks that ids, timestamps and serde behave under wasm32-unknown-unknown
//! (uuid and chrono pull their entropy and clock from JS there).
//! Run via `wasm-pack test --node`.
#![cfg(target_arch = "wasm32")]

use wasm_bindgen_test::*;

use chat_types::config::ChatConfig;
use chat_types::conversation::{Conversation, ConversationId};
use chat_types::message::{Message, MessageStatus};
use chat_types::wire::CompletionRequest;

#[wasm_bindgen_test]
fn ids_are_random_under_wasm() {
    assert_ne!(ConversationId::new(), ConversationId::new());
    assert_ne!(Message::user("a").id, Message::user("a").id);
}

#[wasm_bindgen_test]
fn clock_is_available() {
    let mut conv = Conversation::new("t");
    let before = conv.updated_at;
    conv.touch();
    assert!(conv.updated_at >= before);
    assert!(!conv.summary().subtitle.is_empty());
}

#[wasm_bindgen_test]
fn message_lifecycle() {
    let mut msg = Message::pending_assistant();
    msg.append("Hi");
    assert_eq!(msg.status, MessageStatus::Streaming);
    msg.complete();
    assert!(!msg.append("!"));
    assert_eq!(msg.content, "Hi");
}

#[wasm_bindgen_test]
fn request_body_shape() {
    let json = serde_json::to_string(&CompletionRequest::new("hi", None)).unwrap();
    assert_eq!(json, r#"{"messages":[{"role":"user","content":"hi"}],"usingContext":false}"#);
}

#[wasm_bindgen_test]
fn config_from_json() {
    let config = ChatConfig::from_json(r#"{"api_base":"https://chat.example.com/api"}"#).unwrap();
    assert_eq!(config.api_base, "https://chat.example.com/api");
}
