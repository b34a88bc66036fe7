#[cfg(test)]
mod tests {
    use crate::config::*;
    use crate::conversation::*;
    use crate::error::*;
    use crate::event::*;
    use crate::message::*;
    use crate::wire::*;

    // ─── Message Tests ───────────────────────────────────────

    #[test]
    fn test_message_user_is_complete() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello");
        assert_eq!(msg.status, MessageStatus::Complete);
    }

    #[test]
    fn test_pending_assistant_is_empty() {
        let msg = Message::pending_assistant();
        assert_eq!(msg.role, Role::Assistant);
        assert!(msg.content.is_empty());
        assert_eq!(msg.status, MessageStatus::Pending);
        assert!(!msg.is_final());
    }

    #[test]
    fn test_message_ids_are_unique() {
        let a = Message::user("a");
        let b = Message::user("a");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_append_moves_to_streaming() {
        let mut msg = Message::pending_assistant();
        assert!(msg.append("Hel"));
        assert!(msg.append("lo"));
        assert_eq!(msg.content, "Hello");
        assert_eq!(msg.status, MessageStatus::Streaming);
    }

    #[test]
    fn test_final_message_is_immutable() {
        let mut msg = Message::pending_assistant();
        msg.append("partial");
        assert!(msg.complete());

        assert!(!msg.append(" more"));
        assert!(!msg.fail(Some("boom".to_string())));
        assert!(!msg.complete());
        assert_eq!(msg.content, "partial");
        assert_eq!(msg.status, MessageStatus::Complete);
    }

    #[test]
    fn test_fail_replaces_content_when_given() {
        let mut msg = Message::pending_assistant();
        msg.append("partial");
        assert!(msg.fail(Some("quota exceeded".to_string())));
        assert_eq!(msg.content, "quota exceeded");
        assert_eq!(msg.status, MessageStatus::Error);
    }

    #[test]
    fn test_fail_keeps_content_when_none() {
        let mut msg = Message::pending_assistant();
        msg.append("partial");
        assert!(msg.fail(None));
        assert_eq!(msg.content, "partial");
        assert_eq!(msg.status, MessageStatus::Error);
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&MessageStatus::Streaming).unwrap();
        assert_eq!(json, r#""streaming""#);
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, r#""assistant""#);
    }

    // ─── Conversation Tests ──────────────────────────────────

    #[test]
    fn test_conversation_new() {
        let conv = Conversation::new("New Chat");
        assert_eq!(conv.title, "New Chat");
        assert!(!conv.starred);
        assert!(conv.messages.is_empty());
        assert_eq!(conv.created_at, conv.updated_at);
    }

    #[test]
    fn test_conversation_touch_never_goes_backwards() {
        let mut conv = Conversation::new("t");
        let before = conv.updated_at;
        conv.touch();
        assert!(conv.updated_at >= before);
    }

    #[test]
    fn test_conversation_id_parse() {
        let id = ConversationId::new();
        let parsed: ConversationId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_conversation_id_parse_invalid() {
        let err = "not-a-uuid".parse::<ConversationId>().unwrap_err();
        assert!(matches!(err, ChatError::InvalidId(_)));
    }

    #[test]
    fn test_last_message_preview_skips_empty() {
        let mut conv = Conversation::new("t");
        conv.messages.push(Message::user("first question"));
        conv.messages.push(Message::pending_assistant());
        assert_eq!(conv.last_message_preview().as_deref(), Some("first question"));
    }

    #[test]
    fn test_last_message_preview_truncates() {
        let mut conv = Conversation::new("t");
        conv.messages.push(Message::user("x".repeat(200)));
        let preview = conv.last_message_preview().unwrap();
        assert_eq!(preview.chars().count(), 81);
        assert!(preview.ends_with('…'));
    }

    #[test]
    fn test_summary_matches_title_and_preview() {
        let mut conv = Conversation::new("Rust lifetimes");
        conv.messages.push(Message::user("What is a borrow checker?"));
        let summary = conv.summary();

        assert!(summary.matches("rust"));
        assert!(summary.matches("BORROW"));
        assert!(summary.matches("   "));
        assert!(!summary.matches("python"));
    }

    // ─── Event Tests ─────────────────────────────────────────

    #[test]
    fn test_chat_event_serialization() {
        let event = ChatEvent::StreamFinished {
            conversation_id: ConversationId::new(),
            message_id: MessageId::new(),
            reason: FinishReason::ServerError("quota exceeded".to_string()),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"StreamFinished""#));
        assert!(json.contains("quota exceeded"));
    }

    #[test]
    fn test_finish_reason_is_error() {
        assert!(FinishReason::ServerError("x".to_string()).is_error());
        assert!(FinishReason::TransportFailure("x".to_string()).is_error());
        assert!(!FinishReason::Completed.is_error());
        assert!(!FinishReason::Cancelled.is_error());
        assert!(!FinishReason::Superseded.is_error());
    }

    // ─── Wire Tests ──────────────────────────────────────────

    #[test]
    fn test_request_body_without_context() {
        let body = CompletionRequest::new("hi", None);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "messages": [{ "role": "user", "content": "hi" }],
                "usingContext": false,
            })
        );
    }

    #[test]
    fn test_request_body_with_history() {
        let history = vec![WireMessage::from(&Message::assistant("welcome"))];
        let body = CompletionRequest::new("hi", Some(history));
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["usingContext"], true);
        assert_eq!(json["history"][0]["role"], "assistant");
        assert_eq!(json["history"][0]["content"], "welcome");
    }

    // ─── Config Tests ────────────────────────────────────────

    #[test]
    fn test_default_config() {
        let config = ChatConfig::default();
        assert_eq!(config.api_base, "/api");
        assert_eq!(config.stream_endpoint, "/ai/chat/stream");
        assert!(!config.using_context);
        assert!(!config.welcome_message.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_partial_json() {
        let config = ChatConfig::from_json(r#"{"using_context": true}"#).unwrap();
        assert!(config.using_context);
        assert_eq!(config.stream_endpoint, "/ai/chat/stream");
    }

    #[test]
    fn test_config_rejects_bad_endpoint() {
        let err = ChatConfig::from_json(r#"{"stream_endpoint": "ai/chat"}"#).unwrap_err();
        assert!(matches!(err, ChatError::Config(_)));
    }

    #[test]
    fn test_config_rejects_trailing_slash() {
        let err = ChatConfig::from_json(r#"{"api_base": "https://host/"}"#).unwrap_err();
        assert!(matches!(err, ChatError::Config(_)));
    }

    // ─── Error Tests ─────────────────────────────────────────

    #[test]
    fn test_error_display() {
        let err = ChatError::Http { status: 502, body: "bad gateway".to_string() };
        assert_eq!(err.to_string(), "HTTP 502: bad gateway");

        let err = ChatError::Cancelled;
        assert_eq!(err.to_string(), "Cancelled");

        let err = ChatError::InvalidTitle;
        assert_eq!(err.to_string(), "Title must not be empty");
    }

    #[test]
    fn test_error_from_serde() {
        let serde_err = serde_json::from_str::<serde_json::Value>("{{invalid}}").unwrap_err();
        let chat_err: ChatError = serde_err.into();
        assert!(matches!(chat_err, ChatError::Serialization(_)));
    }
}
