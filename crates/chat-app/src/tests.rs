#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use async_trait::async_trait;
    use futures::executor::block_on;

    use crate::ChatSession;
    use chat_core::cancel::CancelSignal;
    use chat_core::ports::{ChunkStream, TransportPort};
    use chat_types::config::ChatConfig;
    use chat_types::conversation::{Conversation, ConversationSummary};
    use chat_types::event::{ChatEvent, FinishReason};
    use chat_types::message::MessageStatus;
    use chat_types::wire::CompletionRequest;
    use chat_types::ChatError;

    struct CannedReply(Vec<&'static str>);

    #[async_trait(?Send)]
    impl TransportPort for CannedReply {
        async fn open(
            &self,
            _endpoint: &str,
            _body: &CompletionRequest,
            _cancel: CancelSignal,
        ) -> chat_types::Result<ChunkStream> {
            let chunks: Vec<chat_types::Result<String>> =
                self.0.iter().map(|c| Ok(c.to_string())).collect();
            Ok(Box::pin(futures::stream::iter(chunks)))
        }

        fn transport_name(&self) -> &str {
            "canned"
        }
    }

    fn session(chunks: Vec<&'static str>) -> ChatSession {
        ChatSession::new(ChatConfig::default(), Rc::new(CannedReply(chunks)))
    }

    #[test]
    fn test_new_chat_becomes_active() {
        let session = session(vec![]);
        let id = session.new_chat();
        assert_eq!(session.active_id(), Some(id.clone()));

        let conversation: Conversation =
            serde_json::from_str(&session.conversation_json(&id).unwrap()).unwrap();
        assert_eq!(conversation.title, "New Chat");
        assert_eq!(conversation.messages.len(), 1);
    }

    #[test]
    fn test_send_and_drive_reply() {
        let session = session(vec![
            "data: {\"content\":\"Hi \"}\n\n",
            "data: {\"content\":\"there\"}\n\ndata: [DONE]\n\n",
        ]);
        let id = session.new_chat();
        let handle = session.begin_send(&id, "hello").unwrap();
        assert!(session.is_streaming(&id).unwrap());

        let reason = block_on(session.controller().drive(&handle)).unwrap();
        assert_eq!(reason, FinishReason::Completed);
        assert!(!session.is_streaming(&id).unwrap());

        let conversation: Conversation =
            serde_json::from_str(&session.conversation_json(&id).unwrap()).unwrap();
        let reply = conversation.messages.last().unwrap();
        assert_eq!(reply.content, "Hi there");
        assert_eq!(reply.status, MessageStatus::Complete);
    }

    #[test]
    fn test_cancel_before_drive() {
        let session = session(vec!["data: {\"content\":\"late\"}\n\n"]);
        let id = session.new_chat();
        let handle = session.begin_send(&id, "hello").unwrap();

        assert!(session.cancel(&id).unwrap());
        assert!(!session.cancel(&id).unwrap());
        assert_eq!(
            block_on(session.controller().drive(&handle)).unwrap(),
            FinishReason::Cancelled
        );

        let conversation: Conversation =
            serde_json::from_str(&session.conversation_json(&id).unwrap()).unwrap();
        assert_eq!(
            conversation.messages.last().unwrap().content,
            "Request cancelled"
        );
    }

    #[test]
    fn test_delete_and_clear_stop_streams() {
        let session = session(vec![]);
        let first = session.new_chat();
        let second = session.new_chat();
        let deleted = session.begin_send(&first, "one").unwrap();
        let cleared = session.begin_send(&second, "two").unwrap();

        session.delete_chat(&first).unwrap();
        assert!(!session.is_streaming(&first).unwrap());
        assert_eq!(deleted.outcome(), Some(FinishReason::Cancelled));
        assert!(session.is_streaming(&second).unwrap());

        session.clear_all();
        assert!(!session.is_streaming(&second).unwrap());
        assert_eq!(cleared.outcome(), Some(FinishReason::Cancelled));
    }

    #[test]
    fn test_invalid_id_is_rejected() {
        let session = session(vec![]);
        assert!(matches!(
            session.begin_send("not-a-uuid", "hi"),
            Err(ChatError::InvalidId(_))
        ));
        assert!(matches!(
            session.rename("nope", "x"),
            Err(ChatError::InvalidId(_))
        ));
    }

    #[test]
    fn test_unknown_conversation() {
        let session = session(vec![]);
        let id = session.new_chat();
        session.delete_chat(&id).unwrap();
        assert!(matches!(
            session.conversation_json(&id),
            Err(ChatError::ConversationNotFound(_))
        ));
        assert!(matches!(
            session.begin_send(&id, "hi"),
            Err(ChatError::ConversationNotFound(_))
        ));
        assert_eq!(session.active_id(), None);
    }

    #[test]
    fn test_summaries_search_and_rename() {
        let session = session(vec![]);
        let first = session.new_chat();
        let _second = session.new_chat();
        session.rename(&first, "  Rust lifetimes ").unwrap();
        assert!(session.toggle_star(&first).unwrap());

        let all: Vec<ConversationSummary> =
            serde_json::from_str(&session.summaries_json(None).unwrap()).unwrap();
        assert_eq!(all.len(), 2);

        let hits: Vec<ConversationSummary> =
            serde_json::from_str(&session.summaries_json(Some("LIFETIMES")).unwrap()).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Rust lifetimes");
        assert!(hits[0].starred);
    }

    #[test]
    fn test_drain_events_json() {
        let session = session(vec![]);
        let id = session.new_chat();
        let events: Vec<ChatEvent> =
            serde_json::from_str(&session.drain_events_json().unwrap()).unwrap();
        assert!(events.iter().any(|e| matches!(
            e,
            ChatEvent::ConversationCreated { conversation_id } if conversation_id.to_string() == id
        )));
        assert_eq!(session.drain_events_json().unwrap(), "[]");
    }

    #[test]
    fn test_using_context_toggle() {
        let mut session = session(vec![]);
        assert!(!session.using_context());
        session.set_using_context(true);
        assert!(session.using_context());
    }

    #[test]
    fn test_clear_all_and_export() {
        let session = session(vec![]);
        let id = session.new_chat();
        let exported = session.export_json(&id).unwrap();
        assert!(exported.contains("New Chat"));

        session.clear_all();
        assert!(session.export_json(&id).is_err());
        assert_eq!(session.summaries_json(None).unwrap(), "[]");
    }
}
