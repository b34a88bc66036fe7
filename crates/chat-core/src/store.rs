//! Chat session store — every conversation and its message log.
//!
//! The store is the only mutator of conversations. It is single-threaded and
//! clone-cheap via Rc; the stream controller and the UI hold clones of the
//! same store. Every mutation is announced on the [`EventBus`].

use std::cell::RefCell;
use std::rc::Rc;

use chat_types::{
    ChatError, Result,
    config::ChatConfig,
    conversation::{Conversation, ConversationId, ConversationSummary},
    event::ChatEvent,
    message::{Message, MessageId, MessageStatus},
    wire::WireMessage,
};
use crate::event_bus::EventBus;

#[derive(Default)]
struct StoreState {
    /// Newest-created first. Display order is computed separately.
    conversations: Vec<Conversation>,
    active: Option<ConversationId>,
}

impl StoreState {
    fn get(&self, id: ConversationId) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    fn get_mut(&mut self, id: ConversationId) -> Result<&mut Conversation> {
        self.conversations
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| ChatError::ConversationNotFound(id.to_string()))
    }

    fn most_recent(&self) -> Option<ConversationId> {
        self.conversations
            .iter()
            .max_by_key(|c| c.updated_at)
            .map(|c| c.id)
    }
}

#[derive(Clone)]
pub struct ChatStore {
    state: Rc<RefCell<StoreState>>,
    bus: EventBus,
    config: Rc<ChatConfig>,
}

impl ChatStore {
    pub fn new(config: ChatConfig, bus: EventBus) -> Self {
        Self {
            state: Rc::new(RefCell::new(StoreState::default())),
            bus,
            config: Rc::new(config),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    // ─── Conversations ───────────────────────────────────────

    /// Start a new conversation seeded with the welcome message and make it
    /// the active one.
    pub fn create_conversation(&self) -> ConversationId {
        let mut conversation = Conversation::new(self.config.new_chat_title.clone());
        conversation
            .messages
            .push(Message::assistant(self.config.welcome_message.clone()));
        let id = conversation.id;

        {
            let mut state = self.state.borrow_mut();
            state.conversations.insert(0, conversation);
            state.active = Some(id);
        }

        log::debug!("Created conversation {}", id);
        self.bus.emit(ChatEvent::ConversationCreated { conversation_id: id });
        self.bus.emit(ChatEvent::ActiveChanged { conversation_id: Some(id) });
        id
    }

    /// Remove a conversation. If it was active, the most recently updated
    /// survivor becomes active (or none, if the store is now empty).
    pub fn delete_conversation(&self, id: ConversationId) -> Result<()> {
        let next_active = {
            let mut state = self.state.borrow_mut();
            let index = state
                .conversations
                .iter()
                .position(|c| c.id == id)
                .ok_or_else(|| ChatError::ConversationNotFound(id.to_string()))?;
            state.conversations.remove(index);

            if state.active == Some(id) {
                state.active = state.most_recent();
                Some(state.active)
            } else {
                None
            }
        };

        self.bus.emit(ChatEvent::ConversationDeleted { conversation_id: id });
        if let Some(active) = next_active {
            self.bus.emit(ChatEvent::ActiveChanged { conversation_id: active });
        }
        Ok(())
    }

    pub fn clear_all(&self) {
        {
            let mut state = self.state.borrow_mut();
            state.conversations.clear();
            state.active = None;
        }
        self.bus.emit(ChatEvent::Cleared);
        self.bus.emit(ChatEvent::ActiveChanged { conversation_id: None });
    }

    /// Flip the star flag. Returns the new value.
    pub fn toggle_star(&self, id: ConversationId) -> Result<bool> {
        let starred = {
            let mut state = self.state.borrow_mut();
            let conversation = state.get_mut(id)?;
            conversation.starred = !conversation.starred;
            conversation.touch();
            conversation.starred
        };
        self.bus.emit(ChatEvent::ConversationUpdated { conversation_id: id });
        Ok(starred)
    }

    /// Rename a conversation. The title is trimmed; blank titles are rejected.
    pub fn rename(&self, id: ConversationId, title: &str) -> Result<()> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ChatError::InvalidTitle);
        }
        {
            let mut state = self.state.borrow_mut();
            let conversation = state.get_mut(id)?;
            conversation.title = title.to_string();
            conversation.touch();
        }
        self.bus.emit(ChatEvent::ConversationUpdated { conversation_id: id });
        Ok(())
    }

    pub fn select(&self, id: ConversationId) -> Result<()> {
        {
            let mut state = self.state.borrow_mut();
            if state.get(id).is_none() {
                return Err(ChatError::ConversationNotFound(id.to_string()));
            }
            if state.active == Some(id) {
                return Ok(());
            }
            state.active = Some(id);
        }
        self.bus.emit(ChatEvent::ActiveChanged { conversation_id: Some(id) });
        Ok(())
    }

    pub fn active_id(&self) -> Option<ConversationId> {
        self.state.borrow().active
    }

    pub fn len(&self) -> usize {
        self.state.borrow().conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: ConversationId) -> bool {
        self.state.borrow().get(id).is_some()
    }

    /// Snapshot of one conversation.
    pub fn conversation(&self, id: ConversationId) -> Option<Conversation> {
        self.state.borrow().get(id).cloned()
    }

    /// Summaries, most recently updated first.
    pub fn summaries(&self) -> Vec<ConversationSummary> {
        let state = self.state.borrow();
        let mut summaries: Vec<ConversationSummary> =
            state.conversations.iter().map(Conversation::summary).collect();
        // Stable sort: ties keep newest-created first.
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries
    }

    /// Summaries whose title or last message contains `query`
    /// (case-insensitive). A blank query returns everything.
    pub fn search(&self, query: &str) -> Vec<ConversationSummary> {
        self.summaries()
            .into_iter()
            .filter(|s| s.matches(query))
            .collect()
    }

    /// Pretty JSON dump of one conversation, for the "export chat" action.
    pub fn export_json(&self, id: ConversationId) -> Result<String> {
        let state = self.state.borrow();
        let conversation = state
            .get(id)
            .ok_or_else(|| ChatError::ConversationNotFound(id.to_string()))?;
        Ok(serde_json::to_string_pretty(conversation)?)
    }

    // ─── Messages ────────────────────────────────────────────

    /// Append messages in one step and bump `updated_at`.
    pub fn append_messages(&self, id: ConversationId, messages: Vec<Message>) -> Result<()> {
        let message_ids: Vec<MessageId> = messages.iter().map(|m| m.id).collect();
        {
            let mut state = self.state.borrow_mut();
            let conversation = state.get_mut(id)?;
            conversation.messages.extend(messages);
            conversation.touch();
        }
        self.bus.emit(ChatEvent::MessagesAppended {
            conversation_id: id,
            message_ids,
        });
        Ok(())
    }

    /// Apply `mutation` to exactly one message. The mutation reports whether
    /// it changed anything; only then is `updated_at` bumped and
    /// `MessageUpdated` emitted. Returns `None` without doing anything when
    /// the conversation or message no longer exists.
    pub fn update_message(
        &self,
        id: ConversationId,
        message_id: MessageId,
        mutation: impl FnOnce(&mut Message) -> bool,
    ) -> Option<bool> {
        let changed = {
            let mut state = self.state.borrow_mut();
            let conversation = state.get_mut(id).ok()?;
            let message = conversation.message_mut(message_id)?;
            let changed = mutation(message);
            if changed {
                conversation.touch();
            }
            changed
        };
        if changed {
            self.bus.emit(ChatEvent::MessageUpdated {
                conversation_id: id,
                message_id,
            });
        }
        Some(changed)
    }

    pub fn message(&self, id: ConversationId, message_id: MessageId) -> Option<Message> {
        self.state
            .borrow()
            .get(id)
            .and_then(|c| c.message(message_id))
            .cloned()
    }

    /// Prior conversation as role/content pairs, for context inclusion.
    /// Only finished messages with text are included; failed replies and
    /// in-flight ones are left out.
    pub fn history(&self, id: ConversationId) -> Result<Vec<WireMessage>> {
        let state = self.state.borrow();
        let conversation = state
            .get(id)
            .ok_or_else(|| ChatError::ConversationNotFound(id.to_string()))?;
        Ok(conversation
            .messages
            .iter()
            .filter(|m| m.status == MessageStatus::Complete && !m.content.is_empty())
            .map(WireMessage::from)
            .collect())
    }
}
