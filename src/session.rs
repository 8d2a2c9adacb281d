//! Conversation sessions
//!
//! A session holds the bounded message history plus the current voice and
//! language. Sessions outlive the managed streams that feed them, and are
//! touched from the audio path, the per-turn workers and the consumer, so all
//! access goes through an internal read-write lock. Reads hand out clones;
//! the internal storage is never exposed.

use std::sync::RwLock;
use uuid::Uuid;

use crate::types::{Language, Message, Role, Voice};

/// A conversation session: bounded history + voice/language selection
pub struct ConversationSession {
    pub id: String,
    inner: RwLock<SessionState>,
}

struct SessionState {
    context: Vec<Message>,
    last_user: String,
    last_assistant: String,
    max_messages: usize,
    voice: Voice,
    language: Language,
}

impl ConversationSession {
    /// Create a session with default bounds (20 messages, F1, English)
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            id: user_id.into(),
            inner: RwLock::new(SessionState {
                context: Vec::new(),
                last_user: String::new(),
                last_assistant: String::new(),
                max_messages: 20,
                voice: Voice::F1,
                language: Language::En,
            }),
        }
    }

    /// Create a session with a generated unique id
    pub fn with_generated_id() -> Self {
        Self::new(format!("conv_{}", Uuid::new_v4().simple()))
    }

    /// Append a message, evicting the oldest beyond the history cap
    pub fn add_message(&self, role: Role, content: impl Into<String>) {
        let content = content.into();
        let mut state = self.inner.write().unwrap();
        match role {
            Role::User => state.last_user = content.clone(),
            Role::Assistant => state.last_assistant = content.clone(),
            Role::System => {}
        }
        state.context.push(Message::new(role, content));
        let max = state.max_messages;
        if state.context.len() > max {
            let excess = state.context.len() - max;
            state.context.drain(..excess);
        }
    }

    /// Clear the conversation history, preserving system messages so the
    /// assistant's instructions survive a topic reset. Voice and language
    /// settings are untouched. Use [`reset`](Self::reset) for a full wipe.
    pub fn clear_context(&self) {
        let mut state = self.inner.write().unwrap();
        state.context.retain(|m| m.role == Role::System);
        state.last_user.clear();
        state.last_assistant.clear();
    }

    /// Clear everything including system messages, and restore the default
    /// voice and language.
    pub fn reset(&self) {
        let mut state = self.inner.write().unwrap();
        state.context.clear();
        state.last_user.clear();
        state.last_assistant.clear();
        state.voice = Voice::F1;
        state.language = Language::En;
    }

    /// Snapshot of the current history, oldest first
    pub fn context_copy(&self) -> Vec<Message> {
        self.inner.read().unwrap().context.clone()
    }

    pub fn context_len(&self) -> usize {
        self.inner.read().unwrap().context.len()
    }

    pub fn last_user(&self) -> String {
        self.inner.read().unwrap().last_user.clone()
    }

    pub fn last_assistant(&self) -> String {
        self.inner.read().unwrap().last_assistant.clone()
    }

    pub fn voice(&self) -> Voice {
        self.inner.read().unwrap().voice
    }

    pub fn set_voice(&self, voice: Voice) {
        self.inner.write().unwrap().voice = voice;
    }

    pub fn language(&self) -> Language {
        self.inner.read().unwrap().language
    }

    pub fn set_language(&self, language: Language) {
        self.inner.write().unwrap().language = language;
    }

    pub fn max_messages(&self) -> usize {
        self.inner.read().unwrap().max_messages
    }

    pub fn set_max_messages(&self, max: usize) {
        self.inner.write().unwrap().max_messages = max.max(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_message_updates_last_fields() {
        let session = ConversationSession::new("u1");
        session.add_message(Role::User, "hi");
        session.add_message(Role::Assistant, "hello");
        assert_eq!(session.last_user(), "hi");
        assert_eq!(session.last_assistant(), "hello");
        assert_eq!(session.context_len(), 2);
    }

    #[test]
    fn test_history_is_bounded() {
        let session = ConversationSession::new("u2");
        session.set_max_messages(4);
        for i in 0..10 {
            session.add_message(Role::User, format!("m{}", i));
        }
        let ctx = session.context_copy();
        assert_eq!(ctx.len(), 4);
        assert_eq!(ctx[0].content, "m6");
        assert_eq!(ctx[3].content, "m9");
    }

    #[test]
    fn test_context_copy_returns_exact_order() {
        let session = ConversationSession::new("u3");
        session.add_message(Role::User, "one");
        session.add_message(Role::Assistant, "two");
        session.add_message(Role::User, "three");
        let ctx = session.context_copy();
        let contents: Vec<&str> = ctx.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_clear_context_keeps_system_messages() {
        let session = ConversationSession::new("u4");
        session.add_message(Role::System, "be brief");
        session.add_message(Role::User, "hi");
        session.add_message(Role::Assistant, "hello");
        session.set_voice(Voice::M2);
        session.clear_context();
        let ctx = session.context_copy();
        assert_eq!(ctx.len(), 1);
        assert_eq!(ctx[0].role, Role::System);
        assert_eq!(session.last_user(), "");
        assert_eq!(session.voice(), Voice::M2);
    }

    #[test]
    fn test_reset_wipes_everything() {
        let session = ConversationSession::new("u5");
        session.add_message(Role::System, "be brief");
        session.set_voice(Voice::M5);
        session.set_language(Language::Ja);
        session.reset();
        assert_eq!(session.context_len(), 0);
        assert_eq!(session.voice(), Voice::F1);
        assert_eq!(session.language(), Language::En);
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = ConversationSession::with_generated_id();
        let b = ConversationSession::with_generated_id();
        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("conv_"));
    }
}
