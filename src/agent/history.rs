//! Per-session conversation history
//!
//! Only user and assistant turns are kept across utterances. The model
//! expects strict alternation, so a turn with the same role as the previous
//! one replaces it.

use crate::llm::ChatMessage;

/// Alternating user/assistant turns for one session
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<ChatMessage>,
}

impl Conversation {
    #[must_use]
    pub const fn new() -> Self {
        Self { turns: Vec::new() }
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.push(ChatMessage::user(text));
    }

    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.push(ChatMessage::assistant(text));
    }

    fn push(&mut self, turn: ChatMessage) {
        match self.turns.last_mut() {
            Some(last) if last.role == turn.role => {
                tracing::debug!(role = ?turn.role, "coalescing consecutive turns");
                *last = turn;
            }
            _ => self.turns.push(turn),
        }
    }

    /// Transcript for the model: system prompt followed by the turns
    #[must_use]
    pub fn messages(&self, system_prompt: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.turns.len() + 1);
        messages.push(ChatMessage::system(system_prompt));
        messages.extend(self.turns.iter().cloned());
        messages
    }

    #[must_use]
    pub fn turns(&self) -> &[ChatMessage] {
        &self.turns
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;

    #[test]
    fn consecutive_same_role_turns_keep_the_last() {
        let mut conversation = Conversation::new();
        conversation.push_user("one idli");
        conversation.push_user("two idli");
        conversation.push_assistant("Added.");

        let turns = conversation.turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].content.as_deref(), Some("two idli"));
        assert_eq!(turns[1].role, Role::Assistant);
    }

    #[test]
    fn messages_start_with_system_prompt() {
        let mut conversation = Conversation::new();
        conversation.push_user("hello");

        let messages = conversation.messages("You are a waiter.");
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].role, Role::User);
    }

    #[test]
    fn clear_forgets_everything() {
        let mut conversation = Conversation::new();
        conversation.push_user("hello");
        conversation.clear();
        assert!(conversation.turns().is_empty());
    }
}
