#[cfg(test)]
#[path = "conversation_test.rs"]
mod tests;

use serde_derive::Deserialize;
use serde_derive::Serialize;
use uuid::Uuid;

use super::Message;
use super::Role;
use super::GREETING;

pub const NEW_CHAT_TITLE: &str = "New Chat";

const TITLE_MAX_CHARS: usize = 30;
const TITLE_KEPT_CHARS: usize = 27;

/// Title for a conversation whose first user message is `text`. Counts
/// characters, not bytes.
pub fn derive_title(text: &str) -> String {
    if text.chars().count() > TITLE_MAX_CHARS {
        let kept = text.chars().take(TITLE_KEPT_CHARS).collect::<String>();
        return format!("{kept}...");
    }

    return text.to_string();
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
}

impl Default for Conversation {
    fn default() -> Conversation {
        return Conversation {
            id: Uuid::new_v4().to_string(),
            title: NEW_CHAT_TITLE.to_string(),
            messages: vec![Message::new(Role::Model, GREETING)],
        };
    }
}

impl Conversation {
    pub fn message(&self, id: &str) -> Option<&Message> {
        return self.messages.iter().find(|message| return message.id == id);
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Swaps in `message` at the position of the entry sharing its id. Returns
    /// false when no such entry exists.
    pub fn replace_message(&mut self, message: Message) -> bool {
        if let Some(entry) = self.messages.iter_mut().find(|e| return e.id == message.id) {
            *entry = message;
            return true;
        }

        return false;
    }

    pub fn first_user_message(&self) -> Option<&Message> {
        return self
            .messages
            .iter()
            .find(|message| return message.role == Role::User);
    }

    pub fn has_default_title(&self) -> bool {
        return self.title == NEW_CHAT_TITLE;
    }

    /// Everything the model gets to see. The greeting is client side only.
    pub fn history(&self) -> impl Iterator<Item = &Message> {
        return self.messages.iter().skip(1);
    }

    /// Plain text rendition used when sharing a conversation.
    pub fn export_text(&self) -> String {
        return self
            .messages
            .iter()
            .filter(|message| return message.role == Role::User || message.role == Role::Model)
            .map(|message| {
                let label = if message.role == Role::Model {
                    "AI"
                } else {
                    "User"
                };
                return format!("[{label}]:\n{}", message.content);
            })
            .collect::<Vec<String>>()
            .join("\n\n---\n\n");
    }
}
