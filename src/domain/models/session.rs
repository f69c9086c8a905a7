#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

use std::collections::BTreeMap;

use serde_derive::Deserialize;
use serde_derive::Serialize;

use super::Conversation;

pub const CONVERSATIONS_KEY: &str = "conversations";
pub const ACTIVE_CONVERSATION_KEY: &str = "activeConversationId";
pub const SELECTED_MODEL_KEY: &str = "selectedModel";

/// Everything the client persists. Conversations are most-recent-first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionState {
    pub conversations: Vec<Conversation>,
    pub active_conversation_id: Option<String>,
    pub selected_model: String,
}

impl SessionState {
    pub fn conversation(&self, id: &str) -> Option<&Conversation> {
        return self
            .conversations
            .iter()
            .find(|conversation| return conversation.id == id);
    }

    pub fn conversation_mut(&mut self, id: &str) -> Option<&mut Conversation> {
        return self
            .conversations
            .iter_mut()
            .find(|conversation| return conversation.id == id);
    }

    pub fn active_conversation(&self) -> Option<&Conversation> {
        return self
            .active_conversation_id
            .as_ref()
            .and_then(|id| return self.conversation(id));
    }
}

/// On-disk envelope for one session's storage entries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub version: String,
    pub timestamp: String,
    pub entries: BTreeMap<String, String>,
}

impl Session {
    /// Titles of the stored conversations, most recent first. Unreadable
    /// entries yield nothing.
    pub fn conversation_titles(&self) -> Vec<String> {
        return self
            .entries
            .get(CONVERSATIONS_KEY)
            .and_then(|payload| return serde_json::from_str::<Vec<Conversation>>(payload).ok())
            .unwrap_or_default()
            .into_iter()
            .map(|conversation| return conversation.title)
            .collect();
    }
}
