#[cfg(test)]
#[path = "message_test.rs"]
mod tests;

use serde_derive::Deserialize;
use serde_derive::Serialize;
use uuid::Uuid;

use super::Role;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_feedback: Option<bool>,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Message {
        return Message {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.to_string(),
            show_feedback: None,
        };
    }

    /// Empty model message that a generation streams into.
    pub fn placeholder() -> Message {
        return Message::new(Role::Model, "");
    }

    pub fn wants_feedback(&self) -> bool {
        return self.show_feedback == Some(true);
    }

    /// Copy of this message with `fragment` appended. Identity is kept.
    pub fn with_fragment(&self, fragment: &str) -> Message {
        let mut message = self.clone();
        message.content.push_str(fragment);
        return message;
    }

    pub fn with_content(&self, content: &str) -> Message {
        let mut message = self.clone();
        message.content = content.to_string();
        return message;
    }

    pub fn with_feedback(&self, show_feedback: bool) -> Message {
        let mut message = self.clone();
        message.show_feedback = Some(show_feedback);
        return message;
    }
}
