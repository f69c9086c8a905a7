use serde_derive::Deserialize;
use serde_derive::Serialize;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
    System,
}

impl Role {
    /// Role name understood by Ollama's chat endpoint.
    pub fn api_name(&self) -> &'static str {
        match self {
            Role::User => return "user",
            Role::Model => return "assistant",
            Role::System => return "system",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::User => return "You",
            Role::Model => return "AI",
            Role::System => return "System",
        }
    }
}
