#[cfg(test)]
#[path = "backend_test.rs"]
mod tests;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_derive::Deserialize;
use serde_derive::Serialize;
use tokio_util::sync::CancellationToken;

use super::Conversation;
use super::ModelDescriptor;
use super::Role;
use super::TransportError;
use super::SYSTEM_INSTRUCTION;

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: String,
    pub content: String,
}

#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct BackendPrompt {
    pub model: String,
    pub messages: Vec<PromptMessage>,
}

impl BackendPrompt {
    /// Prompt opening with the diagnosis system instruction.
    pub fn new(model: &str) -> BackendPrompt {
        let mut prompt = BackendPrompt {
            model: model.to_string(),
            messages: vec![],
        };
        prompt.push(Role::System, SYSTEM_INSTRUCTION);

        return prompt;
    }

    /// System instruction followed by the conversation history, greeting
    /// excluded.
    pub fn from_conversation(conversation: &Conversation, model: &str) -> BackendPrompt {
        let mut prompt = BackendPrompt::new(model);
        for message in conversation.history() {
            prompt.push(message.role, &message.content);
        }

        return prompt;
    }

    pub fn push(&mut self, role: Role, content: &str) {
        self.messages.push(PromptMessage {
            role: role.api_name().to_string(),
            content: content.to_string(),
        });
    }
}

/// Fragments of generated text in delivery order. An `Err` item is terminal.
pub type FragmentStream = BoxStream<'static, Result<String, TransportError>>;

#[async_trait]
pub trait Backend {
    /// Used at startup to warn early when the model server isn't reachable.
    async fn health_check(&self) -> Result<()>;

    /// All models the server can run, in the server's order.
    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, TransportError>;

    /// Streams a chat completion. Failing to reach the server is reported as a
    /// single diagnostic fragment rather than an error, so the thread always
    /// shows something. Signaling `cancel` ends the stream silently.
    async fn stream_chat(&self, prompt: BackendPrompt, cancel: CancellationToken)
        -> FragmentStream;
}

pub type BackendBox = Arc<dyn Backend + Send + Sync>;
