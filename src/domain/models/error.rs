use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Could not reach Ollama at {url}: {reason}")]
    Connectivity { url: String, reason: String },

    #[error("Ollama error: {0}")]
    ServerReported(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("A response is still being generated. Stop it with /stop before starting another.")]
    GenerationInFlight,

    #[error("There is no active conversation. Start one with /new.")]
    NoActiveConversation,

    #[error("No conversation found with id {0}")]
    ConversationNotFound(String),

    #[error("No message found with id {0}")]
    MessageNotFound(String),
}
