/// Change notifications emitted by the conversation store after a mutation
/// has been committed and persisted. Subscribers read a snapshot for details.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreEvent {
    ConversationCreated(String),
    ConversationDeleted(String),
    ConversationRenamed(String),
    ActiveConversationChanged(Option<String>),
    MessageAdded {
        conversation_id: String,
        message_id: String,
    },
    MessageUpdated {
        conversation_id: String,
        message_id: String,
    },
    FeedbackCleared(String),
    ModelSelected(String),
    GenerationStarted {
        conversation_id: String,
        message_id: String,
    },
    GenerationFinished {
        conversation_id: String,
        message_id: String,
    },
}
