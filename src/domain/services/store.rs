#[cfg(test)]
#[path = "store_test.rs"]
mod tests;

use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::domain::models::derive_title;
use crate::domain::models::Conversation;
use crate::domain::models::DomainError;
use crate::domain::models::Message;
use crate::domain::models::SessionState;
use crate::domain::models::SessionStorage;
use crate::domain::models::StorageBox;
use crate::domain::models::StoreEvent;
use crate::domain::models::ACTIVE_CONVERSATION_KEY;
use crate::domain::models::CONVERSATIONS_KEY;
use crate::domain::models::SELECTED_MODEL_KEY;

pub type SharedStore = Arc<Mutex<ConversationStore>>;

fn rehydrate(storage: &dyn SessionStorage) -> Result<SessionState> {
    let mut state = SessionState::default();

    if let Some(payload) = storage.get(CONVERSATIONS_KEY)? {
        state.conversations = serde_json::from_str(&payload)?;
    }

    if let Some(payload) = storage.get(ACTIVE_CONVERSATION_KEY)? {
        let id = serde_json::from_str::<String>(&payload)?;
        if state.conversation(&id).is_some() {
            state.active_conversation_id = Some(id);
        } else {
            tracing::warn!(id = %id, "Stored active conversation no longer exists");
        }
    }

    if let Some(model) = storage.get(SELECTED_MODEL_KEY)? {
        state.selected_model = model;
    }

    return Ok(state);
}

/// Owns the session state. Every committed mutation is written to storage and
/// then announced to subscribers, once per mutation.
pub struct ConversationStore {
    state: SessionState,
    generating: bool,
    storage: StorageBox,
    subscribers: Vec<mpsc::UnboundedSender<StoreEvent>>,
}

impl ConversationStore {
    pub fn new(storage: StorageBox) -> ConversationStore {
        return ConversationStore {
            state: SessionState::default(),
            generating: false,
            storage,
            subscribers: vec![],
        };
    }

    /// Restores whatever the storage holds. Unreadable data wipes the storage
    /// and starts from an empty session.
    pub fn load(storage: StorageBox) -> ConversationStore {
        let state = match rehydrate(storage.as_ref()) {
            Ok(state) => state,
            Err(err) => {
                tracing::error!(error = ?err, "Failed to restore session, starting fresh");
                if let Err(err) = storage.clear() {
                    tracing::error!(error = ?err, "Failed to clear session storage");
                }
                SessionState::default()
            }
        };

        tracing::debug!(
            conversations = state.conversations.len(),
            active = ?state.active_conversation_id,
            model = %state.selected_model,
            "Session restored"
        );

        let mut store = ConversationStore::new(storage);
        store.state = state;
        return store;
    }

    pub fn shared(self) -> SharedStore {
        return Arc::new(Mutex::new(self));
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<StoreEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        return rx;
    }

    pub fn snapshot(&self) -> SessionState {
        return self.state.clone();
    }

    pub fn conversations(&self) -> &[Conversation] {
        return &self.state.conversations;
    }

    pub fn conversation(&self, id: &str) -> Option<&Conversation> {
        return self.state.conversation(id);
    }

    pub fn active_conversation(&self) -> Option<&Conversation> {
        return self.state.active_conversation();
    }

    pub fn active_conversation_id(&self) -> Option<String> {
        return self.state.active_conversation_id.clone();
    }

    pub fn selected_model(&self) -> &str {
        return &self.state.selected_model;
    }

    pub fn is_generating(&self) -> bool {
        return self.generating;
    }

    pub fn create_conversation(&mut self) -> Result<String, DomainError> {
        if self.generating {
            return Err(DomainError::GenerationInFlight);
        }

        let conversation = Conversation::default();
        let id = conversation.id.to_string();
        self.state.conversations.insert(0, conversation);
        self.state.active_conversation_id = Some(id.to_string());

        self.commit(StoreEvent::ConversationCreated(id.to_string()));
        return Ok(id);
    }

    pub fn select_conversation(&mut self, id: &str) -> Result<(), DomainError> {
        if self.generating {
            return Err(DomainError::GenerationInFlight);
        }
        if self.state.conversation(id).is_none() {
            return Err(DomainError::ConversationNotFound(id.to_string()));
        }

        self.state.active_conversation_id = Some(id.to_string());
        self.commit(StoreEvent::ActiveConversationChanged(Some(id.to_string())));
        return Ok(());
    }

    pub fn delete_conversation(&mut self, id: &str) -> Result<(), DomainError> {
        let len = self.state.conversations.len();
        self.state
            .conversations
            .retain(|conversation| return conversation.id != id);
        if self.state.conversations.len() == len {
            return Err(DomainError::ConversationNotFound(id.to_string()));
        }

        if self.state.active_conversation_id.as_deref() == Some(id) {
            self.state.active_conversation_id = self
                .state
                .conversations
                .first()
                .map(|conversation| return conversation.id.to_string());
        }

        self.commit(StoreEvent::ConversationDeleted(id.to_string()));
        return Ok(());
    }

    pub fn rename_conversation(&mut self, id: &str, title: &str) -> Result<(), DomainError> {
        let conversation = self
            .state
            .conversation_mut(id)
            .ok_or_else(|| return DomainError::ConversationNotFound(id.to_string()))?;
        conversation.title = title.to_string();

        self.commit(StoreEvent::ConversationRenamed(id.to_string()));
        return Ok(());
    }

    pub fn select_model(&mut self, name: &str) {
        self.state.selected_model = name.to_string();
        self.commit(StoreEvent::ModelSelected(name.to_string()));
    }

    pub fn push_message(&mut self, conversation_id: &str, message: Message) -> Result<(), DomainError> {
        let message_id = message.id.to_string();
        self.conversation_mut(conversation_id)?.push(message);

        self.commit(StoreEvent::MessageAdded {
            conversation_id: conversation_id.to_string(),
            message_id,
        });
        return Ok(());
    }

    /// Appends a streamed fragment to a message, located by id.
    pub fn append_to_message(
        &mut self,
        conversation_id: &str,
        message_id: &str,
        fragment: &str,
    ) -> Result<(), DomainError> {
        return self.update_message(conversation_id, message_id, |message| {
            return message.with_fragment(fragment);
        });
    }

    pub fn replace_message_content(
        &mut self,
        conversation_id: &str,
        message_id: &str,
        content: &str,
    ) -> Result<(), DomainError> {
        return self.update_message(conversation_id, message_id, |message| {
            return message.with_content(content);
        });
    }

    pub fn clear_feedback(&mut self, conversation_id: &str) -> Result<(), DomainError> {
        let conversation = self.conversation_mut(conversation_id)?;
        for message in conversation.messages.iter_mut() {
            if message.show_feedback.is_some() {
                *message = message.with_feedback(false);
            }
        }

        self.commit(StoreEvent::FeedbackCleared(conversation_id.to_string()));
        return Ok(());
    }

    /// Appends an empty model message to stream into and returns its id.
    pub fn start_generation(&mut self, conversation_id: &str) -> Result<String, DomainError> {
        let placeholder = Message::placeholder();
        let message_id = placeholder.id.to_string();
        self.conversation_mut(conversation_id)?.push(placeholder);
        self.generating = true;

        self.commit(StoreEvent::GenerationStarted {
            conversation_id: conversation_id.to_string(),
            message_id: message_id.to_string(),
        });
        return Ok(message_id);
    }

    /// Terminal transition of a generation. Flags the message for feedback and
    /// titles the conversation after its first user message if it still has
    /// the default title. The conversation may have been deleted meanwhile.
    pub fn finish_generation(&mut self, conversation_id: &str, message_id: &str) {
        self.generating = false;

        if let Some(conversation) = self.state.conversation_mut(conversation_id) {
            if let Some(message) = conversation.message(message_id) {
                let message = message.with_feedback(true);
                conversation.replace_message(message);
            }

            let title = conversation
                .first_user_message()
                .map(|message| return derive_title(&message.content));
            if let (true, Some(title)) = (conversation.has_default_title(), title) {
                conversation.title = title;
            }
        }

        self.commit(StoreEvent::GenerationFinished {
            conversation_id: conversation_id.to_string(),
            message_id: message_id.to_string(),
        });
    }

    pub fn export_text(&self, conversation_id: &str) -> Result<String, DomainError> {
        return self
            .conversation(conversation_id)
            .map(|conversation| return conversation.export_text())
            .ok_or_else(|| return DomainError::ConversationNotFound(conversation_id.to_string()));
    }

    fn conversation_mut(&mut self, id: &str) -> Result<&mut Conversation, DomainError> {
        return self
            .state
            .conversation_mut(id)
            .ok_or_else(|| return DomainError::ConversationNotFound(id.to_string()));
    }

    fn update_message<F>(
        &mut self,
        conversation_id: &str,
        message_id: &str,
        update: F,
    ) -> Result<(), DomainError>
    where
        F: FnOnce(&Message) -> Message,
    {
        let conversation = self.conversation_mut(conversation_id)?;
        let message = conversation
            .message(message_id)
            .map(update)
            .ok_or_else(|| return DomainError::MessageNotFound(message_id.to_string()))?;
        conversation.replace_message(message);

        self.commit(StoreEvent::MessageUpdated {
            conversation_id: conversation_id.to_string(),
            message_id: message_id.to_string(),
        });
        return Ok(());
    }

    fn commit(&mut self, event: StoreEvent) {
        self.persist();
        self.subscribers.retain(|tx| return tx.send(event.clone()).is_ok());
    }

    /// Writes every key, even when an earlier one fails.
    fn persist(&self) {
        let conversations = serde_json::to_string(&self.state.conversations)
            .map_err(anyhow::Error::from)
            .and_then(|payload| return self.storage.set(CONVERSATIONS_KEY, &payload));
        log_persist_failure(CONVERSATIONS_KEY, conversations);

        let active = match &self.state.active_conversation_id {
            Some(id) => serde_json::to_string(id)
                .map_err(anyhow::Error::from)
                .and_then(|payload| return self.storage.set(ACTIVE_CONVERSATION_KEY, &payload)),
            None => self.storage.remove(ACTIVE_CONVERSATION_KEY),
        };
        log_persist_failure(ACTIVE_CONVERSATION_KEY, active);

        let model = if self.state.selected_model.is_empty() {
            self.storage.remove(SELECTED_MODEL_KEY)
        } else {
            self.storage
                .set(SELECTED_MODEL_KEY, &self.state.selected_model)
        };
        log_persist_failure(SELECTED_MODEL_KEY, model);
    }
}

fn log_persist_failure(key: &str, res: Result<()>) {
    if let Err(err) = res {
        tracing::error!(error = ?err, key, "Failed to persist session");
    }
}
