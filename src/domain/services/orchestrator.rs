#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;

use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::ConversationStore;
use super::SharedStore;
use crate::domain::models::BackendBox;
use crate::domain::models::BackendPrompt;
use crate::domain::models::DomainError;
use crate::domain::models::Message;
use crate::domain::models::Role;
use crate::domain::models::FEEDBACK_ACKNOWLEDGEMENT;
use crate::domain::models::NOT_HELPFUL_PROMPT;

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum GenerationState {
    Idle,
    Streaming,
    Completed,
    Cancelled,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationOutcome {
    pub conversation_id: String,
    pub message_id: String,
    pub state: GenerationState,
}

struct InFlight {
    conversation_id: String,
    message_id: String,
    token: CancellationToken,
}

type Slot = Arc<Mutex<Option<InFlight>>>;

/// Releases the slot if it still belongs to `message_id` and runs the store's
/// terminal transition. Returns false when someone else already did.
///
/// Lock order is always slot, then store.
fn release(slot: &Slot, store: &SharedStore, message_id: &str) -> bool {
    let mut slot = slot.lock();
    let owned = slot
        .as_ref()
        .map(|in_flight| return in_flight.message_id == message_id)
        .unwrap_or(false);
    if !owned {
        return false;
    }

    if let Some(in_flight) = slot.take() {
        store
            .lock()
            .finish_generation(&in_flight.conversation_id, &in_flight.message_id);
    }

    return true;
}

/// Drives request/response cycles against the backend. At most one
/// generation is in flight at a time.
#[derive(Clone)]
pub struct Orchestrator {
    backend: BackendBox,
    store: SharedStore,
    slot: Slot,
}

impl Orchestrator {
    pub fn new(backend: BackendBox, store: SharedStore) -> Orchestrator {
        return Orchestrator {
            backend,
            store,
            slot: Arc::new(Mutex::new(None)),
        };
    }

    pub fn store(&self) -> SharedStore {
        return self.store.clone();
    }

    pub fn is_generating(&self) -> bool {
        return self.slot.lock().is_some();
    }

    pub fn state(&self) -> GenerationState {
        if self.is_generating() {
            return GenerationState::Streaming;
        }

        return GenerationState::Idle;
    }

    /// Appends `text` as a user message to the active conversation and starts
    /// generating the answer. Nothing is appended if a generation is already
    /// running.
    pub fn send_message(&self, text: &str) -> Result<Generation, DomainError> {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            return Err(DomainError::GenerationInFlight);
        }

        let mut store = self.store.lock();
        let conversation_id = store
            .active_conversation_id()
            .ok_or(DomainError::NoActiveConversation)?;
        store.push_message(&conversation_id, Message::new(Role::User, text))?;

        return self.begin(&mut slot, &mut store, conversation_id);
    }

    /// Helpful feedback is acknowledged in the thread. Unhelpful feedback asks
    /// the model for an alternative, leaving the earlier answer as it was.
    pub fn submit_feedback(&self, was_helpful: bool) -> Result<Option<Generation>, DomainError> {
        let mut slot = self.slot.lock();
        let mut store = self.store.lock();
        let conversation_id = match store.active_conversation_id() {
            Some(id) => id,
            None => return Ok(None),
        };

        if !was_helpful && slot.is_some() {
            return Err(DomainError::GenerationInFlight);
        }

        store.clear_feedback(&conversation_id)?;

        if was_helpful {
            store.push_message(
                &conversation_id,
                Message::new(Role::System, FEEDBACK_ACKNOWLEDGEMENT),
            )?;
            return Ok(None);
        }

        store.push_message(
            &conversation_id,
            Message::new(Role::User, NOT_HELPFUL_PROMPT),
        )?;

        return self
            .begin(&mut slot, &mut store, conversation_id)
            .map(Some);
    }

    /// Cancels the running generation, keeping whatever was streamed so far.
    /// Once this returns no further fragment reaches the store.
    pub fn stop(&self) -> bool {
        let message_id = match self.slot.lock().as_ref() {
            Some(in_flight) => {
                in_flight.token.cancel();
                in_flight.message_id.to_string()
            }
            None => return false,
        };

        tracing::debug!(message_id = %message_id, "Generation stopped");
        release(&self.slot, &self.store, &message_id);
        return true;
    }

    fn begin(
        &self,
        slot: &mut Option<InFlight>,
        store: &mut ConversationStore,
        conversation_id: String,
    ) -> Result<Generation, DomainError> {
        let conversation = store
            .conversation(&conversation_id)
            .ok_or_else(|| return DomainError::ConversationNotFound(conversation_id.to_string()))?;
        let prompt = BackendPrompt::from_conversation(conversation, store.selected_model());

        let message_id = store.start_generation(&conversation_id)?;
        let token = CancellationToken::new();
        *slot = Some(InFlight {
            conversation_id: conversation_id.to_string(),
            message_id: message_id.to_string(),
            token: token.clone(),
        });

        tracing::debug!(
            conversation_id = %conversation_id,
            message_id = %message_id,
            model = %prompt.model,
            messages = prompt.messages.len(),
            "Generation started"
        );

        return Ok(Generation {
            backend: self.backend.clone(),
            store: self.store.clone(),
            slot: self.slot.clone(),
            conversation_id,
            message_id,
            prompt,
            token,
        });
    }
}

/// A started generation. Nothing is requested until `run` is awaited.
pub struct Generation {
    backend: BackendBox,
    store: SharedStore,
    slot: Slot,
    conversation_id: String,
    message_id: String,
    prompt: BackendPrompt,
    token: CancellationToken,
}

impl Generation {
    pub fn message_id(&self) -> &str {
        return &self.message_id;
    }

    /// Streams the answer into the placeholder until the backend is done, an
    /// error arrives or the generation is stopped.
    pub async fn run(self) -> GenerationOutcome {
        let mut stream = self
            .backend
            .stream_chat(self.prompt.clone(), self.token.clone())
            .await;

        let mut state = GenerationState::Streaming;
        while state == GenerationState::Streaming {
            let next = tokio::select! {
                biased;
                _ = self.token.cancelled() => None,
                item = stream.next() => Some(item),
            };

            state = match next {
                None => GenerationState::Cancelled,
                Some(None) => GenerationState::Completed,
                Some(Some(Ok(fragment))) => self.apply(&fragment),
                Some(Some(Err(err))) => {
                    tracing::error!(error = %err, "Generation failed");
                    self.fail(&err.to_string())
                }
            };
        }

        release(&self.slot, &self.store, &self.message_id);
        tracing::debug!(message_id = %self.message_id, state = %state, "Generation finished");

        return GenerationOutcome {
            conversation_id: self.conversation_id.to_string(),
            message_id: self.message_id.to_string(),
            state,
        };
    }

    fn apply(&self, fragment: &str) -> GenerationState {
        let mut store = self.store.lock();
        if self.token.is_cancelled() {
            return GenerationState::Cancelled;
        }

        if let Err(err) = store.append_to_message(&self.conversation_id, &self.message_id, fragment)
        {
            tracing::warn!(error = %err, "Generation target is gone, cancelling");
            self.token.cancel();
            return GenerationState::Cancelled;
        }

        return GenerationState::Streaming;
    }

    fn fail(&self, reason: &str) -> GenerationState {
        let mut store = self.store.lock();
        if self.token.is_cancelled() {
            return GenerationState::Cancelled;
        }

        if let Err(err) =
            store.replace_message_content(&self.conversation_id, &self.message_id, reason)
        {
            tracing::warn!(error = %err, "Failed to record generation error");
        }

        return GenerationState::Failed;
    }
}

impl Drop for Generation {
    fn drop(&mut self) {
        if release(&self.slot, &self.store, &self.message_id) {
            tracing::warn!(message_id = %self.message_id, "Generation dropped before it finished");
        }
    }
}
