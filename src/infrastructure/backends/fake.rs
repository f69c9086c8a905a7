use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::models::Backend;
use crate::domain::models::BackendPrompt;
use crate::domain::models::FragmentStream;
use crate::domain::models::ModelDescriptor;
use crate::domain::models::TransportError;

type Fragment = Result<String, TransportError>;

enum Script {
    Fragments(Vec<Fragment>),
    Channel(mpsc::UnboundedReceiver<Fragment>),
}

/// Scripted backend. Each `stream_chat` call consumes the next script, or
/// ends immediately when none are left.
#[derive(Clone)]
pub struct FakeBackend {
    models: Result<Vec<ModelDescriptor>, TransportError>,
    scripts: Arc<Mutex<VecDeque<Script>>>,
    prompts: Arc<Mutex<Vec<BackendPrompt>>>,
}

impl Default for FakeBackend {
    fn default() -> FakeBackend {
        return FakeBackend {
            models: Ok(vec![]),
            scripts: Arc::new(Mutex::new(VecDeque::new())),
            prompts: Arc::new(Mutex::new(vec![])),
        };
    }
}

impl FakeBackend {
    pub fn with_models(mut self, models: Result<Vec<ModelDescriptor>, TransportError>) -> Self {
        self.models = models;
        return self;
    }

    pub fn push_fragments(&self, fragments: Vec<Fragment>) {
        self.scripts.lock().push_back(Script::Fragments(fragments));
    }

    /// Queues a stream fed by hand, for tests that act between fragments.
    pub fn push_channel(&self) -> mpsc::UnboundedSender<Fragment> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.scripts.lock().push_back(Script::Channel(rx));
        return tx;
    }

    pub fn prompts(&self) -> Vec<BackendPrompt> {
        return self.prompts.lock().clone();
    }
}

#[async_trait]
impl Backend for FakeBackend {
    #[allow(clippy::implicit_return)]
    async fn health_check(&self) -> Result<()> {
        return Ok(());
    }

    #[allow(clippy::implicit_return)]
    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, TransportError> {
        return self.models.clone();
    }

    #[allow(clippy::implicit_return)]
    async fn stream_chat(
        &self,
        prompt: BackendPrompt,
        _cancel: CancellationToken,
    ) -> FragmentStream {
        self.prompts.lock().push(prompt);

        let script = self.scripts.lock().pop_front();
        match script {
            Some(Script::Fragments(fragments)) => return Box::pin(stream::iter(fragments)),
            Some(Script::Channel(rx)) => {
                return Box::pin(stream::unfold(rx, |mut rx| async move {
                    let item = rx.recv().await?;
                    return Some((item, rx));
                }));
            }
            None => return Box::pin(stream::empty::<Fragment>()),
        }
    }
}
