#[cfg(test)]
#[path = "ollama_test.rs"]
mod tests;

use std::io;
use std::time::Duration;

use anyhow::bail;
use anyhow::Result;
use async_trait::async_trait;
use bytes::Buf;
use futures::stream;
use futures::stream::Stream;
use futures::stream::TryStreamExt;
use serde_derive::Deserialize;
use serde_derive::Serialize;
use tokio::io::AsyncBufReadExt;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::Backend;
use crate::domain::models::BackendPrompt;
use crate::domain::models::FragmentStream;
use crate::domain::models::ModelDescriptor;
use crate::domain::models::PromptMessage;
use crate::domain::models::TransportError;

fn convert_err(err: reqwest::Error) -> io::Error {
    let err_msg = err.to_string();
    return io::Error::new(io::ErrorKind::Interrupted, err_msg);
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ChatRequest {
    model: String,
    messages: Vec<PromptMessage>,
    stream: bool,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
struct ChatResponseMessage {
    role: String,
    content: String,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
struct ChatResponse {
    message: Option<ChatResponseMessage>,
    error: Option<String>,
    done: bool,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
struct ModelListResponse {
    models: Vec<ModelDescriptor>,
}

enum ChatLine {
    Fragment(String),
    ServerError(String),
    Skip,
}

fn parse_line(line: &str) -> ChatLine {
    if line.trim().is_empty() {
        return ChatLine::Skip;
    }

    let res = match serde_json::from_str::<ChatResponse>(line) {
        Ok(res) => res,
        Err(err) => {
            tracing::warn!(error = ?err, line, "Failed to parse chat stream line");
            return ChatLine::Skip;
        }
    };
    tracing::debug!(body = ?res, "Chat response");

    if let Some(err) = res.error {
        return ChatLine::ServerError(err);
    }

    if let Some(message) = res.message {
        if !message.content.is_empty() {
            return ChatLine::Fragment(message.content);
        }
    }

    return ChatLine::Skip;
}

/// Decodes a newline delimited JSON body into text fragments. Records may be
/// split across any number of chunks; partial lines are held back until their
/// newline arrives. Lines that aren't UTF-8 are skipped like any other
/// malformed record. A read failure produces `diagnostic` as a final fragment.
pub fn chat_fragments<S, B, E>(
    body: S,
    diagnostic: String,
    cancel: CancellationToken,
) -> FragmentStream
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: Buf + Send + Unpin + 'static,
    E: Into<io::Error> + 'static,
{
    let mut lines = StreamReader::new(body).split(b'\n');

    return Box::pin(async_stream::stream! {
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                line = lines.next_segment() => Some(line),
            };

            let line = match next {
                None => {
                    tracing::debug!("Chat stream cancelled");
                    break;
                }
                Some(Ok(None)) => break,
                Some(Ok(Some(bytes))) => match String::from_utf8(bytes) {
                    Ok(line) => line,
                    Err(err) => {
                        tracing::warn!(error = ?err, "Skipping chat stream line that isn't UTF-8");
                        continue;
                    }
                },
                Some(Err(err)) => {
                    tracing::error!(error = ?err, "Failed reading chat stream from Ollama");
                    yield Ok(diagnostic.to_string());
                    break;
                }
            };

            match parse_line(&line) {
                ChatLine::Fragment(text) => {
                    yield Ok(text);
                }
                ChatLine::ServerError(err) => {
                    tracing::error!(error = %err, "Ollama reported an error mid-stream");
                    yield Err(TransportError::ServerReported(err));
                    break;
                }
                ChatLine::Skip => {}
            }
        }
    });
}

pub struct Ollama {
    url: String,
    timeout: String,
}

impl Default for Ollama {
    fn default() -> Ollama {
        return Ollama::new(
            &Config::get(ConfigKey::OllamaURL),
            &Config::get(ConfigKey::BackendHealthCheckTimeout),
        );
    }
}

impl Ollama {
    pub fn new(url: &str, timeout: &str) -> Ollama {
        return Ollama {
            url: url.trim_end_matches('/').to_string(),
            timeout: timeout.to_string(),
        };
    }

    fn diagnostic(&self, model: &str) -> String {
        return format!(
            "Error: Could not get a diagnosis. Please ensure your local Ollama server at {url} is running, the model '{model}' is available, and the server is accessible.",
            url = self.url
        );
    }

    fn connectivity(&self, reason: String) -> TransportError {
        return TransportError::Connectivity {
            url: self.url.to_string(),
            reason,
        };
    }
}

#[async_trait]
impl Backend for Ollama {
    #[allow(clippy::implicit_return)]
    async fn health_check(&self) -> Result<()> {
        let res = reqwest::Client::new()
            .get(&self.url)
            .timeout(Duration::from_millis(self.timeout.parse::<u64>()?))
            .send()
            .await;

        let res = match res {
            Ok(res) => res,
            Err(err) => {
                tracing::error!(error = ?err, "Ollama is not running");
                bail!("Ollama is not running");
            }
        };

        if res.status() != 200 {
            tracing::error!(status = res.status().as_u16(), "Ollama health check failed");
            bail!("Ollama health check failed");
        }

        return Ok(());
    }

    #[allow(clippy::implicit_return)]
    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, TransportError> {
        let res = reqwest::Client::new()
            .get(format!("{url}/api/tags", url = self.url))
            .send()
            .await
            .map_err(|err| return self.connectivity(err.to_string()))?;

        if !res.status().is_success() {
            tracing::error!(status = res.status().as_u16(), "Failed to list Ollama models");
            return Err(self.connectivity(format!("status {}", res.status().as_u16())));
        }

        let body = res
            .json::<ModelListResponse>()
            .await
            .map_err(|err| return self.connectivity(err.to_string()))?;

        return Ok(body.models);
    }

    #[allow(clippy::implicit_return)]
    async fn stream_chat(
        &self,
        prompt: BackendPrompt,
        cancel: CancellationToken,
    ) -> FragmentStream {
        let diagnostic = self.diagnostic(&prompt.model);
        let req = ChatRequest {
            model: prompt.model,
            messages: prompt.messages,
            stream: true,
        };

        let send = reqwest::Client::new()
            .post(format!("{url}/api/chat", url = self.url))
            .json(&req)
            .send();

        let res = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            res = send => Some(res),
        };

        let res = match res {
            None => {
                tracing::debug!("Chat request cancelled before a response arrived");
                return Box::pin(stream::empty::<Result<String, TransportError>>());
            }
            Some(Err(err)) => {
                tracing::error!(error = ?err, model = %req.model, "Failed to make chat request to Ollama");
                return Box::pin(stream::iter([Ok::<String, TransportError>(diagnostic)]));
            }
            Some(Ok(res)) => res,
        };

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            tracing::error!(status, body = %body, model = %req.model, "Ollama rejected the chat request");
            return Box::pin(stream::iter([Ok::<String, TransportError>(diagnostic)]));
        }

        return chat_fragments(res.bytes_stream().map_err(convert_err), diagnostic, cancel);
    }
}
