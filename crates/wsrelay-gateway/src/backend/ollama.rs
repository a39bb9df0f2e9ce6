//! HTTP client for a running Ollama instance.
//!
//! - `GET /api/tags`  backs `list_resources` (name => model_name, digest => status)
//! - `POST /api/chat` backs `execute("chat", ..)` with streaming disabled

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use wsrelay_core::error::{RelayError, Result};

use super::{ModelBackend, ResourceDescriptor, CHAT};

fn net_err(msg: String) -> RelayError {
    RelayError::Backend(msg)
}

/// A model registered in Ollama, as returned by `GET /api/tags`.
#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
    #[serde(default)]
    digest: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Option<Vec<TagModel>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Params accepted by the chat operation.
#[derive(Debug, Deserialize)]
pub struct ChatParams {
    pub model_name: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

pub struct OllamaBackend {
    base_url: String,
    client: reqwest::Client,
}

impl OllamaBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("wsrelay")
            .build()
            .map_err(|e| RelayError::Config(format!("http client build failed: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn chat(&self, params: ChatParams) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);
        debug!(model = %params.model_name, turns = params.messages.len(), "ollama chat");

        let body = ChatRequest {
            model: &params.model_name,
            messages: &params.messages,
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| net_err(format!("failed to reach ollama at {url}: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(net_err(format!("ollama chat returned {status}: {text}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| net_err(format!("failed to parse ollama chat response: {e}")))?;
        Ok(parsed.message.content)
    }
}

#[async_trait]
impl ModelBackend for OllamaBackend {
    async fn execute(&self, action: &str, params: &Value) -> Result<Value> {
        match action {
            CHAT => {
                let params: ChatParams = serde_json::from_value(params.clone())
                    .map_err(|e| RelayError::BadRequest(format!("chat invalid params: {e}")))?;
                let content = self.chat(params).await?;
                Ok(json!({
                    "message": { "role": "assistant", "content": content }
                }))
            }
            other => Err(RelayError::UnknownAction(other.to_string())),
        }
    }

    async fn list_resources(&self) -> Result<Vec<ResourceDescriptor>> {
        let url = format!("{}/api/tags", self.base_url);
        debug!("listing ollama models from {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| net_err(format!("failed to reach ollama at {url}: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(net_err(format!("ollama tags returned {status}: {text}")));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| net_err(format!("failed to parse ollama tags response: {e}")))?;

        let models: Vec<ResourceDescriptor> = tags
            .models
            .unwrap_or_default()
            .into_iter()
            .map(|m| ResourceDescriptor {
                model_name: m.name,
                status: m.digest,
            })
            .collect();
        info!("ollama has {} registered models", models.len());
        Ok(models)
    }
}
