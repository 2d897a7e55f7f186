//! Ollama Chat API implementation.

use super::client::OllamaClient;
use crate::error::LlmError;
use crate::message::ChatMessage;
use crate::providers::http::post_json;
use crate::providers::{GenerateOptions, Model, ModelResponse, TokenUsage, saturating_u32};
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, instrument};

/// Ollama chat completion model.
#[derive(Clone)]
pub struct CompletionModel {
    client: OllamaClient,
    model_id: String,
    /// Keep model loaded in memory.
    pub keep_alive: Option<String>,
}

impl std::fmt::Debug for CompletionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionModel")
            .field("model_id", &self.model_id)
            .field("keep_alive", &self.keep_alive)
            .finish_non_exhaustive()
    }
}

impl CompletionModel {
    pub(crate) fn new(client: OllamaClient, model_id: impl Into<String>) -> Self {
        Self {
            client,
            model_id: model_id.into(),
            keep_alive: None,
        }
    }

    /// Set `keep_alive` duration (e.g., "5m", "1h", "-1" for indefinite).
    #[must_use]
    pub fn with_keep_alive(mut self, keep_alive: impl Into<String>) -> Self {
        self.keep_alive = Some(keep_alive.into());
        self
    }

    fn build_request_body(&self, messages: &[ChatMessage], options: &GenerateOptions) -> Value {
        let api_messages: Vec<Value> = messages
            .iter()
            .map(|msg| json!({ "role": msg.role.as_str(), "content": msg.content }))
            .collect();

        let mut body = json!({
            "model": self.model_id,
            "messages": api_messages,
            "stream": false
        });

        let mut opts = serde_json::Map::new();
        if let Some(temp) = options.temperature {
            opts.insert("temperature".to_string(), json!(temp));
        }
        if let Some(top_p) = options.top_p {
            opts.insert("top_p".to_string(), json!(top_p));
        }
        if let Some(max_tokens) = options.max_tokens {
            opts.insert("num_predict".to_string(), json!(max_tokens));
        }
        if let Some(stop) = &options.stop
            && !stop.is_empty()
        {
            opts.insert("stop".to_string(), json!(stop));
        }
        if !opts.is_empty() {
            body["options"] = Value::Object(opts);
        }

        if let Some(keep_alive) = &self.keep_alive {
            body["keep_alive"] = json!(keep_alive);
        }

        body
    }

    fn parse_response(json: &Value) -> Result<ModelResponse, LlmError> {
        let content = json["message"]["content"]
            .as_str()
            .ok_or_else(|| LlmError::response_format("message.content", json.to_string()))?;

        let mut response = ModelResponse::new(content);
        let input = json["prompt_eval_count"].as_u64();
        let output = json["eval_count"].as_u64();
        if input.is_some() || output.is_some() {
            response = response.with_token_usage(TokenUsage::new(
                saturating_u32(input.unwrap_or(0)),
                saturating_u32(output.unwrap_or(0)),
            ));
        }
        Ok(response)
    }
}

#[async_trait]
impl Model for CompletionModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn provider(&self) -> &'static str {
        "ollama"
    }

    #[instrument(skip(self, messages, options), fields(model = %self.model_id))]
    async fn generate(
        &self,
        messages: Vec<ChatMessage>,
        options: GenerateOptions,
    ) -> Result<ModelResponse, LlmError> {
        let body = self.build_request_body(&messages, &options);
        let json = post_json(&self.client, "/api/chat", &body).await?;
        let response = Self::parse_response(&json)?;
        debug!(usage = ?response.token_usage, "ollama chat received");
        Ok(response)
    }
}
