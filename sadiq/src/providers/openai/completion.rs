//! OpenAI-compatible Chat Completions implementation.

use super::client::OpenAIClient;
use crate::error::LlmError;
use crate::message::ChatMessage;
use crate::providers::http::post_json;
use crate::providers::{
    ApiClient, GenerateOptions, Model, ModelResponse, TokenUsage, saturating_u32,
};
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, instrument};

/// Groq-hosted Llama 3.3 70B.
pub const LLAMA_3_3_70B_VERSATILE: &str = "llama-3.3-70b-versatile";

/// `OpenAI` GPT-4o mini.
pub const GPT_4O_MINI: &str = "gpt-4o-mini";

/// Chat completion model behind an OpenAI-compatible endpoint.
#[derive(Clone)]
pub struct CompletionModel {
    client: OpenAIClient,
    model_id: String,
}

impl std::fmt::Debug for CompletionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionModel")
            .field("provider", &self.client.provider())
            .field("model_id", &self.model_id)
            .finish_non_exhaustive()
    }
}

impl CompletionModel {
    pub(crate) fn new(client: OpenAIClient, model_id: impl Into<String>) -> Self {
        Self {
            client,
            model_id: model_id.into(),
        }
    }

    fn build_request_body(&self, messages: &[ChatMessage], options: &GenerateOptions) -> Value {
        let api_messages: Vec<Value> = messages
            .iter()
            .map(|msg| json!({ "role": msg.role.as_str(), "content": msg.content }))
            .collect();

        let mut body = json!({
            "model": self.model_id,
            "messages": api_messages,
        });

        if let Some(temp) = options.temperature {
            body["temperature"] = json!(temp);
        }
        if let Some(max_tokens) = options.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(top_p) = options.top_p {
            body["top_p"] = json!(top_p);
        }
        if let Some(stop) = &options.stop
            && !stop.is_empty()
        {
            body["stop"] = json!(stop);
        }

        body
    }

    fn parse_response(json: &Value) -> Result<ModelResponse, LlmError> {
        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                LlmError::response_format("choices[0].message.content", json.to_string())
            })?;

        let mut response = ModelResponse::new(content);
        if let Some(usage) = json.get("usage") {
            response = response.with_token_usage(TokenUsage::new(
                saturating_u32(usage["prompt_tokens"].as_u64().unwrap_or(0)),
                saturating_u32(usage["completion_tokens"].as_u64().unwrap_or(0)),
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
        self.client.provider()
    }

    #[instrument(skip(self, messages, options), fields(provider = self.client.provider(), model = %self.model_id))]
    async fn generate(
        &self,
        messages: Vec<ChatMessage>,
        options: GenerateOptions,
    ) -> Result<ModelResponse, LlmError> {
        let body = self.build_request_body(&messages, &options);
        let json = post_json(&self.client, "/chat/completions", &body).await?;
        let response = Self::parse_response(&json)?;
        debug!(usage = ?response.token_usage, "chat completion received");
        Ok(response)
    }
}
