//! Qwen provider backed by the DashScope native text-generation API.

use crate::llm::error::{AIError, AIErrorKind, ProviderSetupError};
use crate::llm::provider::{
    AIProvider, ProviderState, build_http_client, normalize_base_url, post_json,
};
use crate::llm::types::{GenerateOptions, GenerateResult, ProviderConfig, ProviderStatus, TokenUsage};
use futures::future::BoxFuture;
use serde_json::json;
use std::collections::HashMap;
use tracing::debug;

const JSON_SUFFIX: &str = "Please respond in valid JSON format matching the provided schema.";

pub struct QwenProvider {
    config: ProviderConfig,
    client: reqwest::Client,
    endpoint: String,
    state: ProviderState,
}

impl QwenProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderSetupError> {
        let base = normalize_base_url(&config)?;
        Ok(Self {
            endpoint: format!("{}/services/aigc/text-generation/generation", base),
            client: build_http_client()?,
            config,
            state: ProviderState::default(),
        })
    }

    fn build_body(&self, prompt: &str, options: &GenerateOptions, model: &str) -> serde_json::Value {
        // DashScope has no schema parameter; JSON mode is requested and the
        // prompt carries the instruction.
        let content = if options.wants_structured_json() {
            format!("{}\n\n{}", prompt, JSON_SUFFIX)
        } else {
            prompt.to_string()
        };

        let mut messages = Vec::new();
        if let Some(system) = options.system_prompt.as_deref().filter(|s| !s.trim().is_empty()) {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": content }));

        let mut parameters = json!({
            "temperature": options.temperature.unwrap_or(self.config.options.temperature),
            "max_tokens": options.max_tokens.unwrap_or(self.config.options.max_tokens),
            "result_format": "message",
        });
        if options.wants_structured_json() {
            parameters["response_format"] = json!({ "type": "json_object" });
        }

        json!({
            "model": model,
            "input": { "messages": messages },
            "parameters": parameters,
        })
    }

    async fn call(&self, prompt: String, options: GenerateOptions) -> Result<GenerateResult, AIError> {
        let model = options
            .model
            .clone()
            .unwrap_or_else(|| self.config.resolved_model().to_string());
        let body = self.build_body(&prompt, &options, &model);
        let api_key = self.config.api_key.as_deref().unwrap_or_default();

        debug!("POST {} (model={})", self.endpoint, model);
        let request = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .timeout(options.timeout);

        let data = post_json(request, &body, error_message)
            .await
            .map_err(|failure| AIError::classified(&self.config.name, failure))?;

        let content = data["output"]["choices"][0]["message"]["content"]
            .as_str()
            .or_else(|| data["output"]["text"].as_str())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                AIError::new(
                    AIErrorKind::InvalidResponse,
                    &self.config.name,
                    "Empty response from Qwen API",
                )
                .with_status(200)
            })?;

        let mut metadata = HashMap::new();
        if let Some(request_id) = data["request_id"].as_str() {
            metadata.insert("request_id".to_string(), json!(request_id));
        }

        Ok(GenerateResult {
            content: content.to_string(),
            model,
            provider: self.config.name.clone(),
            usage: TokenUsage {
                prompt_tokens: data["usage"]["input_tokens"].as_u64(),
                completion_tokens: data["usage"]["output_tokens"].as_u64(),
                total_tokens: data["usage"]["total_tokens"].as_u64(),
            },
            metadata,
        })
    }
}

fn error_message(body: &serde_json::Value) -> Option<String> {
    let message = body["message"].as_str()?;
    Some(match body["code"].as_str() {
        Some(code) => format!("{}: {}", code, message),
        None => message.to_string(),
    })
}

impl AIProvider for QwenProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn is_available(&self) -> bool {
        self.config.enabled && self.config.has_credentials()
    }

    fn generate(
        &self,
        prompt: String,
        options: GenerateOptions,
    ) -> BoxFuture<'_, Result<GenerateResult, AIError>> {
        Box::pin(async move {
            if !self.is_available() {
                return Err(AIError::unavailable(&self.config.name));
            }

            match self.call(prompt, options).await {
                Ok(result) => {
                    self.state.clear_error().await;
                    Ok(result)
                }
                Err(error) => {
                    self.state.record_error(&error).await;
                    Err(error)
                }
            }
        })
    }

    fn get_status(&self) -> BoxFuture<'_, ProviderStatus> {
        Box::pin(async move { self.state.status(&self.config, self.is_available()).await })
    }
}
