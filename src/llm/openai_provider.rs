//! OpenAI-compatible chat-completions provider.
//!
//! Serves both the `openai` and `deepseek` kinds: the two differ only in
//! base URL and model. Structured output is requested with
//! `response_format = json_object`; since that mode takes no schema, the
//! schema's required fields are spelled out in the user prompt instead.

use crate::llm::error::{AIError, AIErrorKind, ProviderSetupError};
use crate::llm::provider::{
    AIProvider, ProviderState, build_http_client, normalize_base_url, post_json,
};
use crate::llm::types::{GenerateOptions, GenerateResult, ProviderConfig, ProviderStatus, TokenUsage};
use futures::future::BoxFuture;
use serde_json::json;
use std::collections::HashMap;
use tracing::debug;

pub struct OpenAICompatibleProvider {
    config: ProviderConfig,
    client: reqwest::Client,
    endpoint: String,
    state: ProviderState,
}

impl OpenAICompatibleProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderSetupError> {
        let base = normalize_base_url(&config)?;
        Ok(Self {
            endpoint: format!("{}/chat/completions", base),
            client: build_http_client()?,
            config,
            state: ProviderState::default(),
        })
    }

    fn build_body(&self, prompt: &str, options: &GenerateOptions, model: &str) -> serde_json::Value {
        let mut messages = Vec::new();
        if let Some(system) = options.system_prompt.as_deref().filter(|s| !s.trim().is_empty()) {
            messages.push(json!({ "role": "system", "content": system }));
        }

        let user_content = match (&options.schema, options.wants_structured_json()) {
            (Some(schema), true) => embed_schema_requirements(prompt, schema),
            _ => prompt.to_string(),
        };
        messages.push(json!({ "role": "user", "content": user_content }));

        let mut body = json!({
            "model": model,
            "messages": messages,
            "temperature": options.temperature.unwrap_or(self.config.options.temperature),
            "max_tokens": options.max_tokens.unwrap_or(self.config.options.max_tokens),
        });
        if options.wants_structured_json() {
            body["response_format"] = json!({ "type": "json_object" });
        }
        body
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

        let choice = &data["choices"][0];
        let content = choice["message"]["content"]
            .as_str()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                AIError::new(
                    AIErrorKind::InvalidResponse,
                    &self.config.name,
                    format!("Empty response from {} API", self.config.name),
                )
                .with_status(200)
            })?;

        let mut metadata = HashMap::new();
        if let Some(reason) = choice["finish_reason"].as_str() {
            metadata.insert("finish_reason".to_string(), json!(reason));
        }

        Ok(GenerateResult {
            content: content.to_string(),
            model,
            provider: self.config.name.clone(),
            usage: TokenUsage {
                prompt_tokens: data["usage"]["prompt_tokens"].as_u64(),
                completion_tokens: data["usage"]["completion_tokens"].as_u64(),
                total_tokens: data["usage"]["total_tokens"].as_u64(),
            },
            metadata,
        })
    }
}

fn error_message(body: &serde_json::Value) -> Option<String> {
    body["error"]["message"]
        .as_str()
        .or_else(|| body["message"].as_str())
        .map(str::to_string)
}

/// Append the schema's required field names (with descriptions) to the prompt.
fn embed_schema_requirements(prompt: &str, schema: &serde_json::Value) -> String {
    let required: Vec<&str> = schema["required"]
        .as_array()
        .map(|fields| fields.iter().filter_map(|f| f.as_str()).collect())
        .unwrap_or_default();

    let field_lines = required
        .iter()
        .map(|field| {
            let description = schema["properties"][*field]["description"]
                .as_str()
                .unwrap_or("required");
            format!("- \"{}\": {}", field, description)
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{}\n\nIMPORTANT: Return a valid JSON object with these exact field names:\n{}\n\n\
         The JSON must use these exact field names: {}.\n\
         Do NOT use alternative names like \"sentence\" or \"mainClauseStructure\".",
        prompt,
        field_lines,
        required.join(", ")
    )
}

impl AIProvider for OpenAICompatibleProvider {
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
