//! Gemini provider over the Generative Language REST API.
//!
//! Gemini accepts a native response schema, so structured output is requested
//! through `generationConfig.responseSchema` after converting the JSON schema
//! into Gemini's type-tag dialect.

use crate::llm::error::{AIError, AIErrorKind, ProviderSetupError};
use crate::llm::provider::{
    AIProvider, ProviderState, build_http_client, normalize_base_url, post_json,
};
use crate::llm::types::{
    GenerateOptions, GenerateResult, ProviderConfig, ProviderStatus, ResponseFormat, TokenUsage,
};
use futures::future::BoxFuture;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use tracing::debug;

pub struct GeminiProvider {
    config: ProviderConfig,
    client: reqwest::Client,
    base_url: String,
    state: ProviderState,
}

impl GeminiProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderSetupError> {
        Ok(Self {
            base_url: normalize_base_url(&config)?,
            client: build_http_client()?,
            config,
            state: ProviderState::default(),
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }

    fn build_body(&self, prompt: &str, options: &GenerateOptions) -> Value {
        let mime = match options.response_format {
            ResponseFormat::Json => "application/json",
            ResponseFormat::Text => "text/plain",
        };

        let mut generation_config = json!({
            "temperature": options.temperature.unwrap_or(self.config.options.temperature),
            "maxOutputTokens": options.max_tokens.unwrap_or(self.config.options.max_tokens),
            "responseMimeType": mime,
        });
        if let (Some(schema), true) = (&options.schema, options.wants_structured_json()) {
            generation_config["responseSchema"] = convert_schema(schema);
        }

        let mut body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": generation_config,
        });
        if let Some(system) = options.system_prompt.as_deref().filter(|s| !s.trim().is_empty()) {
            body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }
        body
    }

    async fn call(&self, prompt: String, options: GenerateOptions) -> Result<GenerateResult, AIError> {
        let model = options
            .model
            .clone()
            .unwrap_or_else(|| self.config.resolved_model().to_string());
        let body = self.build_body(&prompt, &options);
        let endpoint = self.endpoint(&model);
        let api_key = self.config.api_key.as_deref().unwrap_or_default();

        debug!("POST {}", endpoint);
        let request = self
            .client
            .post(&endpoint)
            .header("x-goog-api-key", api_key)
            .timeout(options.timeout);

        let data = post_json(request, &body, error_message)
            .await
            .map_err(|failure| AIError::classified(&self.config.name, failure))?;

        let content: String = data["candidates"][0]["content"]["parts"]
            .as_array()
            .map(|parts| parts.iter().filter_map(|p| p["text"].as_str()).collect())
            .unwrap_or_default();
        if content.is_empty() {
            return Err(AIError::new(
                AIErrorKind::InvalidResponse,
                &self.config.name,
                "Empty response from Gemini API",
            )
            .with_status(200));
        }

        let mut metadata = HashMap::new();
        if let Some(reason) = data["candidates"][0]["finishReason"].as_str() {
            metadata.insert("finish_reason".to_string(), json!(reason));
        }

        let usage = &data["usageMetadata"];
        Ok(GenerateResult {
            content,
            model,
            provider: self.config.name.clone(),
            usage: TokenUsage {
                prompt_tokens: usage["promptTokenCount"].as_u64(),
                completion_tokens: usage["candidatesTokenCount"].as_u64(),
                total_tokens: usage["totalTokenCount"].as_u64(),
            },
            metadata,
        })
    }
}

fn error_message(body: &Value) -> Option<String> {
    body["error"]["message"].as_str().map(str::to_string)
}

/// Convert a JSON schema into Gemini's schema format.
///
/// Only the top-level object's properties are carried over; unknown types
/// degrade to `STRING`.
pub fn convert_schema(schema: &Value) -> Value {
    let properties: Map<String, Value> = schema["properties"]
        .as_object()
        .map(|props| {
            props
                .iter()
                .map(|(key, value)| (key.clone(), convert_property(value)))
                .collect()
        })
        .unwrap_or_default();

    json!({ "type": "OBJECT", "properties": properties })
}

fn convert_property(prop: &Value) -> Value {
    match prop["type"].as_str() {
        Some("string") => json!({ "type": "STRING" }),
        Some("integer") | Some("number") => json!({ "type": "INTEGER" }),
        Some("boolean") => json!({ "type": "BOOLEAN" }),
        Some("array") => {
            let items = match prop.get("items") {
                Some(items) => convert_property(items),
                None => json!({ "type": "STRING" }),
            };
            json!({ "type": "ARRAY", "items": items })
        }
        Some("object") => {
            let properties: Map<String, Value> = prop["properties"]
                .as_object()
                .map(|props| {
                    props
                        .iter()
                        .map(|(key, value)| (key.clone(), convert_property(value)))
                        .collect()
                })
                .unwrap_or_default();
            json!({ "type": "OBJECT", "properties": properties })
        }
        _ => json!({ "type": "STRING" }),
    }
}

impl AIProvider for GeminiProvider {
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
