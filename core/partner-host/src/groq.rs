//! Groq chat-completions client for prompt evolution.

use std::time::Duration;

use partner_core::{ModelError, ModelRequest, SuggestionModel, SuggestionsConfig};
use serde::{Deserialize, Serialize};

pub const API_KEY_ENV: &str = "GROQ_API_KEY";
const REQUEST_TIMEOUT_SECS: u64 = 30;

pub struct GroqClient {
    api_key: Option<String>,
    config: SuggestionsConfig,
    client: reqwest::blocking::Client,
}

impl GroqClient {
    /// Reads the API key from `GROQ_API_KEY`; a blank value counts as unset.
    pub fn from_env(config: SuggestionsConfig) -> Self {
        let api_key = std::env::var(API_KEY_ENV)
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());
        Self::new(config, api_key)
    }

    pub fn new(config: SuggestionsConfig, api_key: Option<String>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|err| {
                tracing::warn!(error = %err, "Failed to build HTTP client; using defaults");
                reqwest::blocking::Client::new()
            });
        Self {
            api_key,
            config,
            client,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl SuggestionModel for GroqClient {
    fn complete(&self, request: &ModelRequest) -> Result<String, ModelError> {
        let api_key = self.api_key.as_ref().ok_or(ModelError::NotConfigured)?;

        let user_content = serde_json::to_string(request)
            .map_err(|err| ModelError::Malformed(format!("request encoding: {}", err)))?;

        let body = ChatCompletionRequest {
            model: &self.config.model,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: request.system_prompt(),
                },
                ChatMessage {
                    role: "user",
                    content: user_content,
                },
            ],
        };

        let response = self
            .client
            .post(format!(
                "{}/chat/completions",
                self.config.endpoint.trim_end_matches('/')
            ))
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .map_err(|err| ModelError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ModelError::Status(status.as_u16()));
        }

        let payload: ChatCompletionResponse = response
            .json()
            .map_err(|err| ModelError::Malformed(err.to_string()))?;

        Ok(payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default())
    }
}
