//! Chat-completions API client used for name cleaning and match judgment.
//!
//! Sends structured prompts and logs token usage on every call.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::config::LlmConfig;

pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ChatClient {
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
        })
    }

    /// Send a system + user message pair and return the text of the reply.
    #[instrument(skip(self, system_prompt, user_prompt))]
    pub async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<ChatResponse> {
        let request = ChatRequest {
            model: self.model.clone(),
            temperature: 0.0,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_prompt.to_string(),
                },
            ],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Chat API request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            bail!("Chat API error ({}): {}", status, error_body);
        }

        let api_response: ChatApiResponse = response
            .json()
            .await
            .context("Failed to parse chat API response")?;

        let text = api_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .unwrap_or_default();

        if text.trim().is_empty() {
            bail!("Chat API returned an empty completion");
        }

        let usage = api_response.usage.unwrap_or_default();
        info!(
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            model = %self.model,
            "Chat completion finished"
        );

        Ok(ChatResponse {
            text,
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
        })
    }
}

/// Parsed reply from a chat completion call.
#[derive(Debug)]
pub struct ChatResponse {
    pub text: String,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
}

// --- Request/Response Types ---

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatApiResponse {
    choices: Vec<ChatChoice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    prompt_tokens: i64,
    completion_tokens: i64,
}
