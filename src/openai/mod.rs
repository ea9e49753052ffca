pub mod dto;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::AppError;
use crate::llm::{GenerativeClient, Prompt, excerpt};

#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

pub struct OpenAiHttpClient {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiHttpClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build http client: {}", e)))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl GenerativeClient for OpenAiHttpClient {
    fn provider(&self) -> &'static str {
        "openai"
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String, AppError> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &prompt.system {
            messages.push(dto::Message::system(system.clone()));
        }
        messages.push(dto::Message::user(prompt.user.clone()));

        let request_body = dto::ChatCompletionRequest {
            model: self.config.model.clone(),
            messages,
            temperature: prompt.temperature,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<dto::ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| excerpt(&body, 300));
            return Err(AppError::Upstream(format!("OpenAI API error {}: {}", status, message)));
        }

        let parsed: dto::ChatCompletionResponse = response.json().await?;
        parsed
            .content()
            .ok_or_else(|| AppError::Upstream("Empty response from model".to_string()))
    }
}
