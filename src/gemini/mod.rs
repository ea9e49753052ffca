pub mod dto;

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, Url};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::llm::{GenerativeClient, ModelInfo, Prompt, excerpt};

/// Tried in order after the last successful model and `GEMINI_MODEL`.
pub const MODEL_FALLBACK_LIST: &[&str] = &[
    "gemini-2.0-flash",
    "gemini-1.5-flash-latest",
    "gemini-1.5-flash",
    "gemini-1.5-pro-latest",
    "gemini-pro",
];

const MAX_MODEL_PAGES: usize = 10;

#[derive(Clone, Debug)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub preferred_model: Option<String>,
    pub timeout: Duration,
}

/// Ordered model attempts that remember which model answered last.
pub struct ModelSelector {
    candidates: Vec<String>,
    last_success: Mutex<Option<String>>,
}

impl ModelSelector {
    pub fn new(preferred: Option<String>) -> Self {
        let mut candidates: Vec<String> = Vec::new();
        for name in preferred
            .into_iter()
            .chain(MODEL_FALLBACK_LIST.iter().map(|m| m.to_string()))
        {
            let name = normalize_model_name(&name).to_string();
            if !candidates.contains(&name) {
                candidates.push(name);
            }
        }
        Self {
            candidates,
            last_success: Mutex::new(None),
        }
    }

    pub async fn attempt_order(&self) -> Vec<String> {
        let last = self.last_success.lock().await.clone();
        let mut order = Vec::with_capacity(self.candidates.len() + 1);
        if let Some(last) = last {
            order.push(last);
        }
        for name in &self.candidates {
            if !order.contains(name) {
                order.push(name.clone());
            }
        }
        order
    }

    pub async fn record_success(&self, model: &str) {
        let mut last = self.last_success.lock().await;
        if last.as_deref() != Some(model) {
            info!("[Gemini] selected model {}", model);
            *last = Some(model.to_string());
        }
    }

    pub async fn selected(&self) -> Option<String> {
        self.last_success.lock().await.clone()
    }
}

/// Accepts both `gemini-pro` and `models/gemini-pro`.
pub fn normalize_model_name(name: &str) -> &str {
    let name = name.trim();
    name.strip_prefix("models/").unwrap_or(name)
}

static MODEL_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-][A-Za-z0-9._-]*$").expect("valid regex"));

/// Model names end up in the request path, so only plain identifiers are allowed.
pub fn is_valid_model_name(name: &str) -> bool {
    MODEL_NAME.is_match(normalize_model_name(name))
}

pub struct GeminiHttpClient {
    client: Client,
    config: GeminiConfig,
    selector: ModelSelector,
}

impl GeminiHttpClient {
    pub fn new(config: GeminiConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build http client: {}", e)))?;
        let selector = ModelSelector::new(config.preferred_model.clone());
        Ok(Self {
            client,
            config,
            selector,
        })
    }

    fn endpoint(&self, path: &str, extra: &[(&str, &str)]) -> Result<Url, AppError> {
        let base = self.config.base_url.trim_end_matches('/');
        let mut params: Vec<(&str, &str)> = vec![("key", self.config.api_key.as_str())];
        params.extend_from_slice(extra);
        Url::parse_with_params(&format!("{}/v1beta/{}", base, path), &params)
            .map_err(|e| AppError::Config(format!("Invalid GEMINI_BASE_URL: {}", e)))
    }

    async fn generate_with_model(&self, model: &str, prompt: &Prompt) -> Result<String, AppError> {
        let url = self.endpoint(&format!("models/{}:generateContent", model), &[])?;

        let request_body = dto::GenerateContentRequest {
            contents: vec![dto::Content {
                role: Some("user".to_string()),
                parts: vec![dto::Part {
                    text: Some(prompt.user.clone()),
                }],
            }],
            system_instruction: prompt.system.as_ref().map(|system| dto::Content {
                role: None,
                parts: vec![dto::Part {
                    text: Some(system.clone()),
                }],
            }),
            generation_config: Some(dto::GenerationConfig {
                temperature: prompt.temperature,
                response_mime_type: prompt
                    .expects_json
                    .then(|| "application/json".to_string()),
            }),
        };

        let response = self.client.post(url).json(&request_body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "Gemini API error {} for {}: {}",
                status,
                model,
                excerpt(&body, 300)
            )));
        }

        let parsed: dto::GenerateContentResponse = response.json().await?;
        parsed.text().ok_or_else(|| {
            let reason = parsed
                .candidates
                .first()
                .and_then(|c| c.finish_reason.clone())
                .unwrap_or_else(|| "no candidates".to_string());
            AppError::Upstream(format!("Empty response from {} ({})", model, reason))
        })
    }
}

#[async_trait]
impl GenerativeClient for GeminiHttpClient {
    fn provider(&self) -> &'static str {
        "gemini"
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String, AppError> {
        let mut last_error = None;

        for model in self.selector.attempt_order().await {
            debug!("[Gemini] trying model {}", model);
            match self.generate_with_model(&model, prompt).await {
                Ok(text) => {
                    self.selector.record_success(&model).await;
                    return Ok(text);
                }
                Err(e) => {
                    warn!("[Gemini] model {} failed: {}", model, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AppError::Upstream("No Gemini models to try".to_string())))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, AppError> {
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_MODEL_PAGES {
            let mut extra = vec![("pageSize", "1000")];
            if let Some(token) = page_token.as_deref() {
                extra.push(("pageToken", token));
            }
            let url = self.endpoint("models", &extra)?;

            let response = self.client.get(url).send().await?;
            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(AppError::Upstream(format!(
                    "Gemini list models error {}: {}",
                    status,
                    excerpt(&body, 300)
                )));
            }

            let page: dto::ListModelsResponse = response.json().await?;
            models.extend(page.models.into_iter().map(ModelInfo::from));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(models)
    }

    async fn try_model(&self, name: &str, prompt: &Prompt) -> Result<String, AppError> {
        if !is_valid_model_name(name) {
            return Err(AppError::BadRequest(format!("Invalid model name {:?}", name)));
        }
        self.generate_with_model(normalize_model_name(name), prompt).await
    }

    async fn selected_model(&self) -> Option<String> {
        self.selector.selected().await
    }
}
