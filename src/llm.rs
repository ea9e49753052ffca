use async_trait::async_trait;
use serde::Serialize;

use crate::error::AppError;

/// A single request to a text model.
#[derive(Debug, Clone)]
pub struct Prompt {
    pub system: Option<String>,
    pub user: String,
    pub temperature: f32,
    /// Ask the provider for a JSON response body when it supports it.
    pub expects_json: bool,
}

impl Prompt {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            system: None,
            user: user.into(),
            temperature: 0.7,
            expects_json: false,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn expecting_json(mut self) -> Self {
        self.expects_json = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub supported_generation_methods: Vec<String>,
}

impl ModelInfo {
    pub fn supports_generate_content(&self) -> bool {
        self.supported_generation_methods
            .iter()
            .any(|m| m == "generateContent")
    }
}

#[async_trait]
pub trait GenerativeClient: Send + Sync {
    fn provider(&self) -> &'static str;

    /// False when no credentials were supplied and every call will fail.
    fn is_configured(&self) -> bool {
        true
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String, AppError>;

    async fn list_models(&self) -> Result<Vec<ModelInfo>, AppError> {
        Ok(Vec::new())
    }

    async fn try_model(&self, name: &str, _prompt: &Prompt) -> Result<String, AppError> {
        Err(AppError::BadRequest(format!(
            "{} does not support probing model {}",
            self.provider(),
            name
        )))
    }

    async fn selected_model(&self) -> Option<String> {
        None
    }
}

pub struct NoopGenerativeClient {
    missing_key: &'static str,
}

impl NoopGenerativeClient {
    pub fn new(missing_key: &'static str) -> Self {
        Self { missing_key }
    }
}

#[async_trait]
impl GenerativeClient for NoopGenerativeClient {
    fn provider(&self) -> &'static str {
        "none"
    }

    fn is_configured(&self) -> bool {
        false
    }

    async fn generate(&self, _prompt: &Prompt) -> Result<String, AppError> {
        Err(AppError::Config(format!("Missing {}", self.missing_key)))
    }
}

/// Shortens an upstream body for logs and error messages.
pub(crate) fn excerpt(body: &str, max_chars: usize) -> String {
    let mut chars = body.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}
