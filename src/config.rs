use std::env;
use std::time::Duration;

use crate::error::AppError;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_YOUTUBE_BASE_URL: &str = "https://www.googleapis.com";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: Option<String>,
    pub gemini_base_url: String,
    pub youtube_api_key: Option<String>,
    pub youtube_base_url: String,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub static_dir: Option<String>,
    pub http_timeout: Duration,
    pub enrich_videos: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            database_url: "sqlite://intellicourse.db".to_string(),
            gemini_api_key: None,
            gemini_model: None,
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            youtube_api_key: None,
            youtube_base_url: DEFAULT_YOUTUBE_BASE_URL.to_string(),
            openai_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            static_dir: None,
            http_timeout: Duration::from_secs(60),
            enrich_videos: true,
        }
    }
}

impl AppConfig {
    /// Reads the process environment. Call `dotenvy::dotenv()` first if a
    /// `.env` file should be honoured.
    pub fn new_from_env() -> Result<Self, AppError> {
        let defaults = Self::default();

        let port = match non_empty_var("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| AppError::Config(format!("PORT must be a port number, got {raw:?}")))?,
            None => defaults.port,
        };

        let http_timeout = match non_empty_var("HTTP_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| {
                    AppError::Config(format!("HTTP_TIMEOUT_SECS must be an integer, got {raw:?}"))
                })?,
            None => defaults.http_timeout,
        };

        let enrich_videos = match non_empty_var("ENRICH_VIDEOS") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                AppError::Config(format!("ENRICH_VIDEOS must be true or false, got {raw:?}"))
            })?,
            None => defaults.enrich_videos,
        };

        Ok(Self {
            host: non_empty_var("HOST").unwrap_or(defaults.host),
            port,
            database_url: non_empty_var("DATABASE_URL").unwrap_or(defaults.database_url),
            gemini_api_key: non_empty_var("GEMINI_API_KEY"),
            gemini_model: non_empty_var("GEMINI_MODEL"),
            gemini_base_url: non_empty_var("GEMINI_BASE_URL").unwrap_or(defaults.gemini_base_url),
            youtube_api_key: non_empty_var("YT_API_KEY"),
            youtube_base_url: non_empty_var("YOUTUBE_BASE_URL")
                .unwrap_or(defaults.youtube_base_url),
            openai_api_key: non_empty_var("OPENAI_API_KEY"),
            openai_base_url: non_empty_var("OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
            openai_model: non_empty_var("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            static_dir: non_empty_var("STATIC_DIR"),
            http_timeout,
            enrich_videos,
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Masks a secret for the debug endpoint: first 6 and last 4 characters.
pub fn mask_secret(value: Option<&str>) -> Option<String> {
    let value = value?;
    if value.is_empty() {
        return None;
    }
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 10 {
        return Some("***".to_string());
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    Some(format!("{head}...{tail}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret(None), None);
        assert_eq!(mask_secret(Some("")), None);
        assert_eq!(mask_secret(Some("short")), Some("***".to_string()));
        assert_eq!(
            mask_secret(Some("AIzaSyA6sBsV-UoWuO5Fbw4amyR3")),
            Some("AIzaSy...myR3".to_string())
        );
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
