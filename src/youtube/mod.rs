pub mod dto;

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, StatusCode, Url};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::llm::excerpt;

pub const QUOTA_COOLDOWN: Duration = Duration::from_secs(60 * 60);
pub const MAX_CACHED_QUERIES: usize = 512;

static VIDEO_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("valid regex"));

pub fn is_valid_video_id(candidate: &str) -> bool {
    VIDEO_ID.is_match(candidate)
}

/// Extracts a video id from a bare id or a youtube.com / youtu.be URL.
pub fn parse_video_reference(input: &str) -> Option<String> {
    let input = input.trim();
    if is_valid_video_id(input) {
        return Some(input.to_string());
    }

    let with_scheme = if input.contains("://") {
        input.to_string()
    } else {
        format!("https://{}", input)
    };
    let url = Url::parse(&with_scheme).ok()?;
    let host = url.host_str()?.trim_start_matches("www.").trim_start_matches("m.");

    let candidate = match host {
        "youtu.be" => url.path_segments()?.next().map(str::to_string),
        "youtube.com" | "youtube-nocookie.com" | "music.youtube.com" => {
            let mut segments = url.path_segments()?;
            match segments.next() {
                Some("watch") => url
                    .query_pairs()
                    .find(|(k, _)| k == "v")
                    .map(|(_, v)| v.into_owned()),
                Some("embed" | "shorts" | "live" | "v") => segments.next().map(str::to_string),
                _ => None,
            }
        }
        _ => None,
    }?;

    is_valid_video_id(&candidate).then_some(candidate)
}

#[async_trait]
pub trait VideoSearch: Send + Sync {
    fn is_configured(&self) -> bool {
        true
    }

    /// Best embeddable video for `query`, if any.
    async fn search_video(&self, query: &str) -> Result<Option<String>, AppError>;
}

/// Suppresses calls for a fixed window after the upstream reports quota exhaustion.
pub struct QuotaGuard {
    cooldown: Duration,
    until: Mutex<Option<Instant>>,
}

impl QuotaGuard {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            until: Mutex::new(None),
        }
    }

    pub async fn is_cooling_down(&self) -> bool {
        let mut until = self.until.lock().await;
        match *until {
            Some(deadline) if Instant::now() < deadline => true,
            Some(_) => {
                info!("[YouTube] quota cool-down elapsed");
                *until = None;
                false
            }
            None => false,
        }
    }

    pub async fn trip(&self) {
        warn!("[YouTube] quota exceeded; pausing searches for {:?}", self.cooldown);
        *self.until.lock().await = Some(Instant::now() + self.cooldown);
    }
}

/// Search hits by normalized query; the oldest entry is evicted once full.
pub struct QueryCache {
    capacity: usize,
    entries: HashMap<String, String>,
    order: VecDeque<String>,
}

impl QueryCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: String, video_id: String) {
        if self.entries.insert(key.clone(), video_id).is_some() {
            return;
        }
        self.order.push_back(key);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct YouTubeConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
    pub cooldown: Duration,
}

pub struct YouTubeHttpClient {
    client: Client,
    config: YouTubeConfig,
    cache: Mutex<QueryCache>,
    quota: QuotaGuard,
}

impl YouTubeHttpClient {
    pub fn new(config: YouTubeConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build http client: {}", e)))?;
        let quota = QuotaGuard::new(config.cooldown);
        Ok(Self {
            client,
            config,
            cache: Mutex::new(QueryCache::new(MAX_CACHED_QUERIES)),
            quota,
        })
    }

    fn search_url(&self, query: &str) -> Result<Url, AppError> {
        let base = self.config.base_url.trim_end_matches('/');
        Url::parse_with_params(
            &format!("{}/youtube/v3/search", base),
            &[
                ("part", "snippet"),
                ("type", "video"),
                ("videoEmbeddable", "true"),
                ("maxResults", "1"),
                ("q", query),
                ("key", self.config.api_key.as_str()),
            ],
        )
        .map_err(|e| AppError::Config(format!("Invalid YOUTUBE_BASE_URL: {}", e)))
    }
}

fn cache_key(query: &str) -> String {
    query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[async_trait]
impl VideoSearch for YouTubeHttpClient {
    async fn search_video(&self, query: &str) -> Result<Option<String>, AppError> {
        let key = cache_key(query);
        if let Some(hit) = self.cache.lock().await.get(&key) {
            debug!("[YouTube] cache hit for {:?}", key);
            return Ok(Some(hit.clone()));
        }

        if self.quota.is_cooling_down().await {
            return Err(AppError::QuotaExceeded(
                "YouTube search is cooling down after a quota error".to_string(),
            ));
        }

        let url = self.search_url(query)?;
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let envelope = serde_json::from_str::<dto::ErrorEnvelope>(&body).ok();
            let quota_hit = status == StatusCode::TOO_MANY_REQUESTS
                || (status == StatusCode::FORBIDDEN
                    && envelope.as_ref().is_some_and(|e| e.is_quota_error()));

            if quota_hit {
                self.quota.trip().await;
                return Err(AppError::QuotaExceeded(format!("YouTube API returned {}", status)));
            }

            let message = envelope
                .map(|e| e.error.message)
                .unwrap_or_else(|| excerpt(&body, 300));
            return Err(AppError::Upstream(format!("YouTube API error {}: {}", status, message)));
        }

        let parsed: dto::SearchResponse = response.json().await?;
        let video_id = parsed
            .items
            .into_iter()
            .filter_map(|item| item.id.video_id)
            .find(|id| is_valid_video_id(id));

        if let Some(id) = &video_id {
            self.cache.lock().await.insert(key, id.clone());
        }
        Ok(video_id)
    }
}

pub struct NoopVideoSearch;

#[async_trait]
impl VideoSearch for NoopVideoSearch {
    fn is_configured(&self) -> bool {
        false
    }

    async fn search_video(&self, _query: &str) -> Result<Option<String>, AppError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_video_id() {
        assert!(is_valid_video_id("rfscVS0vtbw"));
        assert!(is_valid_video_id("a-b_c1D2e3F"));
        assert!(!is_valid_video_id("YOUTUBE_VIDEO_ID_1"));
        assert!(!is_valid_video_id("short"));
        assert!(!is_valid_video_id("rfscVS0vtb!"));
    }

    #[test]
    fn test_parse_video_reference() {
        let id = Some("rfscVS0vtbw".to_string());
        assert_eq!(parse_video_reference("rfscVS0vtbw"), id);
        assert_eq!(parse_video_reference("https://www.youtube.com/watch?v=rfscVS0vtbw&t=42s"), id);
        assert_eq!(parse_video_reference("youtube.com/watch?v=rfscVS0vtbw"), id);
        assert_eq!(parse_video_reference("https://youtu.be/rfscVS0vtbw?si=abc"), id);
        assert_eq!(parse_video_reference("https://www.youtube.com/embed/rfscVS0vtbw"), id);
        assert_eq!(parse_video_reference("https://m.youtube.com/shorts/rfscVS0vtbw"), id);
        assert_eq!(parse_video_reference("https://vimeo.com/123456"), None);
        assert_eq!(parse_video_reference("https://www.youtube.com/watch?v=nope"), None);
        assert_eq!(parse_video_reference(""), None);
    }

    #[test]
    fn test_cache_key_normalizes_whitespace_and_case() {
        assert_eq!(cache_key("  Rust   Ownership\tBasics "), "rust ownership basics");
    }

    #[test]
    fn test_query_cache_evicts_oldest() {
        let mut cache = QueryCache::new(2);
        cache.insert("a".into(), "aaaaaaaaaaa".into());
        cache.insert("b".into(), "bbbbbbbbbbb".into());
        cache.insert("a".into(), "AAAAAAAAAAA".into());
        assert_eq!(cache.len(), 2);

        cache.insert("c".into(), "ccccccccccc".into());
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert_eq!(cache.get("b").map(String::as_str), Some("bbbbbbbbbbb"));
        assert_eq!(cache.get("c").map(String::as_str), Some("ccccccccccc"));
    }

    #[tokio::test]
    async fn test_quota_guard_cooldown() {
        let guard = QuotaGuard::new(QUOTA_COOLDOWN);
        assert!(!guard.is_cooling_down().await);
        guard.trip().await;
        assert!(guard.is_cooling_down().await);

        let expired = QuotaGuard::new(Duration::ZERO);
        expired.trip().await;
        assert!(!expired.is_cooling_down().await);
    }
}
