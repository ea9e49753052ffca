use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::warn;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::gemini::{GeminiConfig, GeminiHttpClient};
use crate::llm::{GenerativeClient, NoopGenerativeClient};
use crate::openai::{OpenAiConfig, OpenAiHttpClient};
use crate::services::{CourseGenerator, PremiumService, QuizService};
use crate::youtube::{NoopVideoSearch, QUOTA_COOLDOWN, VideoSearch, YouTubeConfig, YouTubeHttpClient};

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<AppConfig>,
    pub course_ai: Arc<dyn GenerativeClient>,
    pub courses: Arc<CourseGenerator>,
    pub quizzes: Arc<QuizService>,
    pub premium: Arc<PremiumService>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        config: AppConfig,
        course_ai: Arc<dyn GenerativeClient>,
        quiz_ai: Arc<dyn GenerativeClient>,
        videos: Arc<dyn VideoSearch>,
    ) -> Self {
        let courses = CourseGenerator::new(course_ai.clone(), videos, config.enrich_videos);
        Self {
            db,
            config: Arc::new(config),
            courses: Arc::new(courses),
            quizzes: Arc::new(QuizService::new(quiz_ai)),
            premium: Arc::new(PremiumService::new(course_ai.clone())),
            course_ai,
        }
    }

    /// Wires HTTP clients for every configured key and Noop clients for the rest.
    pub fn from_config(db: SqlitePool, config: AppConfig) -> Result<Self, AppError> {
        let course_ai: Arc<dyn GenerativeClient> = match &config.gemini_api_key {
            Some(key) => Arc::new(GeminiHttpClient::new(GeminiConfig {
                api_key: key.clone(),
                base_url: config.gemini_base_url.clone(),
                preferred_model: config.gemini_model.clone(),
                timeout: config.http_timeout,
            })?),
            None => {
                warn!("GEMINI_API_KEY is not set. The app will use fallback courses.");
                Arc::new(NoopGenerativeClient::new("GEMINI_API_KEY"))
            }
        };

        let quiz_ai: Arc<dyn GenerativeClient> = match &config.openai_api_key {
            Some(key) => Arc::new(OpenAiHttpClient::new(OpenAiConfig {
                api_key: key.clone(),
                base_url: config.openai_base_url.clone(),
                model: config.openai_model.clone(),
                timeout: config.http_timeout,
            })?),
            None => {
                warn!("OPENAI_API_KEY is not set. Quizzes will use fallback questions.");
                Arc::new(NoopGenerativeClient::new("OPENAI_API_KEY"))
            }
        };

        let videos: Arc<dyn VideoSearch> = match &config.youtube_api_key {
            Some(key) => Arc::new(YouTubeHttpClient::new(YouTubeConfig {
                api_key: key.clone(),
                base_url: config.youtube_base_url.clone(),
                timeout: config.http_timeout,
                cooldown: QUOTA_COOLDOWN,
            })?),
            None => {
                warn!("YT_API_KEY is not set. Lessons will use default videos.");
                Arc::new(NoopVideoSearch)
            }
        };

        Ok(Self::new(db, config, course_ai, quiz_ai, videos))
    }
}
