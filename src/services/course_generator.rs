use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::llm::{GenerativeClient, Prompt};
use crate::models::{Course, CourseMeta, CourseSource, Difficulty, GenerateOptions, LessonRef};
use crate::services::course_shape::{Tier, fallback_course, normalize_course};
use crate::services::enrichment::enrich_course;
use crate::services::json_repair::{JsonShape, repair_json};
use crate::youtube::{NoopVideoSearch, VideoSearch};

pub const MAX_TOPIC_CHARS: usize = 200;

pub struct CourseGenerator {
    ai: Arc<dyn GenerativeClient>,
    videos: Arc<dyn VideoSearch>,
    enrich_videos: bool,
}

impl CourseGenerator {
    pub fn new(ai: Arc<dyn GenerativeClient>, videos: Arc<dyn VideoSearch>, enrich_videos: bool) -> Self {
        Self { ai, videos, enrich_videos }
    }

    /// Generates a course; model failures degrade to the canned course, never to an error.
    pub async fn generate(&self, topic: &str, options: &GenerateOptions) -> Course {
        let tier = Tier::for_length(options.length);
        info!("Generating course for topic {:?} ({:?}, {:?})", topic, options.difficulty, options.length);

        let (mut course, source) = match self.generate_with_ai(topic, options.difficulty, tier).await {
            Ok(course) => (course, CourseSource::Ai),
            Err(e) => {
                warn!("Course generation fell back to canned content: {}", e);
                (fallback_course(topic, tier), CourseSource::Fallback)
            }
        };

        if self.enrich_videos {
            enrich_course(&mut course, self.videos.as_ref()).await;
        } else {
            enrich_course(&mut course, &NoopVideoSearch).await;
        }

        let now = Utc::now().to_rfc3339();
        course.id = Uuid::new_v4().to_string();
        course.meta = Some(CourseMeta {
            difficulty: options.difficulty,
            length: options.length,
            source,
        });
        course.active_lesson = Some(LessonRef {
            module_index: 0,
            lesson_index: 0,
        });
        course.created_at = Some(now.clone());
        course.updated_at = Some(now);
        course
    }

    async fn generate_with_ai(
        &self,
        topic: &str,
        difficulty: Difficulty,
        tier: Tier,
    ) -> Result<Course, AppError> {
        if !self.ai.is_configured() {
            return Err(AppError::Config("GEMINI_API_KEY is not set".to_string()));
        }

        let prompt = Prompt::new(build_course_prompt(topic, difficulty, tier)).expecting_json();
        let text = self.ai.generate(&prompt).await?;
        let value = repair_json(&text, JsonShape::Object)?;
        info!("Successfully received and parsed course from {}", self.ai.provider());
        Ok(normalize_course(&value, topic, tier))
    }
}

/// Validates and trims a user-supplied topic.
pub fn clean_topic(raw: Option<&str>) -> Result<String, AppError> {
    let topic = raw.map(str::trim).unwrap_or_default();
    if topic.is_empty() {
        return Err(AppError::BadRequest("Topic is required".to_string()));
    }
    if topic.chars().count() > MAX_TOPIC_CHARS {
        return Err(AppError::BadRequest(format!(
            "Topic must be at most {} characters",
            MAX_TOPIC_CHARS
        )));
    }
    Ok(topic.split_whitespace().collect::<Vec<_>>().join(" "))
}

pub fn build_course_prompt(topic: &str, difficulty: Difficulty, tier: Tier) -> String {
    let topic = topic.replace('"', "'");
    let free_count = tier.total_lessons().div_ceil(2);

    let mut lesson_number = 0;
    let modules: Vec<String> = (1..=tier.modules)
        .map(|m| {
            let lessons: Vec<String> = (1..=tier.lessons_per_module)
                .map(|_| {
                    lesson_number += 1;
                    let kind = if lesson_number <= free_count { "free" } else { "paid" };
                    format!(
                        r#"        {{ "id": "l{n}", "title": "Lesson {n} Title", "videoId": "YOUTUBE_VIDEO_ID_{n}", "type": "{kind}", "notes": "HTML notes for lesson {n}..." }}"#,
                        n = lesson_number,
                        kind = kind,
                    )
                })
                .collect();
            format!(
                "    {{\n      \"title\": \"Module {m}: Descriptive Title\",\n      \"lessons\": [\n{}\n      ]\n    }}",
                lessons.join(",\n"),
            )
        })
        .collect();

    format!(
        r#"You are an expert instructional designer tasked with creating a mini-course from YouTube videos.
The user wants to learn about: "{topic}".
The learner is {audience}.

Your task is to generate a JSON object representing a course with exactly {module_count} modules. Each module must contain exactly {lesson_count} lessons.
For each lesson, suggest a relevant, real and embeddable YouTube video id, or use null if you are not certain one exists.
For each lesson, also write brief, helpful, introductory notes in HTML format. Use headings, paragraphs, lists and bold tags.
Finish with a "projectIdeas" HTML block describing one or two hands-on projects relevant to the topic.

The final output MUST be a single, valid JSON object. Do not include any text or formatting before or after the JSON object.
The JSON object must follow this exact structure:
{{
  "id": "ai-generated-course",
  "title": "Course Title About the Topic",
  "modules": [
{modules}
  ],
  "projectIdeas": "<h3>Project Idea Title</h3><p>A paragraph describing a project idea relevant to the topic.</p>"
}}"#,
        topic = topic,
        audience = difficulty.describe(),
        module_count = tier.modules,
        lesson_count = tier.lessons_per_module,
        modules = modules.join(",\n"),
    )
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::llm::NoopGenerativeClient;
    use crate::models::CourseLength;

    struct CannedClient(String);

    #[async_trait]
    impl GenerativeClient for CannedClient {
        fn provider(&self) -> &'static str {
            "canned"
        }

        async fn generate(&self, _prompt: &Prompt) -> Result<String, AppError> {
            Ok(self.0.clone())
        }
    }

    fn generator(ai: Arc<dyn GenerativeClient>) -> CourseGenerator {
        CourseGenerator::new(ai, Arc::new(NoopVideoSearch), true)
    }

    #[test]
    fn test_clean_topic() {
        assert_eq!(clean_topic(Some("  Rust   ownership ")).unwrap(), "Rust ownership");
        assert!(matches!(clean_topic(None), Err(AppError::BadRequest(_))));
        assert!(matches!(clean_topic(Some("   ")), Err(AppError::BadRequest(_))));
        assert!(matches!(clean_topic(Some("x".repeat(201).as_str())), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_prompt_describes_requested_shape() {
        let prompt = build_course_prompt("Rust \"fast\"", Difficulty::Advanced, Tier::for_length(CourseLength::Medium));
        assert!(prompt.contains("learn about: \"Rust 'fast'\""));
        assert!(prompt.contains("exactly 3 modules"));
        assert!(prompt.contains("exactly 4 lessons"));
        assert!(prompt.contains("\"id\": \"l12\""));
        assert!(!prompt.contains("\"id\": \"l13\""));
        assert!(prompt.contains("experienced practitioner"));
        assert!(prompt.contains("projectIdeas"));
    }

    #[tokio::test]
    async fn test_fenced_ai_output_is_used() {
        let raw = "```json\n{\"title\": \"Sourdough Basics\", \"modules\": [{\"title\": \"Module 1: Starter\", \"lessons\": [{\"title\": \"Feeding\", \"type\": \"free\", \"notes\": \"<p>feed</p>\"}]}]}\n```";
        let course = generator(Arc::new(CannedClient(raw.to_string())))
            .generate("Sourdough", &GenerateOptions::default())
            .await;

        assert_eq!(course.title, "Sourdough Basics");
        assert_eq!(course.meta.as_ref().unwrap().source, CourseSource::Ai);
        assert_eq!(course.modules.len(), 2);
        assert!(course.modules.iter().all(|m| m.lessons.len() == 3));
        assert!(course.lessons().all(|l| l.video_id.is_some()));
        assert!(Uuid::parse_str(&course.id).is_ok());
        assert_eq!(course.active_lesson, Some(LessonRef { module_index: 0, lesson_index: 0 }));
    }

    #[tokio::test]
    async fn test_garbage_output_falls_back() {
        let course = generator(Arc::new(CannedClient("I'm sorry, I can't do that.".to_string())))
            .generate("Sourdough", &GenerateOptions { difficulty: Difficulty::Beginner, length: CourseLength::Long })
            .await;

        assert_eq!(course.title, "Introduction to Sourdough");
        assert_eq!(course.meta.as_ref().unwrap().source, CourseSource::Fallback);
        assert_eq!(course.modules.len(), 4);
        assert_eq!(course.total_lessons(), 20);
    }

    #[tokio::test]
    async fn test_missing_key_falls_back() {
        let course = generator(Arc::new(NoopGenerativeClient::new("GEMINI_API_KEY")))
            .generate("Sourdough", &GenerateOptions::default())
            .await;
        assert_eq!(course.meta.unwrap().source, CourseSource::Fallback);
        assert!(course.created_at.is_some());
    }
}
