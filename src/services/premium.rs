use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::error::AppError;
use crate::llm::{GenerativeClient, Prompt};
use crate::models::{PremiumSuggestion, PremiumSuggestionsResponse, SuggestionKind, SuggestionSource};
use crate::services::json_repair::{JsonShape, repair_json};

const MAX_SUGGESTIONS: usize = 3;

pub struct PremiumService {
    ai: Arc<dyn GenerativeClient>,
}

impl PremiumService {
    pub fn new(ai: Arc<dyn GenerativeClient>) -> Self {
        Self { ai }
    }

    pub async fn suggest(&self, topic: &str) -> PremiumSuggestionsResponse {
        let result = if self.ai.is_configured() {
            self.suggest_with_ai(topic).await
        } else {
            Err(AppError::Config("No generative model configured".to_string()))
        };

        match result {
            Ok(suggestions) => PremiumSuggestionsResponse {
                suggestions,
                source: SuggestionSource::Ai,
                reason: None,
            },
            Err(e) => {
                warn!("Premium suggestions fell back to canned list: {}", e);
                PremiumSuggestionsResponse {
                    suggestions: fallback_suggestions(topic),
                    source: SuggestionSource::Fallback,
                    reason: Some(e.to_string()),
                }
            }
        }
    }

    async fn suggest_with_ai(&self, topic: &str) -> Result<Vec<PremiumSuggestion>, AppError> {
        let prompt = Prompt::new(build_premium_prompt(topic)).expecting_json();
        let raw = self.ai.generate(&prompt).await?;
        parse_suggestions(&raw)
    }
}

pub fn build_premium_prompt(topic: &str) -> String {
    format!(
        r#"A learner just finished a free mini-course about "{topic}".
Suggest {count} premium next steps that would deepen their skills.
Respond with ONLY a JSON array. Each item must be an object with the keys
"title" (string), "description" (one or two sentences) and
"kind" (one of "course", "book", "mentorship", "project", "certification")."#,
        topic = topic.replace('"', "'"),
        count = MAX_SUGGESTIONS,
    )
}

/// Keeps well-formed items; an unknown kind becomes `course`.
pub fn parse_suggestions(raw: &str) -> Result<Vec<PremiumSuggestion>, AppError> {
    let value = repair_json(raw, JsonShape::Array)?;
    let suggestions: Vec<PremiumSuggestion> = value
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or(&[])
        .iter()
        .filter_map(read_suggestion)
        .take(MAX_SUGGESTIONS)
        .collect();

    if suggestions.is_empty() {
        return Err(AppError::MalformedOutput("No usable suggestions in model output".to_string()));
    }
    Ok(suggestions)
}

fn read_suggestion(item: &Value) -> Option<PremiumSuggestion> {
    let text = |key: &str| {
        item.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    Some(PremiumSuggestion {
        title: text("title")?,
        description: text("description")?,
        kind: text("kind")
            .and_then(|k| SuggestionKind::parse(&k))
            .unwrap_or(SuggestionKind::Course),
    })
}

pub fn fallback_suggestions(topic: &str) -> Vec<PremiumSuggestion> {
    vec![
        PremiumSuggestion {
            title: format!("{} Masterclass", topic),
            description: format!(
                "A structured, in-depth course that takes your {} skills from fundamentals to confident practice.",
                topic
            ),
            kind: SuggestionKind::Course,
        },
        PremiumSuggestion {
            title: format!("1:1 {} Mentorship", topic),
            description: "Weekly sessions with an experienced mentor who reviews your work and unblocks you."
                .to_string(),
            kind: SuggestionKind::Mentorship,
        },
        PremiumSuggestion {
            title: format!("Guided {} Capstone Project", topic),
            description: "Build a portfolio-ready project with milestones, feedback and a final review."
                .to_string(),
            kind: SuggestionKind::Project,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_suggestions_filters_bad_items() {
        let raw = r#"```json
        [
            {"title": "Rust for Pros", "description": "Deep dive.", "kind": "Book"},
            {"title": "", "description": "missing title"},
            {"title": "Rust Mentor", "description": "Pair sessions.", "kind": "guru"},
        ]
        ```"#;
        let suggestions = parse_suggestions(raw).unwrap();
        assert_eq!(suggestions.len(), 2);
        assert_eq!(suggestions[0].kind, SuggestionKind::Book);
        assert_eq!(suggestions[1].kind, SuggestionKind::Course);
    }

    #[test]
    fn test_parse_suggestions_rejects_empty() {
        assert!(parse_suggestions("[]").is_err());
        assert!(parse_suggestions("no idea").is_err());
    }

    #[test]
    fn test_fallback_mentions_topic() {
        let suggestions = fallback_suggestions("Watercolor");
        assert_eq!(suggestions.len(), MAX_SUGGESTIONS);
        assert!(suggestions[0].title.contains("Watercolor"));
    }
}
