use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PremiumSuggestion {
    pub title: String,
    pub description: String,
    pub kind: SuggestionKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionKind {
    Course,
    Book,
    Mentorship,
    Project,
    Certification,
}

impl SuggestionKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "course" => Some(Self::Course),
            "book" => Some(Self::Book),
            "mentorship" => Some(Self::Mentorship),
            "project" => Some(Self::Project),
            "certification" => Some(Self::Certification),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionSource {
    Ai,
    Fallback,
}

#[derive(Debug, Clone, Serialize)]
pub struct PremiumSuggestionsResponse {
    pub suggestions: Vec<PremiumSuggestion>,
    pub source: SuggestionSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PremiumSuggestionsRequest {
    #[serde(default)]
    pub topic: Option<String>,
}
