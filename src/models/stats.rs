use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Lesson,
    Focus,
}

impl ActivityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityKind::Lesson => "lesson",
            ActivityKind::Focus => "focus",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub courses: usize,
    pub total_lessons: usize,
    pub completed_lessons: usize,
    pub progress_percent: u8,
    pub current_streak: u32,
    pub longest_streak: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_active_day: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusSessionRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default = "default_focus_minutes")]
    pub minutes: u32,
}

fn default_focus_minutes() -> u32 {
    25
}
