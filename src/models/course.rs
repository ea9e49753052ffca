use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub topic: String,
    pub modules: Vec<Module>,
    #[serde(default)]
    pub project_ideas: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<CourseMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_lesson: Option<LessonRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub title: String,
    pub lessons: Vec<Lesson>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: String,
    pub title: String,
    pub video_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: LessonType,
    pub notes: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LessonType {
    Free,
    Paid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonRef {
    pub module_index: usize,
    pub lesson_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseMeta {
    pub difficulty: Difficulty,
    pub length: CourseLength,
    pub source: CourseSource,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn describe(self) -> &'static str {
        match self {
            Difficulty::Beginner => "a complete beginner with no prior knowledge",
            Difficulty::Intermediate => "a learner who already knows the fundamentals",
            Difficulty::Advanced => "an experienced practitioner looking for depth",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseLength {
    #[default]
    Short,
    Medium,
    Long,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseSource {
    Ai,
    Fallback,
}

impl Course {
    pub fn lesson(&self, at: LessonRef) -> Option<&Lesson> {
        self.modules
            .get(at.module_index)
            .and_then(|m| m.lessons.get(at.lesson_index))
    }

    pub fn lesson_mut(&mut self, at: LessonRef) -> Option<&mut Lesson> {
        self.modules
            .get_mut(at.module_index)
            .and_then(|m| m.lessons.get_mut(at.lesson_index))
    }

    pub fn lessons(&self) -> impl Iterator<Item = &Lesson> {
        self.modules.iter().flat_map(|m| m.lessons.iter())
    }

    pub fn total_lessons(&self) -> usize {
        self.lessons().count()
    }

    pub fn completed_lessons(&self) -> usize {
        self.lessons().filter(|l| l.completed).count()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateOptions {
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub length: CourseLength,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateCourseRequest {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub options: Option<GenerateOptions>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteLessonRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    /// Absent means the user's most recently updated course.
    #[serde(default)]
    pub course_id: Option<String>,
    pub module_index: usize,
    pub lesson_index: usize,
    #[serde(default = "default_true")]
    pub completed: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLessonVideoRequest {
    pub module_index: usize,
    pub lesson_index: usize,
    pub video: String,
}
