pub mod course;
pub mod premium;
pub mod quiz;
pub mod stats;

pub use course::{
    CompleteLessonRequest, Course, CourseLength, CourseMeta, CourseSource, Difficulty,
    GenerateCourseRequest, GenerateOptions, Lesson, LessonRef, LessonType, Module,
    UpdateLessonVideoRequest,
};
pub use premium::{
    PremiumSuggestion, PremiumSuggestionsRequest, PremiumSuggestionsResponse, SuggestionKind,
    SuggestionSource,
};
pub use quiz::{GenerateQuizRequest, QuizQuestion, QuizResponse, QuizSource};
pub use stats::{ActivityKind, FocusSessionRequest, UserStats};
