//! Normalises model output into a [`Course`] of the requested tier.
//!
//! The model is asked for an exact shape but rarely delivers one. Reading is
//! lenient: any field of the wrong type counts as missing and is regenerated.

use serde_json::Value;

use crate::models::{Course, CourseLength, Lesson, LessonType, Module};
use crate::youtube::is_valid_video_id;

/// Module and lesson counts for a length option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tier {
    pub modules: usize,
    pub lessons_per_module: usize,
}

impl Tier {
    pub fn for_length(length: CourseLength) -> Self {
        match length {
            CourseLength::Short => Tier { modules: 2, lessons_per_module: 3 },
            CourseLength::Medium => Tier { modules: 3, lessons_per_module: 4 },
            CourseLength::Long => Tier { modules: 4, lessons_per_module: 5 },
        }
    }

    pub fn total_lessons(self) -> usize {
        self.modules * self.lessons_per_module
    }
}

const MODULE_FOCUS: &[&str] = &[
    "Foundations",
    "Core Concepts",
    "Practical Techniques",
    "Applied Projects",
    "Advanced Topics",
];

const LESSON_FOCUS: &[&str] = &[
    "Overview",
    "Key Ideas",
    "Hands-on Practice",
    "Common Pitfalls",
    "Review and Next Steps",
];

struct DraftLesson {
    title: String,
    notes: String,
    video_id: Option<String>,
    kind: Option<LessonType>,
}

/// Builds a course of exactly `tier` shape from lenient JSON.
///
/// The returned course has an empty `id` and no timestamps; the caller stamps those.
pub fn normalize_course(value: &Value, topic: &str, tier: Tier) -> Course {
    let title = str_field(value, "title").unwrap_or_else(|| default_title(topic));

    let raw_modules = array_field(value, "modules");

    let mut drafts: Vec<(String, Vec<DraftLesson>)> = Vec::with_capacity(tier.modules);
    for module_index in 0..tier.modules {
        let raw = raw_modules.get(module_index);
        let module_title = match raw {
            Some(m) => str_field(m, "title").unwrap_or_else(|| format!("Module {}", module_index + 1)),
            None => placeholder_module_title(module_index, topic),
        };

        let raw_lessons = raw.map(|m| array_field(m, "lessons")).unwrap_or(&[]);
        let lessons = (0..tier.lessons_per_module)
            .map(|lesson_index| match raw_lessons.get(lesson_index) {
                Some(raw_lesson) => read_lesson(raw_lesson, lesson_index, topic),
                None => placeholder_lesson(lesson_index, &module_title, topic),
            })
            .collect();

        drafts.push((module_title, lessons));
    }

    let total = tier.total_lessons();
    let free_count = total.div_ceil(2);
    let mut position = 0;
    let modules = drafts
        .into_iter()
        .map(|(title, lessons)| Module {
            title,
            lessons: lessons
                .into_iter()
                .map(|draft| {
                    let kind = draft.kind.unwrap_or(if position < free_count {
                        LessonType::Free
                    } else {
                        LessonType::Paid
                    });
                    position += 1;
                    Lesson {
                        id: format!("l{}", position),
                        title: draft.title,
                        video_id: draft.video_id,
                        kind,
                        notes: draft.notes,
                        completed: false,
                    }
                })
                .collect(),
        })
        .collect();

    let project_ideas =
        str_field(value, "projectIdeas").unwrap_or_else(|| default_project_ideas(topic));

    Course {
        id: String::new(),
        title,
        topic: topic.to_string(),
        modules,
        project_ideas,
        meta: None,
        active_lesson: None,
        created_at: None,
        updated_at: None,
    }
}

/// The canned course used whenever generation fails.
pub fn fallback_course(topic: &str, tier: Tier) -> Course {
    normalize_course(&Value::Null, topic, tier)
}

fn read_lesson(raw: &Value, lesson_index: usize, topic: &str) -> DraftLesson {
    let title = str_field(raw, "title").unwrap_or_else(|| format!("Lesson {}", lesson_index + 1));
    let notes = str_field(raw, "notes").unwrap_or_else(|| placeholder_notes(&title, topic));
    DraftLesson {
        video_id: str_field(raw, "videoId").filter(|id| is_valid_video_id(id)),
        kind: str_field(raw, "type").and_then(|t| parse_lesson_type(&t)),
        title,
        notes,
    }
}

fn placeholder_lesson(lesson_index: usize, module_title: &str, topic: &str) -> DraftLesson {
    let focus = LESSON_FOCUS[lesson_index % LESSON_FOCUS.len()];
    let title = format!("{}: {}", focus, strip_module_prefix(module_title));
    DraftLesson {
        notes: placeholder_notes(&title, topic),
        title,
        video_id: None,
        kind: None,
    }
}

pub fn parse_lesson_type(raw: &str) -> Option<LessonType> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "free" => Some(LessonType::Free),
        "paid" | "premium" => Some(LessonType::Paid),
        _ => None,
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn array_field<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

pub fn default_title(topic: &str) -> String {
    format!("Introduction to {}", topic)
}

fn placeholder_module_title(module_index: usize, topic: &str) -> String {
    let focus = MODULE_FOCUS[module_index % MODULE_FOCUS.len()];
    format!("Module {}: {} of {}", module_index + 1, focus, topic)
}

fn strip_module_prefix(module_title: &str) -> &str {
    match module_title.split_once(':') {
        Some((prefix, rest)) if prefix.trim_start().starts_with("Module") && !rest.trim().is_empty() => {
            rest.trim()
        }
        _ => module_title,
    }
}

fn placeholder_notes(lesson_title: &str, topic: &str) -> String {
    format!(
        "<h3>{title}</h3>\
         <p>This lesson covers <strong>{title}</strong> as part of learning {topic}.</p>\
         <ul><li>Watch the video and note the key terms.</li>\
         <li>Try a small example on your own.</li>\
         <li>Summarise what you learned in two or three sentences.</li></ul>",
        title = html_escape(lesson_title),
        topic = html_escape(topic),
    )
}

fn default_project_ideas(topic: &str) -> String {
    let topic = html_escape(topic);
    format!(
        "<h3>Build a {topic} Starter Project</h3>\
         <p>Create a small, self-contained project that applies the core ideas of {topic}. \
         Start with the simplest working version, then add one feature per lesson you complete.</p>\
         <h3>Teach It Back</h3>\
         <p>Write a short tutorial or record a five-minute explanation of one {topic} concept \
         for someone who has never seen it before.</p>"
    )
}

pub(crate) fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
