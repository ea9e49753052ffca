use std::sync::Arc;

use tracing::warn;

use crate::error::AppError;
use crate::llm::{GenerativeClient, Prompt};
use crate::models::{QuizQuestion, QuizResponse, QuizSource};
use crate::services::json_repair::{JsonShape, repair_json};

pub const QUIZ_QUESTIONS: usize = 3;
pub const QUIZ_OPTIONS: usize = 4;

const SYSTEM_PROMPT: &str = "You are an expert quiz creator. Based on the following content, generate a 3-question multiple-choice quiz. Your response MUST be a valid JSON array of objects. Each object must have three keys: \"question\" (string), \"options\" (an array of 4 strings), and \"correctAnswer\" (a string that exactly matches one of the options).";

pub struct QuizService {
    ai: Arc<dyn GenerativeClient>,
}

impl QuizService {
    pub fn new(ai: Arc<dyn GenerativeClient>) -> Self {
        Self { ai }
    }

    pub async fn generate(&self, lesson_content: &str) -> QuizResponse {
        if !self.ai.is_configured() {
            return fallback_response(lesson_content, "Missing OPENAI_API_KEY".to_string());
        }

        match self.generate_with_ai(lesson_content).await {
            Ok(quiz) => QuizResponse {
                quiz,
                source: QuizSource::Openai,
                reason: None,
            },
            Err(e) => {
                warn!("Quiz generation fell back to canned questions: {}", e);
                fallback_response(lesson_content, reason_of(&e))
            }
        }
    }

    async fn generate_with_ai(&self, lesson_content: &str) -> Result<Vec<QuizQuestion>, AppError> {
        let prompt = Prompt::new(lesson_content)
            .with_system(SYSTEM_PROMPT)
            .with_temperature(0.3);
        let raw = self.ai.generate(&prompt).await?;
        parse_quiz(&raw)
    }
}

fn reason_of(error: &AppError) -> String {
    match error {
        AppError::BadRequest(msg)
        | AppError::Upstream(msg)
        | AppError::MalformedOutput(msg)
        | AppError::Config(msg)
        | AppError::QuotaExceeded(msg) => msg.clone(),
        other => other.to_string(),
    }
}

fn fallback_response(lesson_content: &str, reason: String) -> QuizResponse {
    QuizResponse {
        quiz: fallback_quiz(lesson_content),
        source: QuizSource::Fallback,
        reason: Some(reason),
    }
}

/// Parses and validates model output: exactly 3 questions with 4 options each.
pub fn parse_quiz(raw: &str) -> Result<Vec<QuizQuestion>, AppError> {
    let value = repair_json(raw, JsonShape::Array)?;
    let quiz: Vec<QuizQuestion> = serde_json::from_value(value)
        .map_err(|e| AppError::MalformedOutput(format!("Quiz items invalid: {}", e)))?;
    validate_quiz(&quiz)?;
    Ok(quiz)
}

pub fn validate_quiz(quiz: &[QuizQuestion]) -> Result<(), AppError> {
    if quiz.len() != QUIZ_QUESTIONS {
        return Err(AppError::MalformedOutput("Quiz array invalid length".to_string()));
    }
    for q in quiz {
        if q.question.trim().is_empty() {
            return Err(AppError::MalformedOutput("Question missing".to_string()));
        }
        if q.options.len() != QUIZ_OPTIONS {
            return Err(AppError::MalformedOutput("Options invalid".to_string()));
        }
        if !q.options.contains(&q.correct_answer) {
            return Err(AppError::MalformedOutput("Correct answer mismatch".to_string()));
        }
    }
    Ok(())
}

/// First line or sentence of the content, at most 80 characters.
fn quiz_topic(lesson_content: &str) -> String {
    let first = lesson_content
        .split('\n')
        .next()
        .and_then(|line| line.split(". ").next())
        .map(str::trim)
        .unwrap_or_default();
    if first.is_empty() {
        return "the topic".to_string();
    }
    first.chars().take(80).collect()
}

pub fn fallback_quiz(lesson_content: &str) -> Vec<QuizQuestion> {
    let topic = quiz_topic(lesson_content);
    let central = format!("It is central to understanding {}", topic);

    vec![
        QuizQuestion {
            question: format!("Which statement best summarizes {}?", topic),
            options: vec![
                "It is unrelated to this lesson".to_string(),
                central.clone(),
                "It is only about user interface styling".to_string(),
                "It refers exclusively to database indexing".to_string(),
            ],
            correct_answer: central,
        },
        QuizQuestion {
            question: format!("What is a common mistake when learning {}?", topic),
            options: vec![
                "Focusing only on surface examples".to_string(),
                "Practicing with varied problems".to_string(),
                "Reviewing core principles".to_string(),
                "Building incremental projects".to_string(),
            ],
            correct_answer: "Focusing only on surface examples".to_string(),
        },
        QuizQuestion {
            question: format!("Which action helps reinforce {}?", topic),
            options: vec![
                "Avoiding practical application".to_string(),
                "Ignoring feedback".to_string(),
                "Applying concepts in small projects".to_string(),
                "Memorizing without context".to_string(),
            ],
            correct_answer: "Applying concepts in small projects".to_string(),
        },
    ]
}
