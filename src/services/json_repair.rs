use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::AppError;

static CODE_FENCE_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^```[A-Za-z]*[ \t]*\r?\n?").expect("valid regex"));
static CODE_FENCE_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\r?\n?```\s*$").expect("valid regex"));
static TRAILING_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r",(\s*[}\]])").expect("valid regex"));

/// Top-level JSON value a caller expects from the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonShape {
    Object,
    Array,
}

impl JsonShape {
    fn brackets(self) -> (char, char) {
        match self {
            JsonShape::Object => ('{', '}'),
            JsonShape::Array => ('[', ']'),
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            JsonShape::Object => value.is_object(),
            JsonShape::Array => value.is_array(),
        }
    }
}

/// Coerces model output into JSON of the expected shape.
pub fn repair_json(raw: &str, shape: JsonShape) -> Result<Value, AppError> {
    let stripped = strip_code_fences(raw);
    if stripped.is_empty() {
        return Err(AppError::MalformedOutput("empty model output".to_string()));
    }

    if let Ok(value) = serde_json::from_str::<Value>(&stripped) {
        return check_shape(value, shape);
    }

    let (open, close) = shape.brackets();
    let start = stripped.find(open);
    let end = stripped.rfind(close);
    let sliced = match (start, end) {
        (Some(start), Some(end)) if start < end => &stripped[start..=end],
        _ => {
            return Err(AppError::MalformedOutput(format!(
                "no {}...{} block in model output",
                open, close
            )));
        }
    };

    let cleaned = normalize_quotes(sliced);
    let cleaned = TRAILING_COMMA.replace_all(&cleaned, "$1");

    serde_json::from_str::<Value>(&cleaned)
        .map_err(|e| AppError::MalformedOutput(format!("invalid JSON after repair: {}", e)))
        .and_then(|value| check_shape(value, shape))
}

fn check_shape(value: Value, shape: JsonShape) -> Result<Value, AppError> {
    if shape.matches(&value) {
        Ok(value)
    } else {
        Err(AppError::MalformedOutput(format!(
            "expected a JSON {:?}, got something else",
            shape
        )))
    }
}

fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_open = CODE_FENCE_OPEN.replace(trimmed, "");
    CODE_FENCE_CLOSE.replace(&without_open, "").trim().to_string()
}

fn normalize_quotes(text: &str) -> String {
    text.replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
}
