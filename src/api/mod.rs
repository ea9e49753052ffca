use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Path, Query};
use axum::routing::{post, put};
use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::mask_secret;
use crate::db::repository;
use crate::error::AppError;
use crate::gemini::is_valid_model_name;
use crate::llm::{ModelInfo, Prompt, excerpt};
use crate::models::*;
use crate::services::course_generator::clean_topic;
use crate::services::stats::build_user_stats;
use crate::state::AppState;
use crate::youtube::parse_video_reference;

const MAX_BODY_BYTES: usize = 1024 * 1024;
const MAX_USER_ID_CHARS: usize = 128;
const MAX_FOCUS_MINUTES: u32 = 180;

pub fn router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/debug/models", get(debug_models))
        .route("/debug/try-model", get(debug_try_model))
        .route("/debug/env", get(debug_env))
        .route("/generate-course", post(generate_course))
        .route("/api/generate-course", post(generate_course))
        .route("/api/lesson-complete", post(complete_lesson))
        .route("/api/generate-quiz", post(generate_quiz))
        .route("/api/premium-suggestions", post(premium_suggestions))
        .route("/api/focus-sessions", post(record_focus_session))
        .route("/api/users/{user_id}/stats", get(user_stats))
        .route("/api/users/{user_id}/courses", get(list_courses))
        .route(
            "/api/users/{user_id}/courses/{course_id}",
            get(get_course).delete(delete_course),
        )
        .route(
            "/api/users/{user_id}/courses/{course_id}/active-lesson",
            put(set_active_lesson),
        )
        .route(
            "/api/users/{user_id}/courses/{course_id}/lessons/video",
            put(set_lesson_video),
        );

    if let Some(dir) = state.config.static_dir.clone() {
        info!("serving static files from {}", dir);
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn bad_json(rejection: JsonRejection) -> AppError {
    AppError::BadRequest(rejection.body_text())
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Blank ids count as absent; over-long ids are rejected rather than dropped.
fn optional_user(value: Option<String>) -> Result<Option<String>, AppError> {
    match trimmed(value) {
        Some(id) if id.chars().count() > MAX_USER_ID_CHARS => Err(AppError::BadRequest(format!(
            "userId too long (max {} characters)",
            MAX_USER_ID_CHARS
        ))),
        other => Ok(other),
    }
}

fn require_user(value: Option<String>) -> Result<String, AppError> {
    optional_user(value)?.ok_or_else(|| AppError::BadRequest("userId is required".to_string()))
}

fn today() -> chrono::NaiveDate {
    Utc::now().date_naive()
}

async fn root() -> &'static str {
    "Hello from the IntelliCourse AI Backend!"
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    ai_key_loaded: bool,
    youtube_key_loaded: bool,
    quiz_key_loaded: bool,
    database: &'static str,
    selected_model: Option<String>,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match repository::ping(&state.db).await {
        Ok(()) => "ok",
        Err(err) => {
            warn!("health check database ping failed: {}", err);
            "unavailable"
        }
    };

    Json(HealthResponse {
        status: "ok",
        ai_key_loaded: state.config.gemini_api_key.is_some(),
        youtube_key_loaded: state.config.youtube_api_key.is_some(),
        quiz_key_loaded: state.config.openai_api_key.is_some(),
        database,
        selected_model: state.course_ai.selected_model().await,
    })
}

#[derive(Serialize)]
struct ModelsResponse {
    count: usize,
    models: Vec<ModelInfo>,
}

async fn debug_models(State(state): State<AppState>) -> Result<Json<ModelsResponse>, AppError> {
    let models = state.course_ai.list_models().await?;
    Ok(Json(ModelsResponse {
        count: models.len(),
        models,
    }))
}

#[derive(Deserialize)]
struct TryModelParams {
    name: Option<String>,
}

async fn debug_try_model(
    State(state): State<AppState>,
    Query(params): Query<TryModelParams>,
) -> Result<Json<Value>, AppError> {
    let name = params
        .name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("name query param required".to_string()))?;
    if !is_valid_model_name(&name) {
        return Err(AppError::BadRequest(
            "name may only contain letters, digits, '.', '_' and '-'".to_string(),
        ));
    }

    let prompt = Prompt::new("Return the word OK");
    let body = match state.course_ai.try_model(&name, &prompt).await {
        Ok(text) => json!({ "ok": true, "model": name, "sample": excerpt(&text, 200) }),
        Err(e) => json!({ "ok": false, "model": name, "error": e.to_string() }),
    };
    Ok(Json(body))
}

async fn debug_env(State(state): State<AppState>) -> Json<Value> {
    let config = &state.config;
    Json(json!({
        "GEMINI_API_KEY_present": config.gemini_api_key.is_some(),
        "GEMINI_API_KEY_sample": mask_secret(config.gemini_api_key.as_deref()),
        "GEMINI_MODEL": config.gemini_model,
        "YT_API_KEY_present": config.youtube_api_key.is_some(),
        "YT_API_KEY_sample": mask_secret(config.youtube_api_key.as_deref()),
        "OPENAI_API_KEY_present": config.openai_api_key.is_some(),
        "OPENAI_API_KEY_sample": mask_secret(config.openai_api_key.as_deref()),
        "ENRICH_VIDEOS": config.enrich_videos,
    }))
}

async fn generate_course(
    State(state): State<AppState>,
    payload: Result<Json<GenerateCourseRequest>, JsonRejection>,
) -> Result<Json<Course>, AppError> {
    let Json(req) = payload.map_err(bad_json)?;
    let topic = clean_topic(req.topic.as_deref())?;
    let user_id = optional_user(req.user_id)?;
    let options = req.options.unwrap_or_default();

    let course = state.courses.generate(&topic, &options).await;

    match user_id {
        Some(user_id) => match repository::save_course(&state.db, &user_id, &course).await {
            Ok(()) => info!("Saved course {} for user {}", course.id, user_id),
            Err(e) => warn!("Could not persist course {} for user {}: {}", course.id, user_id, e),
        },
        None => info!("No userId supplied; course {} is returned unsaved", course.id),
    }

    Ok(Json(course))
}

async fn complete_lesson(
    State(state): State<AppState>,
    payload: Result<Json<CompleteLessonRequest>, JsonRejection>,
) -> Result<Json<Course>, AppError> {
    let Json(req) = payload.map_err(bad_json)?;
    let user_id = require_user(req.user_id)?;

    // without a courseId the lesson belongs to the course the user touched last
    let found = match trimmed(req.course_id) {
        Some(course_id) => repository::find_course(&state.db, &user_id, &course_id).await?,
        None => repository::latest_course(&state.db, &user_id).await?,
    };
    let mut course = found.ok_or(AppError::NotFound)?;

    let at = LessonRef {
        module_index: req.module_index,
        lesson_index: req.lesson_index,
    };
    let lesson = course
        .lesson_mut(at)
        .ok_or_else(|| AppError::BadRequest("Lesson index out of range".to_string()))?;
    lesson.completed = req.completed;

    course.active_lesson = Some(at);
    course.updated_at = Some(Utc::now().to_rfc3339());
    repository::save_course(&state.db, &user_id, &course).await?;

    if req.completed {
        repository::record_activity(&state.db, &user_id, today(), ActivityKind::Lesson).await?;
    }

    Ok(Json(course))
}

async fn list_courses(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Course>>, AppError> {
    let courses = repository::fetch_courses(&state.db, &user_id).await?;
    Ok(Json(courses))
}

async fn get_course(
    State(state): State<AppState>,
    Path((user_id, course_id)): Path<(String, String)>,
) -> Result<Json<Course>, AppError> {
    let course = repository::find_course(&state.db, &user_id, &course_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(course))
}

async fn delete_course(
    State(state): State<AppState>,
    Path((user_id, course_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    let ok = repository::delete_course(&state.db, &user_id, &course_id).await?;
    if ok {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}

async fn set_active_lesson(
    State(state): State<AppState>,
    Path((user_id, course_id)): Path<(String, String)>,
    payload: Result<Json<LessonRef>, JsonRejection>,
) -> Result<Json<Course>, AppError> {
    let Json(at) = payload.map_err(bad_json)?;
    let mut course = repository::find_course(&state.db, &user_id, &course_id)
        .await?
        .ok_or(AppError::NotFound)?;

    if course.lesson(at).is_none() {
        return Err(AppError::BadRequest("Lesson index out of range".to_string()));
    }
    course.active_lesson = Some(at);
    course.updated_at = Some(Utc::now().to_rfc3339());
    repository::save_course(&state.db, &user_id, &course).await?;

    Ok(Json(course))
}

async fn set_lesson_video(
    State(state): State<AppState>,
    Path((user_id, course_id)): Path<(String, String)>,
    payload: Result<Json<UpdateLessonVideoRequest>, JsonRejection>,
) -> Result<Json<Course>, AppError> {
    let Json(req) = payload.map_err(bad_json)?;
    let video_id = parse_video_reference(&req.video)
        .ok_or_else(|| AppError::BadRequest("Not a YouTube video id or URL".to_string()))?;

    let mut course = repository::find_course(&state.db, &user_id, &course_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let at = LessonRef {
        module_index: req.module_index,
        lesson_index: req.lesson_index,
    };
    let lesson = course
        .lesson_mut(at)
        .ok_or_else(|| AppError::BadRequest("Lesson index out of range".to_string()))?;
    lesson.video_id = Some(video_id);

    course.updated_at = Some(Utc::now().to_rfc3339());
    repository::save_course(&state.db, &user_id, &course).await?;

    Ok(Json(course))
}

async fn generate_quiz(
    State(state): State<AppState>,
    payload: Result<Json<GenerateQuizRequest>, JsonRejection>,
) -> Result<Json<QuizResponse>, AppError> {
    let Json(req) = payload.map_err(bad_json)?;
    let content = req
        .lesson_content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("lessonContent must be a non-empty string".to_string()))?;

    Ok(Json(state.quizzes.generate(&content).await))
}

async fn premium_suggestions(
    State(state): State<AppState>,
    payload: Result<Json<PremiumSuggestionsRequest>, JsonRejection>,
) -> Result<Json<PremiumSuggestionsResponse>, AppError> {
    let Json(req) = payload.map_err(bad_json)?;
    let topic = clean_topic(req.topic.as_deref())?;
    Ok(Json(state.premium.suggest(&topic).await))
}

async fn record_focus_session(
    State(state): State<AppState>,
    payload: Result<Json<FocusSessionRequest>, JsonRejection>,
) -> Result<Json<UserStats>, AppError> {
    let Json(req) = payload.map_err(bad_json)?;
    let user_id = require_user(req.user_id)?;
    if req.minutes == 0 || req.minutes > MAX_FOCUS_MINUTES {
        return Err(AppError::BadRequest(format!(
            "minutes must be between 1 and {}",
            MAX_FOCUS_MINUTES
        )));
    }

    repository::record_activity(&state.db, &user_id, today(), ActivityKind::Focus).await?;
    info!("Recorded {} minute focus session for {}", req.minutes, user_id);

    load_stats(&state, &user_id).await.map(Json)
}

async fn user_stats(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserStats>, AppError> {
    load_stats(&state, &user_id).await.map(Json)
}

async fn load_stats(state: &AppState, user_id: &str) -> Result<UserStats, AppError> {
    let courses = repository::fetch_courses(&state.db, user_id).await?;
    let days = repository::fetch_activity_days(&state.db, user_id).await?;
    Ok(build_user_stats(&courses, &days, today()))
}
