use chrono::{NaiveDate, Utc};
use sqlx::{FromRow, SqlitePool};

use crate::models::{ActivityKind, Course};

#[derive(Debug, FromRow)]
struct CourseRow {
    id: String,
    document: String,
}

impl CourseRow {
    fn into_course(self) -> Result<Course, sqlx::Error> {
        let mut course: Course = serde_json::from_str(&self.document)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        course.id = self.id;
        Ok(course)
    }
}

pub async fn ping(db: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query("select 1").execute(db).await?;
    Ok(())
}

/// Inserts or replaces the course document in the user's collection.
pub async fn save_course(db: &SqlitePool, user_id: &str, course: &Course) -> Result<(), sqlx::Error> {
    let document = serde_json::to_string(course)
        .map_err(|e| sqlx::Error::Protocol(format!("failed to encode course document: {}", e)))?;
    let now = Utc::now().to_rfc3339();
    let created_at = course.created_at.clone().unwrap_or_else(|| now.clone());
    let updated_at = course.updated_at.clone().unwrap_or(now);

    sqlx::query(
        r#"
        INSERT INTO courses (id, user_id, title, document, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(id) DO UPDATE SET
            title = excluded.title,
            document = excluded.document,
            updated_at = excluded.updated_at
        WHERE courses.user_id = excluded.user_id
        "#,
    )
    .bind(&course.id)
    .bind(user_id)
    .bind(&course.title)
    .bind(document)
    .bind(created_at)
    .bind(updated_at)
    .execute(db)
    .await?;

    Ok(())
}

pub async fn fetch_courses(db: &SqlitePool, user_id: &str) -> Result<Vec<Course>, sqlx::Error> {
    sqlx::query_as::<_, CourseRow>(
        "SELECT id, document FROM courses WHERE user_id = ? ORDER BY updated_at DESC, id",
    )
    .bind(user_id)
    .fetch_all(db)
    .await?
    .into_iter()
    .map(CourseRow::into_course)
    .collect()
}

pub async fn find_course(
    db: &SqlitePool,
    user_id: &str,
    course_id: &str,
) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as::<_, CourseRow>("SELECT id, document FROM courses WHERE user_id = ? AND id = ?")
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(db)
        .await?
        .map(CourseRow::into_course)
        .transpose()
}

/// The user's most recently updated course.
pub async fn latest_course(db: &SqlitePool, user_id: &str) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as::<_, CourseRow>(
        "SELECT id, document FROM courses WHERE user_id = ? ORDER BY updated_at DESC, id LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(db)
    .await?
    .map(CourseRow::into_course)
    .transpose()
}

pub async fn delete_course(db: &SqlitePool, user_id: &str, course_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM courses WHERE user_id = ? AND id = ?")
        .bind(user_id)
        .bind(course_id)
        .execute(db)
        .await?
        .rows_affected();

    Ok(result > 0)
}

pub async fn record_activity(
    db: &SqlitePool,
    user_id: &str,
    day: NaiveDate,
    kind: ActivityKind,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO activity (user_id, day, kind, events)
        VALUES (?1, ?2, ?3, 1)
        ON CONFLICT(user_id, day, kind) DO UPDATE SET events = events + 1
        "#,
    )
    .bind(user_id)
    .bind(day.format("%Y-%m-%d").to_string())
    .bind(kind.as_str())
    .execute(db)
    .await?;

    Ok(())
}

pub async fn fetch_activity_days(db: &SqlitePool, user_id: &str) -> Result<Vec<NaiveDate>, sqlx::Error> {
    let rows: Vec<String> =
        sqlx::query_scalar("SELECT DISTINCT day FROM activity WHERE user_id = ? ORDER BY day")
            .bind(user_id)
            .fetch_all(db)
            .await?;

    rows.iter()
        .map(|day| {
            NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|e| sqlx::Error::Decode(Box::new(e)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;
    use crate::models::CourseLength;
    use crate::services::course_shape::{Tier, fallback_course};

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create test db");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");

        pool
    }

    fn sample_course(id: &str, topic: &str, updated_at: &str) -> Course {
        let mut course = fallback_course(topic, Tier::for_length(CourseLength::Short));
        course.id = id.to_string();
        course.created_at = Some(updated_at.to_string());
        course.updated_at = Some(updated_at.to_string());
        course
    }

    #[tokio::test]
    async fn test_save_and_fetch_course() {
        let pool = setup_test_db().await;
        let course = sample_course("c1", "Rust", "2026-10-18T10:00:00+00:00");

        save_course(&pool, "user-1", &course).await.expect("Failed to save course");

        let found = find_course(&pool, "user-1", "c1")
            .await
            .expect("Failed to find course")
            .expect("Course not found");
        assert_eq!(found, course);

        // other users cannot see it
        assert!(find_course(&pool, "user-2", "c1").await.unwrap().is_none());
        assert!(fetch_courses(&pool, "user-2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_courses_newest_first() {
        let pool = setup_test_db().await;
        save_course(&pool, "u", &sample_course("old", "Go", "2026-10-01T00:00:00+00:00"))
            .await
            .unwrap();
        save_course(&pool, "u", &sample_course("new", "Rust", "2026-10-18T00:00:00+00:00"))
            .await
            .unwrap();

        let courses = fetch_courses(&pool, "u").await.expect("Failed to fetch courses");
        let ids: Vec<_> = courses.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn test_latest_course() {
        let pool = setup_test_db().await;
        assert!(latest_course(&pool, "u").await.unwrap().is_none());

        save_course(&pool, "u", &sample_course("old", "Go", "2026-10-01T00:00:00+00:00"))
            .await
            .unwrap();
        save_course(&pool, "u", &sample_course("new", "Rust", "2026-10-18T00:00:00+00:00"))
            .await
            .unwrap();
        save_course(&pool, "other", &sample_course("newest", "C", "2026-10-19T00:00:00+00:00"))
            .await
            .unwrap();

        let latest = latest_course(&pool, "u").await.unwrap().expect("Course not found");
        assert_eq!(latest.id, "new");
    }

    #[tokio::test]
    async fn test_save_updates_existing_document() {
        let pool = setup_test_db().await;
        let mut course = sample_course("c1", "Rust", "2026-10-18T10:00:00+00:00");
        save_course(&pool, "u", &course).await.unwrap();

        course.modules[0].lessons[1].completed = true;
        course.updated_at = Some("2026-10-18T11:00:00+00:00".to_string());
        save_course(&pool, "u", &course).await.unwrap();

        let courses = fetch_courses(&pool, "u").await.unwrap();
        assert_eq!(courses.len(), 1);
        assert!(courses[0].modules[0].lessons[1].completed);
    }

    #[tokio::test]
    async fn test_save_does_not_overwrite_another_users_course() {
        let pool = setup_test_db().await;
        let course = sample_course("shared-id", "Rust", "2026-10-18T10:00:00+00:00");
        save_course(&pool, "owner", &course).await.unwrap();

        let mut hijack = course.clone();
        hijack.title = "Hijacked".to_string();
        save_course(&pool, "intruder", &hijack).await.unwrap();

        let kept = find_course(&pool, "owner", "shared-id").await.unwrap().unwrap();
        assert_eq!(kept.title, course.title);
    }

    #[tokio::test]
    async fn test_delete_course() {
        let pool = setup_test_db().await;
        save_course(&pool, "u", &sample_course("c1", "Rust", "2026-10-18T10:00:00+00:00"))
            .await
            .unwrap();

        assert!(!delete_course(&pool, "other", "c1").await.unwrap());
        assert!(delete_course(&pool, "u", "c1").await.unwrap());
        assert!(find_course(&pool, "u", "c1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_activity_days_are_distinct() {
        let pool = setup_test_db().await;
        let d1 = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();

        record_activity(&pool, "u", d2, ActivityKind::Lesson).await.unwrap();
        record_activity(&pool, "u", d2, ActivityKind::Lesson).await.unwrap();
        record_activity(&pool, "u", d2, ActivityKind::Focus).await.unwrap();
        record_activity(&pool, "u", d1, ActivityKind::Focus).await.unwrap();
        record_activity(&pool, "someone-else", d1, ActivityKind::Lesson).await.unwrap();

        let days = fetch_activity_days(&pool, "u").await.unwrap();
        assert_eq!(days, vec![d1, d2]);

        let count: i64 = sqlx::query_scalar(
            "SELECT events FROM activity WHERE user_id = 'u' AND day = '2026-10-18' AND kind = 'lesson'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 2);
    }
}
