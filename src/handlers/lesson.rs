// src/handlers/lesson.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    handlers::course::fetch_course,
    models::lesson::{
        CreateLessonRequest, Lesson, LessonKind, LessonRow, NewLessonContent, ReorderRequest,
        UpdateLessonRequest,
    },
    utils::authz::{self, Capability, Identity},
};

const LESSON_COLUMNS: &str =
    "id, course_id, title, kind, content_url, quiz_id, lesson_order, created_at";

async fn fetch_lesson(pool: &PgPool, lesson_id: i64) -> Result<LessonRow, AppError> {
    sqlx::query_as::<_, LessonRow>(&format!(
        "SELECT {LESSON_COLUMNS} FROM lessons WHERE id = $1"
    ))
    .bind(lesson_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Lesson not found".to_string()))
}

/// Checks that `proposed` is a full permutation of `current`: same ids,
/// nothing missing, nothing foreign, nothing repeated.
fn is_full_permutation(current: &[i64], proposed: &[i64]) -> bool {
    if current.len() != proposed.len() {
        return false;
    }
    let mut a: Vec<i64> = current.to_vec();
    let mut b: Vec<i64> = proposed.to_vec();
    a.sort_unstable();
    b.sort_unstable();
    a == b
}

/// Appends a lesson at position max+1 (1 when the course is empty).
///
/// A quiz lesson is a compound creation: the quiz row and the lesson row are
/// written in one transaction, so either both persist or neither does. The
/// course row is locked first to serialize concurrent sequence writers.
pub async fn append_lesson(
    State(pool): State<PgPool>,
    Extension(identity): Extension<Identity>,
    Path(course_id): Path<i64>,
    Json(payload): Json<CreateLessonRequest>,
) -> Result<impl IntoResponse, AppError> {
    let course = fetch_course(&pool, course_id).await?;
    authz::authorize(
        Some(&identity),
        Capability::ManageCourse {
            responsible_user_id: course.responsible_user_id,
        },
    )?;

    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::Validation(validation_errors.to_string()));
    }

    let mut tx = pool.begin().await?;

    sqlx::query("SELECT id FROM courses WHERE id = $1 FOR UPDATE")
        .bind(course_id)
        .execute(&mut *tx)
        .await?;

    let next_order: i32 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(lesson_order), 0) + 1 FROM lessons WHERE course_id = $1",
    )
    .bind(course_id)
    .fetch_one(&mut *tx)
    .await?;

    let quiz_id = match &payload.content {
        NewLessonContent::Quiz => {
            let quiz_id: i64 = sqlx::query_scalar(
                "INSERT INTO quizzes (course_id, title) VALUES ($1, $2) RETURNING id",
            )
            .bind(course_id)
            .bind(&payload.title)
            .fetch_one(&mut *tx)
            .await?;
            Some(quiz_id)
        }
        _ => None,
    };

    let row = sqlx::query_as::<_, LessonRow>(&format!(
        r#"
        INSERT INTO lessons (course_id, title, kind, content_url, quiz_id, lesson_order)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {LESSON_COLUMNS}
        "#
    ))
    .bind(course_id)
    .bind(&payload.title)
    .bind(payload.content.kind())
    .bind(payload.content.url())
    .bind(quiz_id)
    .bind(next_order)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to append lesson: {:?}", e);
        AppError::Storage(e.to_string())
    })?;

    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(row.into_lesson()?)))
}

/// Patches a lesson's title and, for media lessons, its URL.
/// A lesson's kind is fixed at creation.
pub async fn update_lesson(
    State(pool): State<PgPool>,
    Extension(identity): Extension<Identity>,
    Path(lesson_id): Path<i64>,
    Json(payload): Json<UpdateLessonRequest>,
) -> Result<impl IntoResponse, AppError> {
    let lesson = fetch_lesson(&pool, lesson_id).await?;
    let course = fetch_course(&pool, lesson.course_id).await?;
    authz::authorize(
        Some(&identity),
        Capability::ManageCourse {
            responsible_user_id: course.responsible_user_id,
        },
    )?;

    if let Some(title) = &payload.title {
        if title.is_empty() || title.len() > 200 {
            return Err(AppError::Validation(
                "Title length must be between 1 and 200 characters.".to_string(),
            ));
        }
    }
    if payload.url.is_some() && lesson.kind == LessonKind::Quiz {
        return Err(AppError::Validation(
            "A quiz lesson has no content URL".to_string(),
        ));
    }

    let row = sqlx::query_as::<_, LessonRow>(&format!(
        r#"
        UPDATE lessons
        SET title = COALESCE($1, title),
            content_url = COALESCE($2, content_url)
        WHERE id = $3
        RETURNING {LESSON_COLUMNS}
        "#
    ))
    .bind(payload.title)
    .bind(payload.url)
    .bind(lesson_id)
    .fetch_one(&pool)
    .await?;

    Ok(Json(row.into_lesson()?))
}

/// Deletes a lesson and compacts the orders above it by one, atomically, so
/// the sequence is `{1..N}` again the moment the delete is visible. Deleting
/// a quiz lesson removes its quiz (and through it, questions and attempts).
pub async fn delete_lesson(
    State(pool): State<PgPool>,
    Extension(identity): Extension<Identity>,
    Path(lesson_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let lesson = fetch_lesson(&pool, lesson_id).await?;
    let course = fetch_course(&pool, lesson.course_id).await?;
    authz::authorize(
        Some(&identity),
        Capability::ManageCourse {
            responsible_user_id: course.responsible_user_id,
        },
    )?;

    let mut tx = pool.begin().await?;

    sqlx::query("SELECT id FROM courses WHERE id = $1 FOR UPDATE")
        .bind(lesson.course_id)
        .execute(&mut *tx)
        .await?;

    // Re-read the position under the lock; a concurrent reorder may have
    // moved the lesson since the unlocked fetch above.
    let current_order: Option<i32> =
        sqlx::query_scalar("SELECT lesson_order FROM lessons WHERE id = $1")
            .bind(lesson_id)
            .fetch_optional(&mut *tx)
            .await?;
    let current_order =
        current_order.ok_or(AppError::NotFound("Lesson not found".to_string()))?;

    sqlx::query("DELETE FROM lessons WHERE id = $1")
        .bind(lesson_id)
        .execute(&mut *tx)
        .await?;

    if let Some(quiz_id) = lesson.quiz_id {
        sqlx::query("DELETE FROM quizzes WHERE id = $1")
            .bind(quiz_id)
            .execute(&mut *tx)
            .await?;
    }

    sqlx::query(
        "UPDATE lessons SET lesson_order = lesson_order - 1 WHERE course_id = $1 AND lesson_order > $2",
    )
    .bind(lesson.course_id)
    .bind(current_order)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Reassigns lesson_order from the supplied full permutation of the course's
/// lesson ids. Any mismatch (missing, foreign or duplicate ids) is rejected
/// with `InvalidOrder` and leaves the sequence untouched.
pub async fn reorder_lessons(
    State(pool): State<PgPool>,
    Extension(identity): Extension<Identity>,
    Path(course_id): Path<i64>,
    Json(payload): Json<ReorderRequest>,
) -> Result<impl IntoResponse, AppError> {
    let course = fetch_course(&pool, course_id).await?;
    authz::authorize(
        Some(&identity),
        Capability::ManageCourse {
            responsible_user_id: course.responsible_user_id,
        },
    )?;

    let mut tx = pool.begin().await?;

    sqlx::query("SELECT id FROM courses WHERE id = $1 FOR UPDATE")
        .bind(course_id)
        .execute(&mut *tx)
        .await?;

    let current_ids: Vec<i64> =
        sqlx::query_scalar("SELECT id FROM lessons WHERE course_id = $1 ORDER BY lesson_order")
            .bind(course_id)
            .fetch_all(&mut *tx)
            .await?;

    if !is_full_permutation(&current_ids, &payload.lesson_ids) {
        return Err(AppError::InvalidOrder(
            "Reorder must list each current lesson id exactly once".to_string(),
        ));
    }

    for (position, lesson_id) in payload.lesson_ids.iter().enumerate() {
        sqlx::query("UPDATE lessons SET lesson_order = $1 WHERE id = $2")
            .bind((position + 1) as i32)
            .bind(lesson_id)
            .execute(&mut *tx)
            .await?;
    }

    let rows = sqlx::query_as::<_, LessonRow>(&format!(
        "SELECT {LESSON_COLUMNS} FROM lessons WHERE course_id = $1 ORDER BY lesson_order"
    ))
    .bind(course_id)
    .fetch_all(&mut *tx)
    .await?;

    tx.commit().await?;

    let lessons = rows
        .into_iter()
        .map(LessonRow::into_lesson)
        .collect::<Result<Vec<Lesson>, AppError>>()?;

    Ok(Json(lessons))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permutation_accepts_same_ids_in_any_order() {
        assert!(is_full_permutation(&[1, 2, 3], &[3, 1, 2]));
        assert!(is_full_permutation(&[], &[]));
    }

    #[test]
    fn permutation_rejects_partial_sets() {
        assert!(!is_full_permutation(&[1, 2, 3], &[1, 2]));
        assert!(!is_full_permutation(&[1, 2], &[1, 2, 3]));
    }

    #[test]
    fn permutation_rejects_foreign_and_duplicate_ids() {
        assert!(!is_full_permutation(&[1, 2, 3], &[1, 2, 99]));
        assert!(!is_full_permutation(&[1, 2, 3], &[1, 2, 2]));
    }
}
