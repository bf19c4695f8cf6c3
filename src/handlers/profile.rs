// src/handlers/profile.rs

use axum::{Extension, Json, extract::State, response::IntoResponse};
use sqlx::PgPool;

use crate::{
    error::AppError,
    models::{course::Course, user::{Role, User}},
    utils::authz::{self, Capability, Identity},
};

/// Get the current user's profile.
pub async fn get_me(
    State(pool): State<PgPool>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, AppError> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, password, name, role, created_at FROM users WHERE id = $1",
    )
    .bind(identity.id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

/// Courses the current learner is enrolled in.
pub async fn my_courses(
    State(pool): State<PgPool>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, AppError> {
    let courses = sqlx::query_as::<_, Course>(
        r#"
        SELECT c.id, c.title, c.description, c.tags, c.published, c.visibility,
               c.access_rule, c.price_cents, c.responsible_user_id, c.created_at
        FROM courses c
        JOIN attendees a ON a.course_id = c.id
        WHERE a.learner_id = $1
        ORDER BY a.enrolled_at DESC
        "#,
    )
    .bind(identity.id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(courses))
}

/// Role-scoped dashboard counters.
pub async fn dashboard(
    State(pool): State<PgPool>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, AppError> {
    authz::authorize(Some(&identity), Capability::ViewDashboard)?;

    let body = match identity.role {
        Role::Learner => {
            let enrolled: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM attendees WHERE learner_id = $1")
                    .bind(identity.id)
                    .fetch_one(&pool)
                    .await?;
            let attempts: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM quiz_attempts WHERE learner_id = $1")
                    .bind(identity.id)
                    .fetch_one(&pool)
                    .await?;
            let points: i64 = sqlx::query_scalar(
                "SELECT COALESCE(SUM(awarded_points), 0) FROM quiz_attempts WHERE learner_id = $1",
            )
            .bind(identity.id)
            .fetch_one(&pool)
            .await?;
            serde_json::json!({
                "role": identity.role,
                "enrolled_courses": enrolled,
                "quiz_attempts": attempts,
                "total_points": points,
            })
        }
        Role::Instructor => {
            let courses: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM courses WHERE responsible_user_id = $1")
                    .bind(identity.id)
                    .fetch_one(&pool)
                    .await?;
            let attendees: i64 = sqlx::query_scalar(
                r#"
                SELECT COUNT(*) FROM attendees a
                JOIN courses c ON a.course_id = c.id
                WHERE c.responsible_user_id = $1
                "#,
            )
            .bind(identity.id)
            .fetch_one(&pool)
            .await?;
            serde_json::json!({
                "role": identity.role,
                "courses": courses,
                "attendees": attendees,
            })
        }
        Role::Admin => {
            let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
                .fetch_one(&pool)
                .await?;
            let courses: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM courses")
                .fetch_one(&pool)
                .await?;
            let published: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM courses WHERE published = TRUE")
                    .fetch_one(&pool)
                    .await?;
            serde_json::json!({
                "role": identity.role,
                "users": users,
                "courses": courses,
                "published_courses": published,
            })
        }
    };

    Ok(Json(body))
}
