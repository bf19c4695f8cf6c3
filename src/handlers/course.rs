// src/handlers/course.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        course::{
            AccessRule, Course, CreateCourseRequest, PublishRequest, TagsRequest,
            UpdateCourseRequest, Visibility,
        },
        lesson::{Lesson, LessonRow},
    },
    utils::authz::{self, Capability, Identity, Viewer},
};

const COURSE_COLUMNS: &str = "id, title, description, tags, published, visibility, \
     access_rule, price_cents, responsible_user_id, created_at";

/// Fetches a course row or maps its absence to `NotFound`.
/// Shared by every handler that gates on the course's responsible user.
pub(crate) async fn fetch_course(pool: &PgPool, course_id: i64) -> Result<Course, AppError> {
    sqlx::query_as::<_, Course>(&format!(
        "SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1"
    ))
    .bind(course_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Course not found".to_string()))
}

/// Deduplicates tags case-sensitively, preserving first-seen order.
fn dedupe_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tags.into_iter().filter(|t| seen.insert(t.clone())).collect()
}

/// A payment course must carry a non-negative price; other rules ignore it.
fn validate_pricing(access_rule: AccessRule, price_cents: Option<i64>) -> Result<(), AppError> {
    if access_rule == AccessRule::Payment {
        match price_cents {
            Some(p) if p >= 0 => Ok(()),
            Some(_) => Err(AppError::Validation(
                "Price must be non-negative".to_string(),
            )),
            None => Err(AppError::Validation(
                "A payment course requires a price".to_string(),
            )),
        }
    } else {
        Ok(())
    }
}

/// Whether a viewer may see a course in the catalog or open its detail page.
fn visible_to(course: &Course, viewer: &Viewer) -> bool {
    match &viewer.0 {
        // owners and admins always see their course, published or not
        Some(identity) => {
            identity.role == crate::models::user::Role::Admin
                || identity.id == course.responsible_user_id
                || course.published
        }
        // anonymous viewers get past this check for any published course;
        // signed-in-only visibility then asks them to log in instead of 404ing
        None => course.published,
    }
}

/// Lists the public catalog. Anonymous viewers see published courses with
/// `everyone` visibility; signed-in viewers see all published courses.
pub async fn list_catalog(
    State(pool): State<PgPool>,
    Extension(viewer): Extension<Viewer>,
) -> Result<impl IntoResponse, AppError> {
    let courses = match viewer.0 {
        Some(_) => {
            sqlx::query_as::<_, Course>(&format!(
                "SELECT {COURSE_COLUMNS} FROM courses WHERE published = TRUE ORDER BY id DESC"
            ))
            .fetch_all(&pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, Course>(&format!(
                "SELECT {COURSE_COLUMNS} FROM courses \
                 WHERE published = TRUE AND visibility = 'everyone' ORDER BY id DESC"
            ))
            .fetch_all(&pool)
            .await?
        }
    };

    Ok(Json(courses))
}

/// Lists courses the caller is responsible for; admins see every course.
pub async fn list_mine(
    State(pool): State<PgPool>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, AppError> {
    let courses = if identity.role == crate::models::user::Role::Admin {
        sqlx::query_as::<_, Course>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses ORDER BY id DESC"
        ))
        .fetch_all(&pool)
        .await?
    } else {
        sqlx::query_as::<_, Course>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE responsible_user_id = $1 ORDER BY id DESC"
        ))
        .bind(identity.id)
        .fetch_all(&pool)
        .await?
    };

    Ok(Json(courses))
}

/// Retrieves a course with its ordered lesson sequence, honoring
/// publication state and visibility.
pub async fn get_course(
    State(pool): State<PgPool>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let course = fetch_course(&pool, id).await?;

    if !visible_to(&course, &viewer) {
        // hide unpublished courses entirely rather than revealing they exist
        return Err(AppError::NotFound("Course not found".to_string()));
    }

    if course.visibility == Visibility::SignedIn && viewer.0.is_none() {
        return Err(AppError::Unauthenticated);
    }

    let lessons = sqlx::query_as::<_, LessonRow>(
        r#"
        SELECT id, course_id, title, kind, content_url, quiz_id, lesson_order, created_at
        FROM lessons
        WHERE course_id = $1
        ORDER BY lesson_order
        "#,
    )
    .bind(id)
    .fetch_all(&pool)
    .await?
    .into_iter()
    .map(LessonRow::into_lesson)
    .collect::<Result<Vec<Lesson>, AppError>>()?;

    Ok(Json(serde_json::json!({
        "course": course,
        "lessons": lessons,
    })))
}

/// Creates a course owned by the caller.
/// Instructors and admins only.
pub async fn create_course(
    State(pool): State<PgPool>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<CreateCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    authz::authorize(Some(&identity), Capability::CreateCourse)?;

    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::Validation(validation_errors.to_string()));
    }
    validate_pricing(payload.access_rule, payload.price_cents)?;

    // price is only meaningful for payment courses
    let price_cents = match payload.access_rule {
        AccessRule::Payment => payload.price_cents,
        _ => None,
    };

    let course = sqlx::query_as::<_, Course>(&format!(
        r#"
        INSERT INTO courses (title, description, visibility, access_rule, price_cents, responsible_user_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {COURSE_COLUMNS}
        "#
    ))
    .bind(&payload.title)
    .bind(&payload.description)
    .bind(payload.visibility)
    .bind(payload.access_rule)
    .bind(price_cents)
    .bind(identity.id)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create course: {:?}", e);
        AppError::Storage(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(course)))
}

/// Partially updates a course's metadata.
/// Responsible user or admin only.
pub async fn update_course(
    State(pool): State<PgPool>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    let course = fetch_course(&pool, id).await?;
    authz::authorize(
        Some(&identity),
        Capability::ManageCourse {
            responsible_user_id: course.responsible_user_id,
        },
    )?;

    // Validate the state the patch would produce, not just the patch itself.
    let effective_rule = payload.access_rule.unwrap_or(course.access_rule);
    let effective_price = payload.price_cents.or(course.price_cents);
    validate_pricing(effective_rule, effective_price)?;

    if let Some(title) = &payload.title {
        if title.is_empty() || title.len() > 200 {
            return Err(AppError::Validation(
                "Title length must be between 1 and 200 characters.".to_string(),
            ));
        }
    }

    if payload.title.is_none()
        && payload.description.is_none()
        && payload.visibility.is_none()
        && payload.access_rule.is_none()
        && payload.price_cents.is_none()
    {
        return Ok(Json(course));
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE courses SET ");
    let mut separated = builder.separated(", ");

    if let Some(title) = payload.title {
        separated.push("title = ");
        separated.push_bind_unseparated(title);
    }

    if let Some(description) = payload.description {
        separated.push("description = ");
        separated.push_bind_unseparated(description);
    }

    if let Some(visibility) = payload.visibility {
        separated.push("visibility = ");
        separated.push_bind_unseparated(visibility);
    }

    if payload.access_rule.is_some() || payload.price_cents.is_some() {
        separated.push("access_rule = ");
        separated.push_bind_unseparated(effective_rule);
        let stored_price = match effective_rule {
            AccessRule::Payment => effective_price,
            _ => None,
        };
        separated.push("price_cents = ");
        separated.push_bind_unseparated(stored_price);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);
    builder.push(format!(" RETURNING {COURSE_COLUMNS}"));

    let updated = builder
        .build_query_as::<Course>()
        .fetch_one(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update course: {:?}", e);
            AppError::Storage(e.to_string())
        })?;

    Ok(Json(updated))
}

/// Sets the publication state. Idempotent: republishing a published course
/// changes nothing and is not an error.
pub async fn toggle_publish(
    State(pool): State<PgPool>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
    Json(payload): Json<PublishRequest>,
) -> Result<impl IntoResponse, AppError> {
    let course = fetch_course(&pool, id).await?;
    authz::authorize(
        Some(&identity),
        Capability::ManageCourse {
            responsible_user_id: course.responsible_user_id,
        },
    )?;

    if course.published == payload.published {
        return Ok(Json(course));
    }

    let updated = sqlx::query_as::<_, Course>(&format!(
        "UPDATE courses SET published = $1 WHERE id = $2 RETURNING {COURSE_COLUMNS}"
    ))
    .bind(payload.published)
    .bind(id)
    .fetch_one(&pool)
    .await?;

    Ok(Json(updated))
}

/// Replaces the course's tag set, deduplicated in first-seen order.
pub async fn set_tags(
    State(pool): State<PgPool>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
    Json(payload): Json<TagsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let course = fetch_course(&pool, id).await?;
    authz::authorize(
        Some(&identity),
        Capability::ManageCourse {
            responsible_user_id: course.responsible_user_id,
        },
    )?;

    let tags = dedupe_tags(payload.tags);

    let updated = sqlx::query_as::<_, Course>(&format!(
        "UPDATE courses SET tags = $1 WHERE id = $2 RETURNING {COURSE_COLUMNS}"
    ))
    .bind(sqlx::types::Json(tags))
    .bind(id)
    .fetch_one(&pool)
    .await?;

    Ok(Json(updated))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedupe_keeps_first_seen_order() {
        let tags = vec![
            "rust".to_string(),
            "web".to_string(),
            "rust".to_string(),
            "beginner".to_string(),
            "web".to_string(),
        ];
        assert_eq!(
            dedupe_tags(tags),
            vec!["rust".to_string(), "web".to_string(), "beginner".to_string()]
        );
    }

    #[test]
    fn dedupe_is_case_sensitive() {
        let tags = vec!["Rust".to_string(), "rust".to_string()];
        assert_eq!(dedupe_tags(tags), vec!["Rust".to_string(), "rust".to_string()]);
    }

    #[test]
    fn payment_requires_price() {
        assert!(validate_pricing(AccessRule::Payment, None).is_err());
        assert!(validate_pricing(AccessRule::Payment, Some(-100)).is_err());
        assert!(validate_pricing(AccessRule::Payment, Some(0)).is_ok());
        assert!(validate_pricing(AccessRule::Payment, Some(4999)).is_ok());
    }

    #[test]
    fn price_is_ignored_outside_payment() {
        assert!(validate_pricing(AccessRule::Open, None).is_ok());
        assert!(validate_pricing(AccessRule::Invitation, Some(-5)).is_ok());
    }
}
