// src/handlers/enrollment.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;

use crate::{
    error::AppError,
    handlers::course::fetch_course,
    models::{
        course::AccessRule,
        enrollment::{Attendee, AttendeeEntry, EligibleLearner, InviteRequest},
        user::User,
    },
    utils::authz::{self, Capability, Identity},
};

/// Enrolls the caller into an open course.
///
/// Any access rule other than `open` refuses self-enrollment with
/// `Forbidden`, whatever the caller's role; invitation and payment courses
/// only admit learners through the invite path.
pub async fn self_enroll(
    State(pool): State<PgPool>,
    Extension(identity): Extension<Identity>,
    Path(course_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let course = fetch_course(&pool, course_id).await?;

    if course.access_rule != AccessRule::Open {
        return Err(AppError::Forbidden);
    }

    authz::authorize(Some(&identity), Capability::EnrollSelf)?;

    let attendee = insert_attendee(&pool, course_id, identity.id, false).await?;

    Ok((StatusCode::CREATED, Json(attendee)))
}

/// Adds a learner to the course roster on behalf of the responsible
/// instructor or an admin. Works under any access rule.
///
/// Fails with `AlreadyEnrolled` when an attendee record exists, so the
/// caller can tell "added" apart from "already present".
pub async fn invite(
    State(pool): State<PgPool>,
    Extension(identity): Extension<Identity>,
    Path(course_id): Path<i64>,
    Json(payload): Json<InviteRequest>,
) -> Result<impl IntoResponse, AppError> {
    let course = fetch_course(&pool, course_id).await?;
    authz::authorize(
        Some(&identity),
        Capability::InviteAttendee {
            responsible_user_id: course.responsible_user_id,
        },
    )?;

    let learner = resolve_learner(&pool, &payload).await?;

    let attendee = insert_attendee(&pool, course_id, learner.id, true).await?;

    Ok((StatusCode::CREATED, Json(attendee)))
}

/// Lists the course roster with user info.
/// Responsible user or admin only.
pub async fn list_attendees(
    State(pool): State<PgPool>,
    Extension(identity): Extension<Identity>,
    Path(course_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let course = fetch_course(&pool, course_id).await?;
    authz::authorize(
        Some(&identity),
        Capability::ManageCourse {
            responsible_user_id: course.responsible_user_id,
        },
    )?;

    let attendees = sqlx::query_as::<_, AttendeeEntry>(
        r#"
        SELECT a.learner_id, u.username, u.name, a.enrolled_at, a.invited
        FROM attendees a
        JOIN users u ON a.learner_id = u.id
        WHERE a.course_id = $1
        ORDER BY a.enrolled_at
        "#,
    )
    .bind(course_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list attendees: {:?}", e);
        AppError::Storage(e.to_string())
    })?;

    Ok(Json(attendees))
}

/// Lists users with no attendee record for the course, regardless of role,
/// to populate the invitation picker.
pub async fn list_eligible_learners(
    State(pool): State<PgPool>,
    Extension(identity): Extension<Identity>,
    Path(course_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let course = fetch_course(&pool, course_id).await?;
    authz::authorize(
        Some(&identity),
        Capability::InviteAttendee {
            responsible_user_id: course.responsible_user_id,
        },
    )?;

    let eligible = sqlx::query_as::<_, EligibleLearner>(
        r#"
        SELECT id, username, name, role
        FROM users
        WHERE id NOT IN (SELECT learner_id FROM attendees WHERE course_id = $1)
        ORDER BY username
        "#,
    )
    .bind(course_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(eligible))
}

async fn resolve_learner(pool: &PgPool, payload: &InviteRequest) -> Result<User, AppError> {
    let user = match (payload.learner_id, &payload.username) {
        (Some(id), _) => {
            sqlx::query_as::<_, User>(
                "SELECT id, username, password, name, role, created_at FROM users WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(pool)
            .await?
        }
        (None, Some(username)) => {
            sqlx::query_as::<_, User>(
                "SELECT id, username, password, name, role, created_at FROM users WHERE username = $1",
            )
            .bind(username)
            .fetch_optional(pool)
            .await?
        }
        (None, None) => {
            return Err(AppError::Validation(
                "Either learner_id or username is required".to_string(),
            ));
        }
    };

    user.ok_or(AppError::NotFound("Learner not found".to_string()))
}

/// The unique (course_id, learner_id) constraint is the source of truth for
/// duplicates, so a concurrent double-enroll still maps to `AlreadyEnrolled`.
async fn insert_attendee(
    pool: &PgPool,
    course_id: i64,
    learner_id: i64,
    invited: bool,
) -> Result<Attendee, AppError> {
    sqlx::query_as::<_, Attendee>(
        r#"
        INSERT INTO attendees (course_id, learner_id, invited)
        VALUES ($1, $2, $3)
        RETURNING id, course_id, learner_id, enrolled_at, invited
        "#,
    )
    .bind(course_id)
    .bind(learner_id)
    .bind(invited)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if e.to_string().contains("unique constraint") || e.to_string().contains("23505") {
            AppError::AlreadyEnrolled
        } else {
            tracing::error!("Failed to insert attendee: {:?}", e);
            AppError::Storage(e.to_string())
        }
    })
}
