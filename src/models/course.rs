// src/models/course.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

/// Who can see a published course in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "course_visibility", rename_all = "snake_case")]
pub enum Visibility {
    Everyone,
    SignedIn,
}

/// How a learner gains access to a course.
/// Exactly one rule is active at a time; `price_cents` only matters for Payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "course_access_rule", rename_all = "snake_case")]
pub enum AccessRule {
    Open,
    Invitation,
    Payment,
}

/// Represents the 'courses' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    pub title: String,
    pub description: String,

    /// Free-text tags, deduplicated case-sensitively, first-seen order.
    /// Stored as a JSON array in the database.
    pub tags: Json<Vec<String>>,

    pub published: bool,
    pub visibility: Visibility,
    pub access_rule: AccessRule,

    /// Required and non-negative when `access_rule` is Payment, ignored otherwise.
    pub price_cents: Option<i64>,

    /// The instructor (or admin) who owns this course.
    pub responsible_user_id: i64,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for creating a course.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCourseRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 5000))]
    #[serde(default)]
    pub description: String,
    pub visibility: Visibility,
    pub access_rule: AccessRule,
    pub price_cents: Option<i64>,
}

/// DTO for partially updating a course. Fields are optional.
#[derive(Debug, Deserialize)]
pub struct UpdateCourseRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub visibility: Option<Visibility>,
    pub access_rule: Option<AccessRule>,
    pub price_cents: Option<i64>,
}

/// DTO for the idempotent publish toggle.
#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub published: bool,
}

/// DTO for replacing a course's tag set.
#[derive(Debug, Deserialize)]
pub struct TagsRequest {
    pub tags: Vec<String>,
}
