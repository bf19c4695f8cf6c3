// src/models/lesson.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use validator::Validate;

use crate::error::AppError;

/// Discriminant column for a lesson's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "lesson_kind", rename_all = "snake_case")]
pub enum LessonKind {
    Video,
    Document,
    Image,
    Quiz,
}

/// Tagged lesson payload. Media lessons carry a URL, quiz lessons carry the
/// id of their quiz. The database stores this across `kind` + `content_url` +
/// `quiz_id` columns with a CHECK that exactly the matching column is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LessonPayload {
    Video { url: String },
    Document { url: String },
    Image { url: String },
    Quiz { quiz_id: i64 },
}

/// A content unit within a course's ordered sequence.
#[derive(Debug, Clone, Serialize)]
pub struct Lesson {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    #[serde(flatten)]
    pub payload: LessonPayload,
    /// 1-based position, unique and contiguous within the course.
    pub lesson_order: i32,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Raw row shape of the 'lessons' table.
#[derive(Debug, FromRow)]
pub struct LessonRow {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub kind: LessonKind,
    pub content_url: Option<String>,
    pub quiz_id: Option<i64>,
    pub lesson_order: i32,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl LessonRow {
    /// Assembles the tagged payload from the kind/content columns.
    /// The schema CHECK guarantees the matching column is present; a row
    /// violating it can only come from out-of-band writes.
    pub fn into_lesson(self) -> Result<Lesson, AppError> {
        let payload = match (self.kind, self.content_url, self.quiz_id) {
            (LessonKind::Video, Some(url), None) => LessonPayload::Video { url },
            (LessonKind::Document, Some(url), None) => LessonPayload::Document { url },
            (LessonKind::Image, Some(url), None) => LessonPayload::Image { url },
            (LessonKind::Quiz, None, Some(quiz_id)) => LessonPayload::Quiz { quiz_id },
            _ => {
                return Err(AppError::Storage(format!(
                    "lesson {} has inconsistent payload columns",
                    self.id
                )));
            }
        };

        Ok(Lesson {
            id: self.id,
            course_id: self.course_id,
            title: self.title,
            payload,
            lesson_order: self.lesson_order,
            created_at: self.created_at,
        })
    }
}

/// Client-supplied content for a new lesson. Quiz lessons need no URL; the
/// quiz record is created alongside the lesson in the same transaction.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NewLessonContent {
    Video { url: String },
    Document { url: String },
    Image { url: String },
    Quiz,
}

impl NewLessonContent {
    pub fn kind(&self) -> LessonKind {
        match self {
            NewLessonContent::Video { .. } => LessonKind::Video,
            NewLessonContent::Document { .. } => LessonKind::Document,
            NewLessonContent::Image { .. } => LessonKind::Image,
            NewLessonContent::Quiz => LessonKind::Quiz,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            NewLessonContent::Video { url }
            | NewLessonContent::Document { url }
            | NewLessonContent::Image { url } => Some(url),
            NewLessonContent::Quiz => None,
        }
    }
}

/// DTO for appending a lesson to a course.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateLessonRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(flatten)]
    pub content: NewLessonContent,
}

/// DTO for patching a lesson. `url` applies to media lessons only; the kind
/// of a lesson is fixed at creation.
#[derive(Debug, Deserialize)]
pub struct UpdateLessonRequest {
    pub title: Option<String>,
    pub url: Option<String>,
}

/// DTO for reordering a course's lessons. Must be a full permutation of the
/// course's current lesson ids.
#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub lesson_ids: Vec<i64>,
}
