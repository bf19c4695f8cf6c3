// src/models/enrollment.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::user::Role;

/// Represents the 'attendees' table in the database.
/// At most one record per (course_id, learner_id) pair.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Attendee {
    pub id: i64,
    pub course_id: i64,
    pub learner_id: i64,
    pub enrolled_at: Option<chrono::DateTime<chrono::Utc>>,
    /// True when added by an instructor/admin, false when self-enrolled.
    pub invited: bool,
}

/// Attendee row joined with user info, for the roster listing.
#[derive(Debug, Serialize, FromRow)]
pub struct AttendeeEntry {
    pub learner_id: i64,
    pub username: String,
    pub name: String,
    pub enrolled_at: Option<chrono::DateTime<chrono::Utc>>,
    pub invited: bool,
}

/// A user with no attendee record for a course, shown in the invitation
/// picker regardless of role.
#[derive(Debug, Serialize, FromRow)]
pub struct EligibleLearner {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub role: Role,
}

/// DTO for inviting a learner, either by id or by username.
#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub learner_id: Option<i64>,
    pub username: Option<String>,
}
