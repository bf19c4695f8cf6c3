// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

/// Fixed four-bucket point schedule keyed by a learner's attempt count.
/// Non-increasing values are conventional, not enforced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct RewardSchedule {
    pub first_try: i64,
    pub second_try: i64,
    pub third_try: i64,
    pub fourth_plus: i64,
}

impl RewardSchedule {
    /// Bucket lookup: 1, 2, 3, then everything at or past 4.
    pub fn points_for(&self, attempt_number: i64) -> i64 {
        match attempt_number {
            1 => self.first_try,
            2 => self.second_try,
            3 => self.third_try,
            _ => self.fourth_plus,
        }
    }
}

/// Represents the 'quizzes' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Quiz {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub rewards: RewardSchedule,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// One answer option of a question. The full option list is stored as a
/// JSON array and always replaced as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizOption {
    pub option_text: String,
    pub is_correct: bool,
}

/// Represents the 'questions' table in the database. Question order is the
/// insertion order (ascending id); there is no explicit order column.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Question {
    pub id: i64,
    pub quiz_id: i64,
    pub question_text: String,
    pub options: Json<Vec<QuizOption>>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for sending a question to a learner (correctness flags stripped).
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub question_text: String,
    pub options: Vec<String>,
}

impl From<Question> for PublicQuestion {
    fn from(q: Question) -> Self {
        PublicQuestion {
            id: q.id,
            question_text: q.question_text,
            options: q.options.0.into_iter().map(|o| o.option_text).collect(),
        }
    }
}

/// DTO for creating a question.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 1000))]
    pub question_text: String,
    #[validate(custom(function = validate_options))]
    pub options: Vec<QuizOption>,
}

/// DTO for updating a question. The option list is replaced atomically;
/// there are no partial option updates.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuestionRequest {
    #[validate(length(min = 1, max = 1000))]
    pub question_text: String,
    #[validate(custom(function = validate_options))]
    pub options: Vec<QuizOption>,
}

/// An empty option list is allowed (the question just becomes unanswerable);
/// individual option texts are still bounded.
fn validate_options(options: &[QuizOption]) -> Result<(), validator::ValidationError> {
    for opt in options {
        if opt.option_text.is_empty() || opt.option_text.len() > 500 {
            return Err(validator::ValidationError::new("option_text_length"));
        }
    }
    Ok(())
}

/// DTO for replacing a quiz's reward schedule.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateRewardsRequest {
    #[validate(range(min = 0))]
    pub first_try: i64,
    #[validate(range(min = 0))]
    pub second_try: i64,
    #[validate(range(min = 0))]
    pub third_try: i64,
    #[validate(range(min = 0))]
    pub fourth_plus: i64,
}

/// DTO for submitting a quiz attempt.
///
/// Key: question id. Value: indexes of the selected options within that
/// question's option list.
#[derive(Debug, Deserialize)]
pub struct SubmitAttemptRequest {
    pub answers: std::collections::HashMap<i64, Vec<i32>>,
}

/// Represents the 'quiz_attempts' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QuizAttempt {
    pub id: i64,
    pub quiz_id: i64,
    pub learner_id: i64,
    pub attempt_number: i64,
    pub score: f64,
    pub awarded_points: i64,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reward_buckets_are_fixed() {
        let schedule = RewardSchedule {
            first_try: 10,
            second_try: 7,
            third_try: 5,
            fourth_plus: 2,
        };
        assert_eq!(schedule.points_for(1), 10);
        assert_eq!(schedule.points_for(2), 7);
        assert_eq!(schedule.points_for(3), 5);
        assert_eq!(schedule.points_for(4), 2);
        assert_eq!(schedule.points_for(5), 2);
        assert_eq!(schedule.points_for(17), 2);
    }

    #[test]
    fn public_question_strips_answer_flags() {
        let q = Question {
            id: 1,
            quiz_id: 2,
            question_text: "Pick one".to_string(),
            options: Json(vec![
                QuizOption {
                    option_text: "A".to_string(),
                    is_correct: true,
                },
                QuizOption {
                    option_text: "B".to_string(),
                    is_correct: false,
                },
            ]),
            created_at: None,
        };
        let public = PublicQuestion::from(q);
        assert_eq!(public.options, vec!["A".to_string(), "B".to_string()]);
    }
}
