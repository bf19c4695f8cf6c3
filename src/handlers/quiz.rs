// src/handlers/quiz.rs

use std::collections::{BTreeSet, HashMap};

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
    models::quiz::{
        CreateQuestionRequest, PublicQuestion, Question, Quiz, SubmitAttemptRequest,
        UpdateQuestionRequest, UpdateRewardsRequest,
    },
    utils::authz::{self, Capability, Identity},
};

const QUIZ_COLUMNS: &str =
    "id, course_id, title, first_try, second_try, third_try, fourth_plus, created_at";

const QUESTION_COLUMNS: &str = "id, quiz_id, question_text, options, created_at";

async fn fetch_quiz(pool: &PgPool, quiz_id: i64) -> Result<Quiz, AppError> {
    sqlx::query_as::<_, Quiz>(&format!("SELECT {QUIZ_COLUMNS} FROM quizzes WHERE id = $1"))
        .bind(quiz_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))
}

/// Question order is the insertion order; there is no explicit order column.
async fn fetch_questions(pool: &PgPool, quiz_id: i64) -> Result<Vec<Question>, AppError> {
    Ok(sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE quiz_id = $1 ORDER BY id"
    ))
    .bind(quiz_id)
    .fetch_all(pool)
    .await?)
}

/// Resolves the quiz's owning course and runs the edit capability through
/// the gate. A quiz is always addressed through its course's owner.
async fn authorize_edit(
    pool: &PgPool,
    identity: &Identity,
    quiz: &Quiz,
) -> Result<(), AppError> {
    let course = fetch_course(pool, quiz.course_id).await?;
    authz::authorize(
        Some(identity),
        Capability::EditQuiz {
            responsible_user_id: course.responsible_user_id,
        },
    )
}

async fn require_enrollment(
    pool: &PgPool,
    course_id: i64,
    learner_id: i64,
) -> Result<(), AppError> {
    let enrolled = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM attendees WHERE course_id = $1 AND learner_id = $2",
    )
    .bind(course_id)
    .bind(learner_id)
    .fetch_optional(pool)
    .await?;

    if enrolled.is_none() {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

/// Scores a submission against the quiz's questions.
///
/// A question counts as correct iff the selected option index set equals the
/// set of options flagged correct, exactly. No partial credit. A question
/// with no correct option can never be answered correctly.
/// Returns (correct_count, score in [0, 1]).
fn score_submission(
    questions: &[Question],
    answers: &HashMap<i64, Vec<i32>>,
) -> (usize, f64) {
    let total = questions.len();
    if total == 0 {
        return (0, 0.0);
    }

    let mut correct_count = 0;
    for question in questions {
        let correct: BTreeSet<i32> = question
            .options
            .0
            .iter()
            .enumerate()
            .filter(|(_, o)| o.is_correct)
            .map(|(i, _)| i as i32)
            .collect();

        if correct.is_empty() {
            continue;
        }

        let selected: BTreeSet<i32> = answers
            .get(&question.id)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();

        if selected == correct {
            correct_count += 1;
        }
    }

    (correct_count, correct_count as f64 / total as f64)
}

/// Authoring view of a quiz: questions with their correctness flags.
/// Course owner or admin only.
pub async fn get_quiz(
    State(pool): State<PgPool>,
    Extension(identity): Extension<Identity>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = fetch_quiz(&pool, quiz_id).await?;
    authorize_edit(&pool, &identity, &quiz).await?;

    let questions = fetch_questions(&pool, quiz_id).await?;

    Ok(Json(serde_json::json!({
        "quiz": quiz,
        "questions": questions,
    })))
}

/// Learner view of a quiz: questions with answer flags stripped.
/// Enrolled learners only.
pub async fn get_paper(
    State(pool): State<PgPool>,
    Extension(identity): Extension<Identity>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = fetch_quiz(&pool, quiz_id).await?;
    require_enrollment(&pool, quiz.course_id, identity.id).await?;

    let questions: Vec<PublicQuestion> = fetch_questions(&pool, quiz_id)
        .await?
        .into_iter()
        .map(PublicQuestion::from)
        .collect();

    Ok(Json(serde_json::json!({
        "id": quiz.id,
        "title": quiz.title,
        "questions": questions,
    })))
}

/// Adds a question to the end of the quiz's sequence.
pub async fn add_question(
    State(pool): State<PgPool>,
    Extension(identity): Extension<Identity>,
    Path(quiz_id): Path<i64>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = fetch_quiz(&pool, quiz_id).await?;
    authorize_edit(&pool, &identity, &quiz).await?;

    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::Validation(validation_errors.to_string()));
    }

    let question = sqlx::query_as::<_, Question>(&format!(
        r#"
        INSERT INTO questions (quiz_id, question_text, options)
        VALUES ($1, $2, $3)
        RETURNING {QUESTION_COLUMNS}
        "#
    ))
    .bind(quiz_id)
    .bind(&payload.question_text)
    .bind(sqlx::types::Json(payload.options))
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create question: {:?}", e);
        AppError::Storage(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(question)))
}

/// Replaces a question's text and its full option list in one write.
/// There are no partial option updates.
pub async fn update_question(
    State(pool): State<PgPool>,
    Extension(identity): Extension<Identity>,
    Path(question_id): Path<i64>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let quiz_id = sqlx::query_scalar::<_, i64>("SELECT quiz_id FROM questions WHERE id = $1")
        .bind(question_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Question not found".to_string()))?;

    let quiz = fetch_quiz(&pool, quiz_id).await?;
    authorize_edit(&pool, &identity, &quiz).await?;

    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::Validation(validation_errors.to_string()));
    }

    let question = sqlx::query_as::<_, Question>(&format!(
        r#"
        UPDATE questions
        SET question_text = $1, options = $2
        WHERE id = $3
        RETURNING {QUESTION_COLUMNS}
        "#
    ))
    .bind(&payload.question_text)
    .bind(sqlx::types::Json(payload.options))
    .bind(question_id)
    .fetch_one(&pool)
    .await?;

    Ok(Json(question))
}

/// Deletes a question. Remaining questions keep their natural order; nothing
/// is renumbered.
pub async fn delete_question(
    State(pool): State<PgPool>,
    Extension(identity): Extension<Identity>,
    Path(question_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz_id = sqlx::query_scalar::<_, i64>("SELECT quiz_id FROM questions WHERE id = $1")
        .bind(question_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Question not found".to_string()))?;

    let quiz = fetch_quiz(&pool, quiz_id).await?;
    authorize_edit(&pool, &identity, &quiz).await?;

    sqlx::query("DELETE FROM questions WHERE id = $1")
        .bind(question_id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete question: {:?}", e);
            AppError::Storage(e.to_string())
        })?;

    Ok(StatusCode::NO_CONTENT)
}

/// Replaces the quiz's four-bucket reward schedule.
pub async fn update_rewards(
    State(pool): State<PgPool>,
    Extension(identity): Extension<Identity>,
    Path(quiz_id): Path<i64>,
    Json(payload): Json<UpdateRewardsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = fetch_quiz(&pool, quiz_id).await?;
    authorize_edit(&pool, &identity, &quiz).await?;

    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::Validation(validation_errors.to_string()));
    }

    let updated = sqlx::query_as::<_, Quiz>(&format!(
        r#"
        UPDATE quizzes
        SET first_try = $1, second_try = $2, third_try = $3, fourth_plus = $4
        WHERE id = $5
        RETURNING {QUIZ_COLUMNS}
        "#
    ))
    .bind(payload.first_try)
    .bind(payload.second_try)
    .bind(payload.third_try)
    .bind(payload.fourth_plus)
    .bind(quiz_id)
    .fetch_one(&pool)
    .await?;

    Ok(Json(updated))
}

/// Scores a learner's submission and records the attempt.
///
/// The attempt number is the learner's prior attempt count on this quiz plus
/// one, assigned under a lock on the quiz row so concurrent submissions
/// cannot share a number. The awarded points come from the fixed four-bucket
/// schedule regardless of score.
pub async fn submit_attempt(
    State(pool): State<PgPool>,
    Extension(identity): Extension<Identity>,
    Path(quiz_id): Path<i64>,
    Json(payload): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = fetch_quiz(&pool, quiz_id).await?;
    require_enrollment(&pool, quiz.course_id, identity.id).await?;

    let questions = fetch_questions(&pool, quiz_id).await?;
    let (correct_count, score) = score_submission(&questions, &payload.answers);

    let mut tx = pool.begin().await?;

    sqlx::query("SELECT id FROM quizzes WHERE id = $1 FOR UPDATE")
        .bind(quiz_id)
        .execute(&mut *tx)
        .await?;

    let prior_attempts: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM quiz_attempts WHERE quiz_id = $1 AND learner_id = $2",
    )
    .bind(quiz_id)
    .bind(identity.id)
    .fetch_one(&mut *tx)
    .await?;

    let attempt_number = prior_attempts + 1;
    let awarded_points = quiz.rewards.points_for(attempt_number);

    sqlx::query(
        r#"
        INSERT INTO quiz_attempts (quiz_id, learner_id, attempt_number, score, awarded_points)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(quiz_id)
    .bind(identity.id)
    .bind(attempt_number)
    .bind(score)
    .bind(awarded_points)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to record quiz attempt: {:?}", e);
        AppError::Storage(e.to_string())
    })?;

    tx.commit().await?;

    Ok(Json(serde_json::json!({
        "score": score,
        "correct_count": correct_count,
        "total_questions": questions.len(),
        "attempt_number": attempt_number,
        "awarded_points": awarded_points,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::quiz::QuizOption;
    use sqlx::types::Json;

    fn question(id: i64, flags: &[bool]) -> Question {
        Question {
            id,
            quiz_id: 1,
            question_text: format!("Question {}", id),
            options: Json(
                flags
                    .iter()
                    .enumerate()
                    .map(|(i, &is_correct)| QuizOption {
                        option_text: format!("Option {}", i),
                        is_correct,
                    })
                    .collect(),
            ),
            created_at: None,
        }
    }

    #[test]
    fn exact_selection_scores_full_marks() {
        let questions = vec![question(1, &[true, false]), question(2, &[false, true, true])];
        let mut answers = HashMap::new();
        answers.insert(1, vec![0]);
        answers.insert(2, vec![1, 2]);

        let (correct, score) = score_submission(&questions, &answers);
        assert_eq!(correct, 2);
        assert_eq!(score, 1.0);
    }

    #[test]
    fn selection_order_does_not_matter() {
        let questions = vec![question(1, &[true, true, false])];
        let mut answers = HashMap::new();
        answers.insert(1, vec![1, 0]);

        let (correct, score) = score_submission(&questions, &answers);
        assert_eq!(correct, 1);
        assert_eq!(score, 1.0);
    }

    #[test]
    fn subset_and_superset_are_both_incorrect() {
        let questions = vec![question(1, &[true, true, false])];

        let mut subset = HashMap::new();
        subset.insert(1, vec![0]);
        assert_eq!(score_submission(&questions, &subset).0, 0);

        let mut superset = HashMap::new();
        superset.insert(1, vec![0, 1, 2]);
        assert_eq!(score_submission(&questions, &superset).0, 0);
    }

    #[test]
    fn unanswered_question_is_incorrect() {
        let questions = vec![question(1, &[true, false]), question(2, &[true, false])];
        let mut answers = HashMap::new();
        answers.insert(1, vec![0]);

        let (correct, score) = score_submission(&questions, &answers);
        assert_eq!(correct, 1);
        assert_eq!(score, 0.5);
    }

    #[test]
    fn question_without_correct_option_never_scores() {
        let questions = vec![question(1, &[false, false])];
        // even selecting nothing does not match the empty correct set
        let answers = HashMap::new();
        assert_eq!(score_submission(&questions, &answers), (0, 0.0));
    }

    #[test]
    fn empty_quiz_scores_zero() {
        assert_eq!(score_submission(&[], &HashMap::new()), (0, 0.0));
    }
}
