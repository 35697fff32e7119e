use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

/// Kind of practice test, matching the fixed set the trainer offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TestKind {
    Mathcounts,
    Amc8,
    Amc10,
    Amc12,
    Aime,
    Mandelbrot,
    Custom,
}

/// One wrong-question tag: which question was missed and what it covered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrongQuestion {
    pub ordinal: i64,
    pub category: String,
    pub subcategory: String,
}

/// A finished or abandoned attempt, durable once persisted.
///
/// `question_times` holds per-question durations in seconds, one entry per
/// answered question, in answer order.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TestRun {
    pub id: String,
    pub account_id: String,
    pub kind: TestKind,
    pub total_questions: i64,
    pub completed_questions: i64,
    pub total_time: f64,
    pub question_times: Json<Vec<f64>>,
    pub created_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub wrong_questions: Vec<WrongQuestion>,
}

impl TestRun {
    /// Fraction of all questions answered correctly; 0 for an empty run.
    pub fn accuracy(&self) -> f64 {
        if self.total_questions <= 0 {
            return 0.0;
        }
        (self.completed_questions - self.wrong_questions.len() as i64) as f64
            / self.total_questions as f64
    }
}

/// Input to the repository's `create`; the id and timestamp are assigned on
/// insert.
#[derive(Debug, Clone)]
pub struct NewTestRun {
    pub account_id: String,
    pub kind: TestKind,
    pub total_questions: i64,
    pub completed_questions: i64,
    pub total_time: f64,
    pub question_times: Vec<f64>,
    pub wrong_questions: Vec<WrongQuestion>,
}
