use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::test_run::TestKind;

#[derive(Debug, Deserialize, Validate)]
pub struct StartTestRequest {
    pub kind: TestKind,
    #[validate(range(min = 1))]
    pub num_questions: u32,
    /// Time limit in seconds.
    #[validate(range(min = 1.0))]
    pub time_limit_secs: f64,
}

#[derive(Debug, Serialize)]
pub struct StartTestResponse {
    pub session_id: String,
    pub kind: TestKind,
    pub total_questions: u32,
    pub time_limit_secs: f64,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct WrongTagPayload {
    #[validate(length(min = 1))]
    pub category: String,
    #[validate(length(min = 1))]
    pub subcategory: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RecordAnswerRequest {
    #[validate(range(min = 1))]
    pub ordinal: u32,
    /// Seconds spent on this question.
    pub seconds: f64,
    #[validate(nested)]
    pub wrong: Option<WrongTagPayload>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCategoriesRequest {
    #[validate(range(min = 1))]
    pub ordinal: i64,
    #[validate(length(min = 1))]
    pub category: String,
    #[validate(length(min = 1))]
    pub subcategory: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}
