use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::test_run::{TestKind, WrongQuestion};

/// Who an in-progress session belongs to. Guest sessions have no account;
/// possession of the unguessable session id is the client binding, and their
/// results are never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionOwner {
    Account(String),
    Guest,
}

/// An attempt between start and finalization. Lives only in the tracker's
/// map; a process restart drops all in-progress sessions.
#[derive(Debug, Clone)]
pub struct ActiveSession {
    pub id: String,
    pub owner: SessionOwner,
    pub kind: TestKind,
    pub total_questions: u32,
    pub time_limit_secs: f64,
    pub started_at: DateTime<Utc>,
    pub question_times: Vec<f64>,
    pub wrong_questions: Vec<WrongQuestion>,
    pub current_question: u32,
    pub completed: bool,
}

impl ActiveSession {
    pub fn total_time(&self) -> f64 {
        self.question_times.iter().sum()
    }

    /// Wall-clock seconds since start, clamped to the time limit once the
    /// session has run out.
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> f64 {
        let elapsed = (now - self.started_at)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        elapsed.min(self.time_limit_secs)
    }

    pub fn expired(&self, now: DateTime<Utc>, grace_secs: f64) -> bool {
        let elapsed = (now - self.started_at)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        elapsed > self.time_limit_secs + grace_secs
    }
}
