use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;

use crate::error::{Error, Result};
use crate::models::session::{ActiveSession, SessionOwner};
use crate::models::taxonomy::CategoryTaxonomy;
use crate::models::test_run::{NewTestRun, TestKind, WrongQuestion};
use crate::services::run_service::RunService;
use crate::utils::token::generate_session_id;

const SESSION_ID_LEN: usize = 22;

/// Tag supplied with an incorrectly answered question.
#[derive(Debug, Clone)]
pub struct WrongAnswerTag {
    pub category: String,
    pub subcategory: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartedSession {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
}

/// Result of a completed (or abandoned-and-reclaimed) attempt. `run_id` is
/// present only when the run was persisted; guest results live solely in
/// this value.
#[derive(Debug, Clone, Serialize)]
pub struct FinishedRun {
    pub run_id: Option<String>,
    pub kind: TestKind,
    pub total_questions: u32,
    pub completed_questions: u32,
    pub total_time: f64,
    pub question_times: Vec<f64>,
    pub wrong_questions: Vec<WrongQuestion>,
    pub persisted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerOutcome {
    pub current_question: u32,
    pub completed: bool,
    pub result: Option<FinishedRun>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub kind: TestKind,
    pub total_questions: u32,
    pub current_question: u32,
    pub time_limit_secs: f64,
    pub elapsed_secs: f64,
    pub remaining_secs: f64,
    pub question_times: Vec<f64>,
    pub started_at: DateTime<Utc>,
}

/// Tracks attempts between start and exactly-once finalization.
///
/// The outer map guard is never held across an await; each session carries
/// its own async mutex, so answers for one session are serialized while
/// distinct sessions proceed in parallel.
#[derive(Clone)]
pub struct SessionTracker {
    runs: RunService,
    sessions: Arc<Mutex<HashMap<String, Arc<AsyncMutex<ActiveSession>>>>>,
    grace_secs: f64,
}

impl SessionTracker {
    pub fn new(runs: RunService, grace_secs: u64) -> Self {
        Self {
            runs,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            grace_secs: grace_secs as f64,
        }
    }

    pub fn start(
        &self,
        owner: SessionOwner,
        kind: TestKind,
        question_count: u32,
        time_limit_secs: f64,
    ) -> Result<StartedSession> {
        if question_count == 0 {
            return Err(Error::Validation(
                "question count must be positive".to_string(),
            ));
        }
        if !time_limit_secs.is_finite() || time_limit_secs <= 0.0 {
            return Err(Error::Validation("time limit must be positive".to_string()));
        }

        let started_at = Utc::now();
        let mut sessions = self.sessions.lock().expect("session map poisoned");
        let id = loop {
            let candidate = generate_session_id(SESSION_ID_LEN);
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };
        let session = ActiveSession {
            id: id.clone(),
            owner,
            kind,
            total_questions: question_count,
            time_limit_secs,
            started_at,
            question_times: Vec::new(),
            wrong_questions: Vec::new(),
            current_question: 0,
            completed: false,
        };
        sessions.insert(id.clone(), Arc::new(AsyncMutex::new(session)));
        drop(sessions);

        tracing::info!(session_id = %id, ?kind, question_count, "Started session");
        Ok(StartedSession {
            session_id: id,
            started_at,
        })
    }

    pub async fn record_answer(
        &self,
        session_id: &str,
        caller: &SessionOwner,
        ordinal: u32,
        seconds: f64,
        wrong: Option<WrongAnswerTag>,
    ) -> Result<AnswerOutcome> {
        let entry = self
            .entry(session_id)
            .ok_or_else(|| Error::NotFound("Session not found".to_string()))?;
        let mut session = entry.lock().await;

        if session.completed {
            return Err(Error::NotFound("Session already finalized".to_string()));
        }
        check_owner(&session.owner, caller)?;

        let now = Utc::now();
        if session.expired(now, self.grace_secs) {
            // Reclaim inline exactly as the sweep would; the answer arrived
            // too late either way.
            if let Err(err) = self.reclaim(&mut session).await {
                tracing::error!(session_id = %session.id, error = ?err,
                    "Failed to persist expired session; leaving it for the sweeper");
            }
            return Err(Error::NotFound("Session expired".to_string()));
        }

        if !seconds.is_finite() || seconds < 0.0 {
            return Err(Error::Validation(
                "seconds must be finite and non-negative".to_string(),
            ));
        }
        // Client ordinals are a hint, checked against the session's own
        // counter; replays and skips are conflicts.
        if ordinal != session.current_question + 1 {
            return Err(Error::Conflict(format!(
                "expected ordinal {}, got {}",
                session.current_question + 1,
                ordinal
            )));
        }
        if let Some(tag) = &wrong {
            if !CategoryTaxonomy::contains_category(&tag.category) {
                return Err(Error::Validation(format!(
                    "unknown category '{}'",
                    tag.category
                )));
            }
        }

        let tagged_wrong = wrong.is_some();
        session.question_times.push(seconds);
        if let Some(tag) = wrong {
            session.wrong_questions.push(WrongQuestion {
                ordinal: ordinal as i64,
                category: tag.category,
                subcategory: tag.subcategory,
            });
        }
        session.current_question += 1;

        if session.current_question < session.total_questions {
            return Ok(AnswerOutcome {
                current_question: session.current_question,
                completed: false,
                result: None,
            });
        }

        // Final answer: persist before flipping the completion flag so a
        // storage failure leaves the session retryable.
        let owner = session.owner.clone();
        let run_id = match owner {
            SessionOwner::Account(account_id) => {
                match self.runs.create(new_run(&session, account_id)).await {
                    Ok(run) => Some(run.id),
                    Err(err) => {
                        session.question_times.pop();
                        if tagged_wrong {
                            session.wrong_questions.pop();
                        }
                        session.current_question -= 1;
                        return Err(err);
                    }
                }
            }
            SessionOwner::Guest => None,
        };

        session.completed = true;
        let result = FinishedRun {
            persisted: run_id.is_some(),
            run_id,
            kind: session.kind,
            total_questions: session.total_questions,
            completed_questions: session.current_question,
            total_time: session.total_time(),
            question_times: session.question_times.clone(),
            wrong_questions: session.wrong_questions.clone(),
        };
        self.remove(&session.id);

        tracing::info!(session_id = %session.id, persisted = result.persisted,
            "Session completed");
        Ok(AnswerOutcome {
            current_question: session.current_question,
            completed: true,
            result: Some(result),
        })
    }

    pub async fn get_snapshot(
        &self,
        session_id: &str,
        caller: &SessionOwner,
    ) -> Result<SessionSnapshot> {
        let entry = self
            .entry(session_id)
            .ok_or_else(|| Error::NotFound("Session not found".to_string()))?;
        let session = entry.lock().await;
        if session.completed {
            return Err(Error::NotFound("Session already finalized".to_string()));
        }
        check_owner(&session.owner, caller)?;

        let elapsed = session.elapsed_secs(Utc::now());
        Ok(SessionSnapshot {
            session_id: session.id.clone(),
            kind: session.kind,
            total_questions: session.total_questions,
            current_question: session.current_question,
            time_limit_secs: session.time_limit_secs,
            elapsed_secs: elapsed,
            remaining_secs: (session.time_limit_secs - elapsed).max(0.0),
            question_times: session.question_times.clone(),
            started_at: session.started_at,
        })
    }

    /// Reclaims sessions idle past `time_limit + grace`. An owned session
    /// with at least one recorded answer is persisted as an abandoned run
    /// first; a persistence failure keeps the session for the next pass.
    pub async fn sweep(&self) -> usize {
        let entries: Vec<Arc<AsyncMutex<ActiveSession>>> = {
            let sessions = self.sessions.lock().expect("session map poisoned");
            sessions.values().cloned().collect()
        };

        let mut reclaimed = 0;
        for entry in entries {
            let mut session = entry.lock().await;
            if session.completed || !session.expired(Utc::now(), self.grace_secs) {
                continue;
            }
            match self.reclaim(&mut session).await {
                Ok(()) => reclaimed += 1,
                Err(err) => {
                    tracing::error!(session_id = %session.id, error = ?err,
                        "Failed to reclaim expired session");
                }
            }
        }
        if reclaimed > 0 {
            tracing::info!(reclaimed, "Swept expired sessions");
        }
        reclaimed
    }

    pub fn active_count(&self) -> usize {
        self.sessions.lock().expect("session map poisoned").len()
    }

    fn entry(&self, session_id: &str) -> Option<Arc<AsyncMutex<ActiveSession>>> {
        self.sessions
            .lock()
            .expect("session map poisoned")
            .get(session_id)
            .cloned()
    }

    fn remove(&self, session_id: &str) {
        self.sessions
            .lock()
            .expect("session map poisoned")
            .remove(session_id);
    }

    /// Persist (when owned and non-empty) and drop one expired session.
    /// Caller holds the session lock.
    async fn reclaim(&self, session: &mut ActiveSession) -> Result<()> {
        if let SessionOwner::Account(account_id) = session.owner.clone() {
            if !session.question_times.is_empty() {
                self.runs.create(new_run(session, account_id)).await?;
                tracing::info!(session_id = %session.id, "Persisted abandoned session");
            }
        }
        session.completed = true;
        self.remove(&session.id);
        Ok(())
    }
}

fn check_owner(owner: &SessionOwner, caller: &SessionOwner) -> Result<()> {
    match (owner, caller) {
        // Guest sessions are bound by possession of the session id.
        (SessionOwner::Guest, _) => Ok(()),
        (SessionOwner::Account(a), SessionOwner::Account(b)) if a == b => Ok(()),
        _ => Err(Error::Forbidden(
            "Session belongs to another account".to_string(),
        )),
    }
}

fn new_run(session: &ActiveSession, account_id: String) -> NewTestRun {
    NewTestRun {
        account_id,
        kind: session.kind,
        total_questions: session.total_questions as i64,
        completed_questions: session.current_question as i64,
        total_time: session.total_time(),
        question_times: session.question_times.clone(),
        wrong_questions: session.wrong_questions.clone(),
    }
}
