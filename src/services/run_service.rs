use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::taxonomy::CategoryTaxonomy;
use crate::models::test_run::{NewTestRun, TestRun, WrongQuestion};

/// Helper struct for fetching wrong-question rows together with their run id.
#[derive(sqlx::FromRow)]
struct WrongRow {
    run_id: String,
    ordinal: i64,
    category: String,
    subcategory: String,
}

/// Durable storage of finalized runs. All multi-row writes go through a
/// transaction so a partially written run is never observable.
#[derive(Clone)]
pub struct RunService {
    pool: SqlitePool,
}

impl RunService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn validate(new: &NewTestRun) -> Result<()> {
        if new.total_questions <= 0 {
            return Err(Error::Validation(
                "total_questions must be positive".to_string(),
            ));
        }
        if new.completed_questions < 0 || new.completed_questions > new.total_questions {
            return Err(Error::Validation(
                "completed_questions must be between 0 and total_questions".to_string(),
            ));
        }
        if new.question_times.len() as i64 != new.completed_questions {
            return Err(Error::Validation(
                "question_times must have one entry per completed question".to_string(),
            ));
        }
        if new.question_times.iter().any(|t| !t.is_finite() || *t < 0.0) {
            return Err(Error::Validation(
                "question times must be finite and non-negative".to_string(),
            ));
        }
        if !new.total_time.is_finite() || new.total_time < 0.0 {
            return Err(Error::Validation(
                "total_time must be finite and non-negative".to_string(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for wrong in &new.wrong_questions {
            if wrong.ordinal < 1 || wrong.ordinal > new.completed_questions {
                return Err(Error::Validation(format!(
                    "wrong-question ordinal {} is outside 1..={}",
                    wrong.ordinal, new.completed_questions
                )));
            }
            if !seen.insert(wrong.ordinal) {
                return Err(Error::Validation(format!(
                    "duplicate wrong-question ordinal {}",
                    wrong.ordinal
                )));
            }
            if !CategoryTaxonomy::contains_category(&wrong.category) {
                return Err(Error::Validation(format!(
                    "unknown category '{}'",
                    wrong.category
                )));
            }
        }
        Ok(())
    }

    pub async fn create(&self, new: NewTestRun) -> Result<TestRun> {
        Self::validate(&new)?;

        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now();
        let times_json = serde_json::to_string(&new.question_times)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"INSERT INTO test_runs
               (id, account_id, kind, total_questions, completed_questions,
                total_time, question_times, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
        )
        .bind(&id)
        .bind(&new.account_id)
        .bind(new.kind)
        .bind(new.total_questions)
        .bind(new.completed_questions)
        .bind(new.total_time)
        .bind(&times_json)
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

        for wrong in &new.wrong_questions {
            sqlx::query(
                r#"INSERT INTO wrong_questions (run_id, ordinal, category, subcategory)
                   VALUES (?1, ?2, ?3, ?4)"#,
            )
            .bind(&id)
            .bind(wrong.ordinal)
            .bind(&wrong.category)
            .bind(&wrong.subcategory)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(run_id = %id, account_id = %new.account_id, "Persisted test run");

        Ok(TestRun {
            id,
            account_id: new.account_id,
            kind: new.kind,
            total_questions: new.total_questions,
            completed_questions: new.completed_questions,
            total_time: new.total_time,
            question_times: sqlx::types::Json(new.question_times),
            created_at,
            wrong_questions: new.wrong_questions,
        })
    }

    pub async fn get(&self, id: &str, account_id: &str) -> Result<TestRun> {
        let run: Option<TestRun> = sqlx::query_as(r#"SELECT * FROM test_runs WHERE id = ?1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let mut run = run.ok_or_else(|| Error::NotFound("Test run not found".to_string()))?;
        if run.account_id != account_id {
            return Err(Error::Forbidden(
                "Test run belongs to another account".to_string(),
            ));
        }

        run.wrong_questions = sqlx::query_as::<_, WrongRow>(
            r#"SELECT run_id, ordinal, category, subcategory
               FROM wrong_questions WHERE run_id = ?1 ORDER BY ordinal"#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| WrongQuestion {
            ordinal: row.ordinal,
            category: row.category,
            subcategory: row.subcategory,
        })
        .collect();

        Ok(run)
    }

    /// Most recent first; creation-time ties are broken by id descending so
    /// the order is deterministic.
    pub async fn list_for_account(
        &self,
        account_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<TestRun>> {
        let mut runs: Vec<TestRun> = sqlx::query_as(
            r#"SELECT * FROM test_runs WHERE account_id = ?1
               ORDER BY created_at DESC, id DESC
               LIMIT ?2"#,
        )
        .bind(account_id)
        .bind(limit.unwrap_or(-1))
        .fetch_all(&self.pool)
        .await?;

        if runs.is_empty() {
            return Ok(runs);
        }

        let mut query_builder = QueryBuilder::<Sqlite>::new(
            "SELECT run_id, ordinal, category, subcategory FROM wrong_questions WHERE run_id IN (",
        );
        let mut separated = query_builder.separated(",");
        for run in &runs {
            separated.push_bind(run.id.clone());
        }
        separated.push_unseparated(") ORDER BY ordinal");

        let rows: Vec<WrongRow> = query_builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;

        let mut by_run: std::collections::HashMap<String, Vec<WrongQuestion>> =
            std::collections::HashMap::new();
        for row in rows {
            by_run.entry(row.run_id).or_default().push(WrongQuestion {
                ordinal: row.ordinal,
                category: row.category,
                subcategory: row.subcategory,
            });
        }
        for run in &mut runs {
            if let Some(wrong) = by_run.remove(&run.id) {
                run.wrong_questions = wrong;
            }
        }

        Ok(runs)
    }

    /// Re-tag one wrong question. Only ordinals already in the run's wrong
    /// set can be tagged; repeating the same call is a no-op.
    pub async fn update_categories(
        &self,
        id: &str,
        account_id: &str,
        ordinal: i64,
        category: &str,
        subcategory: &str,
    ) -> Result<()> {
        if !CategoryTaxonomy::contains_category(category) {
            return Err(Error::Validation(format!("unknown category '{}'", category)));
        }

        let owner: Option<String> =
            sqlx::query_scalar(r#"SELECT account_id FROM test_runs WHERE id = ?1"#)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        let owner = owner.ok_or_else(|| Error::NotFound("Test run not found".to_string()))?;
        if owner != account_id {
            return Err(Error::Forbidden(
                "Test run belongs to another account".to_string(),
            ));
        }

        let result = sqlx::query(
            r#"UPDATE wrong_questions SET category = ?1, subcategory = ?2
               WHERE run_id = ?3 AND ordinal = ?4"#,
        )
        .bind(category)
        .bind(subcategory)
        .bind(id)
        .bind(ordinal)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::Validation(format!(
                "question {} is not in the run's wrong-question set",
                ordinal
            )));
        }
        Ok(())
    }
}
