use std::collections::HashSet;

use chrono::Utc;
use sqlx::SqlitePool;

use trainer_backend::error::Error;
use trainer_backend::models::session::SessionOwner;
use trainer_backend::models::test_run::TestKind;
use trainer_backend::services::run_service::RunService;
use trainer_backend::services::session_service::{SessionTracker, WrongAnswerTag};

async fn test_pool() -> SqlitePool {
    let pool = trainer_backend::database::pool::connect("sqlite::memory:")
        .await
        .expect("pool");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");
    pool
}

async fn seed_account(pool: &SqlitePool, id: &str) {
    sqlx::query(
        r#"INSERT INTO accounts (id, username, password_hash, created_at)
           VALUES (?1, ?2, ?3, ?4)"#,
    )
    .bind(id)
    .bind(format!("user_{}", id))
    .bind("not-a-real-hash")
    .bind(Utc::now())
    .execute(pool)
    .await
    .expect("seed account");
}

fn tracker(pool: &SqlitePool, grace_secs: u64) -> SessionTracker {
    SessionTracker::new(RunService::new(pool.clone()), grace_secs)
}

async fn run_count(pool: &SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM test_runs")
        .fetch_one(pool)
        .await
        .expect("count")
}

#[tokio::test]
async fn concurrent_starts_yield_distinct_ids() {
    let pool = test_pool().await;
    let tracker = tracker(&pool, 120);

    let mut handles = Vec::new();
    for _ in 0..100 {
        let tracker = tracker.clone();
        handles.push(tokio::spawn(async move {
            tracker
                .start(SessionOwner::Guest, TestKind::Amc8, 25, 2400.0)
                .expect("start")
                .session_id
        }));
    }

    let mut ids = HashSet::new();
    for handle in handles {
        ids.insert(handle.await.expect("join"));
    }
    assert_eq!(ids.len(), 100);
    assert_eq!(tracker.active_count(), 100);
}

#[tokio::test]
async fn start_rejects_invalid_parameters() {
    let pool = test_pool().await;
    let tracker = tracker(&pool, 120);

    let err = tracker
        .start(SessionOwner::Guest, TestKind::Custom, 0, 600.0)
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let err = tracker
        .start(SessionOwner::Guest, TestKind::Custom, 10, 0.0)
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn ordinal_replay_is_a_conflict() {
    let pool = test_pool().await;
    let tracker = tracker(&pool, 120);
    let caller = SessionOwner::Guest;

    let started = tracker
        .start(SessionOwner::Guest, TestKind::Mathcounts, 5, 2400.0)
        .expect("start");
    let id = started.session_id;

    tracker
        .record_answer(&id, &caller, 1, 12.0, None)
        .await
        .expect("first answer");

    let err = tracker
        .record_answer(&id, &caller, 1, 9.0, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    // Skipping ahead is rejected too.
    let err = tracker
        .record_answer(&id, &caller, 3, 9.0, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    // The replayed answer left no duplicate time entry.
    let snapshot = tracker.get_snapshot(&id, &caller).await.expect("snapshot");
    assert_eq!(snapshot.question_times, vec![12.0]);
    assert_eq!(snapshot.current_question, 1);
}

#[tokio::test]
async fn unknown_category_tag_is_rejected() {
    let pool = test_pool().await;
    let tracker = tracker(&pool, 120);
    let caller = SessionOwner::Guest;

    let id = tracker
        .start(SessionOwner::Guest, TestKind::Amc10, 5, 2400.0)
        .expect("start")
        .session_id;

    let err = tracker
        .record_answer(
            &id,
            &caller,
            1,
            10.0,
            Some(WrongAnswerTag {
                category: "Astrology".to_string(),
                subcategory: "Horoscopes".to_string(),
            }),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    // The rejected answer advanced nothing.
    let snapshot = tracker.get_snapshot(&id, &caller).await.expect("snapshot");
    assert_eq!(snapshot.current_question, 0);
}

#[tokio::test]
async fn owned_session_rejects_other_callers() {
    let pool = test_pool().await;
    seed_account(&pool, "acct-a").await;
    let tracker = tracker(&pool, 120);

    let id = tracker
        .start(
            SessionOwner::Account("acct-a".to_string()),
            TestKind::Aime,
            15,
            3600.0,
        )
        .expect("start")
        .session_id;

    let err = tracker
        .record_answer(
            &id,
            &SessionOwner::Account("acct-b".to_string()),
            1,
            10.0,
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));

    let err = tracker
        .record_answer(&id, &SessionOwner::Guest, 1, 10.0, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));

    tracker
        .record_answer(
            &id,
            &SessionOwner::Account("acct-a".to_string()),
            1,
            10.0,
            None,
        )
        .await
        .expect("owner can answer");
}

#[tokio::test]
async fn completion_persists_exactly_one_run() {
    let pool = test_pool().await;
    seed_account(&pool, "acct-1").await;
    let tracker = tracker(&pool, 120);
    let caller = SessionOwner::Account("acct-1".to_string());

    let id = tracker
        .start(caller.clone(), TestKind::Mathcounts, 3, 2400.0)
        .expect("start")
        .session_id;

    tracker
        .record_answer(&id, &caller, 1, 20.0, None)
        .await
        .expect("q1");
    tracker
        .record_answer(
            &id,
            &caller,
            2,
            35.0,
            Some(WrongAnswerTag {
                category: "Algebra".to_string(),
                subcategory: "Quadratics".to_string(),
            }),
        )
        .await
        .expect("q2");
    let outcome = tracker
        .record_answer(&id, &caller, 3, 45.0, None)
        .await
        .expect("q3");

    assert!(outcome.completed);
    let result = outcome.result.expect("finished run");
    assert!(result.persisted);
    let run_id = result.run_id.expect("run id");
    assert_eq!(result.completed_questions, 3);
    assert_eq!(result.total_time, 100.0);

    assert_eq!(run_count(&pool).await, 1);
    assert_eq!(tracker.active_count(), 0);

    // Duplicate finalization attempt on the removed session.
    let err = tracker
        .record_answer(&id, &caller, 3, 45.0, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    let run = RunService::new(pool.clone())
        .get(&run_id, "acct-1")
        .await
        .expect("persisted run");
    assert_eq!(run.completed_questions, 3);
    assert_eq!(run.wrong_questions.len(), 1);
    assert_eq!(run.wrong_questions[0].ordinal, 2);
}

#[tokio::test]
async fn racing_final_answers_persist_one_run() {
    let pool = test_pool().await;
    seed_account(&pool, "acct-race").await;
    let tracker = tracker(&pool, 120);
    let caller = SessionOwner::Account("acct-race".to_string());

    let id = tracker
        .start(caller.clone(), TestKind::Amc12, 1, 2400.0)
        .expect("start")
        .session_id;

    let a = {
        let tracker = tracker.clone();
        let id = id.clone();
        let caller = caller.clone();
        tokio::spawn(async move { tracker.record_answer(&id, &caller, 1, 30.0, None).await })
    };
    let b = {
        let tracker = tracker.clone();
        let id = id.clone();
        let caller = caller.clone();
        tokio::spawn(async move { tracker.record_answer(&id, &caller, 1, 30.0, None).await })
    };

    let results = [a.await.expect("join"), b.await.expect("join")];
    let oks = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(oks, 1, "exactly one final submission may win");
    for result in &results {
        if let Err(err) = result {
            assert!(matches!(err, Error::NotFound(_) | Error::Conflict(_)));
        }
    }

    assert_eq!(run_count(&pool).await, 1);
    assert_eq!(tracker.active_count(), 0);
}

#[tokio::test]
async fn guest_completion_is_never_persisted() {
    let pool = test_pool().await;
    let tracker = tracker(&pool, 120);
    let caller = SessionOwner::Guest;

    let id = tracker
        .start(SessionOwner::Guest, TestKind::Custom, 2, 600.0)
        .expect("start")
        .session_id;

    tracker
        .record_answer(&id, &caller, 1, 10.0, None)
        .await
        .expect("q1");
    let outcome = tracker
        .record_answer(&id, &caller, 2, 15.0, None)
        .await
        .expect("q2");

    let result = outcome.result.expect("finished run");
    assert!(!result.persisted);
    assert!(result.run_id.is_none());
    assert_eq!(result.question_times, vec![10.0, 15.0]);

    assert_eq!(run_count(&pool).await, 0);
    assert_eq!(tracker.active_count(), 0);
}

#[tokio::test]
async fn sweep_reclaims_expired_sessions_and_persists_partials() {
    let pool = test_pool().await;
    seed_account(&pool, "acct-sweep").await;
    let tracker = tracker(&pool, 0);
    let caller = SessionOwner::Account("acct-sweep".to_string());

    // Owned session with one recorded answer: persisted as abandoned.
    let owned = tracker
        .start(caller.clone(), TestKind::Mathcounts, 10, 0.5)
        .expect("start owned")
        .session_id;
    tracker
        .record_answer(&owned, &caller, 1, 0.2, None)
        .await
        .expect("answer before expiry");

    // Guest session and an owned session with no answers: dropped silently.
    let guest = tracker
        .start(SessionOwner::Guest, TestKind::Amc8, 10, 0.5)
        .expect("start guest")
        .session_id;
    tracker
        .start(caller.clone(), TestKind::Amc8, 10, 0.5)
        .expect("start idle");

    tokio::time::sleep(std::time::Duration::from_millis(800)).await;

    let reclaimed = tracker.sweep().await;
    assert_eq!(reclaimed, 3);
    assert_eq!(tracker.active_count(), 0);

    assert_eq!(run_count(&pool).await, 1);
    let runs = RunService::new(pool.clone())
        .list_for_account("acct-sweep", None)
        .await
        .expect("list");
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].completed_questions, 1);
    assert_eq!(runs[0].total_questions, 10);

    let err = tracker
        .get_snapshot(&guest, &SessionOwner::Guest)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn answers_after_expiry_are_not_found() {
    let pool = test_pool().await;
    let tracker = tracker(&pool, 0);
    let caller = SessionOwner::Guest;

    let id = tracker
        .start(SessionOwner::Guest, TestKind::Custom, 5, 0.2)
        .expect("start")
        .session_id;

    tokio::time::sleep(std::time::Duration::from_millis(500)).await;

    let err = tracker
        .record_answer(&id, &caller, 1, 5.0, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert_eq!(tracker.active_count(), 0);
}

#[tokio::test]
async fn snapshot_clamps_elapsed_to_time_limit() {
    let pool = test_pool().await;
    let tracker = tracker(&pool, 3600);
    let caller = SessionOwner::Guest;

    let id = tracker
        .start(SessionOwner::Guest, TestKind::Custom, 5, 0.1)
        .expect("start")
        .session_id;

    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    // Generous grace keeps the session alive while the limit is exceeded.
    let snapshot = tracker.get_snapshot(&id, &caller).await.expect("snapshot");
    assert_eq!(snapshot.elapsed_secs, 0.1);
    assert_eq!(snapshot.remaining_secs, 0.0);
}
