//! Integration tests against a real Postgres instance.
//!
//! Set `TEST_DATABASE_URL` to run these; without it each test logs a skip
//! notice and passes. Tests isolate themselves by using a unique job kind,
//! so they can share a database.

use studymill_core::{JobStatus, Quiz, QuizQuestion, StudyJob, StudyOutput};
use studymill_store::Store;
use uuid::Uuid;

async fn test_store() -> Option<Store> {
    let url = match std::env::var("TEST_DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("TEST_DATABASE_URL not set; skipping");
            return None;
        }
    };

    let store = Store::connect(&url).await.expect("failed to connect");
    store.migrate().await.expect("failed to migrate");
    Some(store)
}

fn unique_kind() -> String {
    format!("test_{}", Uuid::new_v4().simple())
}

fn sample_output(prompt: &str) -> StudyOutput {
    StudyOutput {
        summary: "## Summary\nGenerated study guide.".to_string(),
        quiz: Quiz {
            questions: vec![QuizQuestion {
                prompt: prompt.to_string(),
                options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                correct_answer: "a".to_string(),
            }],
        },
    }
}

#[tokio::test]
async fn submit_claim_complete() {
    let Some(store) = test_store().await else { return };
    let kind = unique_kind();

    let job = StudyJob::new(1, "notes.txt", &kind).unwrap();
    let job_id = job.id;
    store.enqueue(&job).await.unwrap();

    let claimed = store
        .claim_next("worker-1", &[kind.clone()])
        .await
        .unwrap()
        .expect("job should be claimable");

    assert_eq!(claimed.id, job_id);
    assert_eq!(claimed.status, JobStatus::Running);
    assert_eq!(claimed.attempts, 1);
    assert_eq!(claimed.claimed_by.as_deref(), Some("worker-1"));

    // Already claimed: a second claim finds nothing
    assert!(store.claim_next("worker-2", &[kind.clone()]).await.unwrap().is_none());

    store.complete(job_id).await.unwrap();
    let done = store.get_job(job_id).await.unwrap().unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert!(done.claimed_by.is_none());
}

#[tokio::test]
async fn failed_job_is_scheduled_for_retry() {
    let Some(store) = test_store().await else { return };
    let kind = unique_kind();

    let job = StudyJob::new(2, "notes.txt", &kind).unwrap();
    let job_id = job.id;
    store.enqueue(&job).await.unwrap();

    store.claim_next("worker-1", &[kind.clone()]).await.unwrap().unwrap();
    let status = store.fail(job_id, "ai timeout").await.unwrap();
    assert_eq!(status, JobStatus::Failed);

    let failed = store.get_job(job_id).await.unwrap().unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.last_error.as_deref(), Some("ai timeout"));
    assert!(failed.scheduled_at > chrono::Utc::now());

    // Not due yet, so it cannot be claimed
    assert!(store.claim_next("worker-1", &[kind]).await.unwrap().is_none());
}

#[tokio::test]
async fn job_dead_letters_after_max_attempts() {
    let Some(store) = test_store().await else { return };
    let kind = unique_kind();

    let mut job = StudyJob::new(3, "notes.txt", &kind).unwrap();
    job.max_attempts = 1;
    let job_id = job.id;
    store.enqueue(&job).await.unwrap();

    store.claim_next("worker-1", &[kind]).await.unwrap().unwrap();
    let status = store.fail(job_id, "still broken").await.unwrap();
    assert_eq!(status, JobStatus::Dead);

    let dead = store.get_job(job_id).await.unwrap().unwrap();
    assert_eq!(dead.status, JobStatus::Dead);
}

#[tokio::test]
async fn dead_letter_skips_remaining_attempts() {
    let Some(store) = test_store().await else { return };
    let kind = unique_kind();

    let job = StudyJob::new(4, "notes.txt", &kind).unwrap();
    let job_id = job.id;
    store.enqueue(&job).await.unwrap();

    store.claim_next("worker-1", &[kind]).await.unwrap().unwrap();
    store.dead_letter(job_id, "file not found").await.unwrap();

    let dead = store.get_job(job_id).await.unwrap().unwrap();
    assert_eq!(dead.status, JobStatus::Dead);
    assert_eq!(dead.last_error.as_deref(), Some("file not found"));
}

#[tokio::test]
async fn expired_claims_are_released() {
    let Some(store) = test_store().await else { return };
    let kind = unique_kind();

    let job = StudyJob::new(5, "notes.txt", &kind).unwrap();
    let job_id = job.id;
    store.enqueue(&job).await.unwrap();
    store.claim_next("worker-1", &[kind.clone()]).await.unwrap().unwrap();

    // Backdate the claim past the lease
    sqlx::query("UPDATE study_jobs SET claimed_at = now() - interval '10 minutes' WHERE id = $1")
        .bind(job_id)
        .execute(store.pool())
        .await
        .unwrap();

    let released = store.release_expired(300).await.unwrap();
    assert!(released >= 1);

    let job = store.get_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert!(job.claimed_by.is_none());

    // Released job is claimable again, attempts keep counting up
    let reclaimed = store.claim_next("worker-2", &[kind]).await.unwrap().unwrap();
    assert_eq!(reclaimed.id, job_id);
    assert_eq!(reclaimed.attempts, 2);
}

#[tokio::test]
async fn expired_claim_on_last_attempt_is_dead_lettered() {
    let Some(store) = test_store().await else { return };
    let kind = unique_kind();

    let mut job = StudyJob::new(6, "notes.txt", &kind).unwrap();
    job.max_attempts = 1;
    let job_id = job.id;
    store.enqueue(&job).await.unwrap();
    store.claim_next("worker-1", &[kind.clone()]).await.unwrap().unwrap();

    // Backdate the claim past the lease
    sqlx::query("UPDATE study_jobs SET claimed_at = now() - interval '10 minutes' WHERE id = $1")
        .bind(job_id)
        .execute(store.pool())
        .await
        .unwrap();

    store.release_expired(300).await.unwrap();

    // The lost claim was the job's last attempt; it must not cycle back
    let job = store.get_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Dead);
    assert!(job.last_error.is_some());
    assert!(store.claim_next("worker-2", &[kind]).await.unwrap().is_none());
}

#[tokio::test]
async fn lazy_connect_defers_database_io() {
    // No database needed: the pool must build without connecting, and the
    // first real operation is what surfaces the connection error.
    let store = Store::connect_lazy("postgres://127.0.0.1:1/unreachable").unwrap();
    assert!(store.migrate().await.is_err());
}

#[tokio::test]
async fn mark_ready_replaces_questions() {
    let Some(store) = test_store().await else { return };

    let study_id = store.create_study(1, "Biology notes", None).await.unwrap();

    store.mark_study_ready(study_id, &sample_output("first run")).await.unwrap();
    store.mark_study_ready(study_id, &sample_output("second run")).await.unwrap();

    let study = store.get_study(study_id).await.unwrap().unwrap();
    assert_eq!(study.status, "ready");
    assert!(study.summary.contains("study guide"));

    // Reprocessing replaced the old questions instead of appending
    let questions = store.get_questions(study_id).await.unwrap();
    assert_eq!(questions.len(), 1);
    assert_eq!(questions[0].prompt, "second run");
}

#[tokio::test]
async fn mark_failed_records_truncated_error() {
    let Some(store) = test_store().await else { return };

    let study_id = store.create_study(1, "History notes", None).await.unwrap();
    let long_error = "x".repeat(5000);
    store.mark_study_failed(study_id, &long_error).await.unwrap();

    let study = store.get_study(study_id).await.unwrap().unwrap();
    assert_eq!(study.status, "failed");
    assert!(study.summary.starts_with("Processing failed: "));
    assert!(study.summary.chars().count() <= 1000 + "Processing failed: ".len());

    // Missing studies are tolerated
    store.mark_study_failed(i64::MAX, "whatever").await.unwrap();
}

#[tokio::test]
async fn mark_ready_requires_existing_study() {
    let Some(store) = test_store().await else { return };

    let err = store.mark_study_ready(i64::MAX, &sample_output("q")).await;
    assert!(err.is_err());
}
