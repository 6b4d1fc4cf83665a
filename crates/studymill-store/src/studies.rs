//! Study result operations.
//!
//! The `studies` and `questions` tables are owned by the web tier; the worker
//! only flips a study's status and rewrites its generated content.

use crate::{Result, Store, StoreError};
use chrono::{DateTime, Utc};
use studymill_core::{truncate_message, StudyOutput, StudyStatus, MAX_STORED_ERROR_LEN};
use tracing::{debug, warn};

/// Row shape of `studies`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Study {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub summary: String,
    pub status: String,
    pub file_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Study {
    pub fn status(&self) -> Result<StudyStatus> {
        Ok(StudyStatus::parse(&self.status)?)
    }
}

/// Row shape of `questions`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredQuestion {
    pub id: i64,
    pub study_id: i64,
    pub prompt: String,
    pub options: serde_json::Value,
    pub correct_answer: String,
}

impl Store {
    /// Create a study in `processing` state. The web tier does this in
    /// production; the worker only needs it for tests and tooling.
    pub async fn create_study(&self, user_id: i64, title: &str, file_path: Option<&str>) -> Result<i64> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO studies (user_id, title, summary, status, file_path)
            VALUES ($1, $2, '', 'processing', $3)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(title)
        .bind(file_path)
        .fetch_one(self.pool())
        .await?;

        Ok(id)
    }

    /// Persist a successful pipeline run: set the summary, flip the study to
    /// `ready`, and replace its questions wholesale (reprocessing a study
    /// must not leave stale questions behind). One transaction.
    pub async fn mark_study_ready(&self, study_id: i64, output: &StudyOutput) -> Result<()> {
        let mut tx = self.pool().begin().await?;

        let result = sqlx::query(
            "UPDATE studies SET summary = $1, status = 'ready' WHERE id = $2",
        )
        .bind(&output.summary)
        .bind(study_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(StoreError::StudyNotFound(study_id));
        }

        sqlx::query("DELETE FROM questions WHERE study_id = $1")
            .bind(study_id)
            .execute(&mut *tx)
            .await?;

        for question in &output.quiz.questions {
            sqlx::query(
                r#"
                INSERT INTO questions (study_id, prompt, options, correct_answer)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(study_id)
            .bind(&question.prompt)
            .bind(serde_json::to_value(&question.options)?)
            .bind(&question.correct_answer)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(study_id, questions = output.quiz.questions.len(), "Study marked ready");
        Ok(())
    }

    /// Record a terminal processing failure on the study row.
    ///
    /// Tolerates a missing study: the job is going to the dead letter state
    /// either way, and there is nothing useful left to do with the error.
    pub async fn mark_study_failed(&self, study_id: i64, error: &str) -> Result<()> {
        let message = format!(
            "Processing failed: {}",
            truncate_message(error, MAX_STORED_ERROR_LEN)
        );

        let result = sqlx::query(
            "UPDATE studies SET summary = $1, status = 'failed' WHERE id = $2",
        )
        .bind(&message)
        .bind(study_id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            warn!(study_id, "Tried to mark a study failed, but it no longer exists");
        }
        Ok(())
    }

    /// Fetch a study by id
    pub async fn get_study(&self, study_id: i64) -> Result<Option<Study>> {
        let study = sqlx::query_as::<_, Study>(
            "SELECT id, user_id, title, summary, status, file_path, created_at FROM studies WHERE id = $1",
        )
        .bind(study_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(study)
    }

    /// Fetch a study's questions, in insertion order
    pub async fn get_questions(&self, study_id: i64) -> Result<Vec<StoredQuestion>> {
        let questions = sqlx::query_as::<_, StoredQuestion>(
            r#"
            SELECT id, study_id, prompt, options, correct_answer
            FROM questions
            WHERE study_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(study_id)
        .fetch_all(self.pool())
        .await?;

        Ok(questions)
    }
}
