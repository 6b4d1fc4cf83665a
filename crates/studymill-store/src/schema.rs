//! Schema bootstrap for the worker's tables.
//!
//! The worker verifies the schema on startup with `CREATE TABLE IF NOT
//! EXISTS`, so a fresh database is usable without a separate migration step.
//! The `studies` and `questions` tables are shared with the web tier; the
//! `study_jobs` table is the queue the web tier inserts into and workers
//! claim from.

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS studies (
    id          BIGSERIAL PRIMARY KEY,
    user_id     BIGINT NOT NULL,
    title       TEXT NOT NULL,
    summary     TEXT NOT NULL DEFAULT '',
    status      TEXT NOT NULL DEFAULT 'processing',
    file_path   TEXT,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS questions (
    id              BIGSERIAL PRIMARY KEY,
    study_id        BIGINT NOT NULL REFERENCES studies(id) ON DELETE CASCADE,
    prompt          TEXT NOT NULL,
    options         JSONB NOT NULL,
    correct_answer  TEXT NOT NULL,
    user_answer     TEXT,
    is_correct      BOOLEAN
);

CREATE INDEX IF NOT EXISTS idx_questions_study_id ON questions (study_id);

CREATE TABLE IF NOT EXISTS study_jobs (
    id            UUID PRIMARY KEY,
    study_id      BIGINT NOT NULL,
    filename      TEXT NOT NULL,
    kind          TEXT NOT NULL,
    status        TEXT NOT NULL,
    attempts      INT NOT NULL DEFAULT 0,
    max_attempts  INT NOT NULL,
    last_error    TEXT,
    created_at    TIMESTAMPTZ NOT NULL,
    scheduled_at  TIMESTAMPTZ NOT NULL,
    updated_at    TIMESTAMPTZ NOT NULL,
    claimed_by    TEXT,
    claimed_at    TIMESTAMPTZ
);

CREATE INDEX IF NOT EXISTS idx_study_jobs_claim
    ON study_jobs (kind, status, scheduled_at);
"#;
