//! SQL schema for the Canvass SQLite store.
//!
//! Executed once at connection startup. The uniqueness constraints on
//! `invitations` and `responses` are what the issuer and intake rely on under
//! concurrency, so they live here rather than in application code.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS surveys (
    survey_id          TEXT PRIMARY KEY,
    title              TEXT NOT NULL,
    description        TEXT NOT NULL DEFAULT '',
    status             TEXT NOT NULL,   -- 'draft' | 'active' | 'closed'
    starts_at          TEXT NOT NULL,
    ends_at            TEXT NOT NULL,
    templates          TEXT NOT NULL DEFAULT '{}',           -- JSON MessageTemplates
    default_channels   TEXT NOT NULL DEFAULT '[\"email\"]',  -- JSON array of channels
    total_sent         INTEGER NOT NULL DEFAULT 0,
    email_sent         INTEGER NOT NULL DEFAULT 0,
    messaging_sent     INTEGER NOT NULL DEFAULT 0,
    responses_received INTEGER NOT NULL DEFAULT 0,
    created_at         TEXT NOT NULL,
    CHECK (ends_at > starts_at)
);

CREATE TABLE IF NOT EXISTS questions (
    question_id   TEXT PRIMARY KEY,
    survey_id     TEXT NOT NULL REFERENCES surveys(survey_id),
    position      INTEGER NOT NULL,
    prompt        TEXT NOT NULL,
    help_text     TEXT,
    question_type TEXT NOT NULL,
    required      INTEGER NOT NULL DEFAULT 0,
    rating_max    INTEGER,
    UNIQUE (survey_id, position)
);

CREATE TABLE IF NOT EXISTS choices (
    choice_id   TEXT PRIMARY KEY,
    question_id TEXT NOT NULL REFERENCES questions(question_id),
    position    INTEGER NOT NULL,
    label       TEXT NOT NULL,
    UNIQUE (question_id, position)
);

CREATE TABLE IF NOT EXISTS recipients (
    recipient_id TEXT PRIMARY KEY,
    full_name    TEXT NOT NULL,
    email        TEXT,
    phone        TEXT,
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS invitations (
    invitation_id TEXT PRIMARY KEY,
    survey_id     TEXT NOT NULL REFERENCES surveys(survey_id),
    recipient_id  TEXT NOT NULL REFERENCES recipients(recipient_id),
    token         TEXT NOT NULL,
    status        TEXT NOT NULL,   -- 'pending' | 'sent' | 'opened' | 'completed' | 'failed'
    created_at    TEXT NOT NULL,
    sent_at       TEXT,
    opened_at     TEXT,
    completed_at  TEXT,
    UNIQUE (survey_id, recipient_id),
    UNIQUE (token)
);

-- Append-only. No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS delivery_log (
    entry_id     TEXT PRIMARY KEY,
    survey_id    TEXT NOT NULL REFERENCES surveys(survey_id),
    recipient_id TEXT NOT NULL,
    channel      TEXT NOT NULL,   -- 'email' | 'messaging'
    outcome      TEXT NOT NULL,   -- 'sent' | 'failed'
    error        TEXT,
    attempted_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS responses (
    response_id   TEXT PRIMARY KEY,
    survey_id     TEXT NOT NULL REFERENCES surveys(survey_id),
    recipient_id  TEXT NOT NULL REFERENCES recipients(recipient_id),
    invitation_id TEXT NOT NULL REFERENCES invitations(invitation_id),
    is_complete   INTEGER NOT NULL DEFAULT 1,
    submitted_at  TEXT NOT NULL,
    UNIQUE (survey_id, recipient_id),
    UNIQUE (invitation_id)
);

CREATE TABLE IF NOT EXISTS answers (
    answer_id   TEXT PRIMARY KEY,
    response_id TEXT NOT NULL REFERENCES responses(response_id),
    question_id TEXT NOT NULL REFERENCES questions(question_id),
    kind        TEXT NOT NULL,   -- discriminant of AnswerValue variant
    value_json  TEXT NOT NULL,   -- JSON payload (inner data only)
    UNIQUE (response_id, question_id)
);

CREATE INDEX IF NOT EXISTS questions_survey_idx    ON questions(survey_id);
CREATE INDEX IF NOT EXISTS invitations_survey_idx  ON invitations(survey_id);
CREATE INDEX IF NOT EXISTS delivery_log_survey_idx ON delivery_log(survey_id, attempted_at);
CREATE INDEX IF NOT EXISTS responses_survey_idx    ON responses(survey_id, submitted_at);

PRAGMA user_version = 1;
";
