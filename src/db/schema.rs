//! Database schema

/// SQL schema for initialization
///
/// Answers and recipients keep a `position` column so lists come back in the
/// order the creator typed them. The partial index on `polls` allows at most
/// one not-yet-active poll per creator and channel.
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS polls (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    uuid TEXT NOT NULL UNIQUE,
    creator TEXT NOT NULL,
    channel TEXT NOT NULL,
    kind TEXT NOT NULL,
    stage TEXT NOT NULL DEFAULT 'initial',
    previous_stage TEXT NOT NULL DEFAULT 'initial',
    question TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_polls_pending
    ON polls(creator, channel) WHERE stage != 'active';
CREATE INDEX IF NOT EXISTS idx_polls_owner ON polls(creator, channel, stage);

CREATE TABLE IF NOT EXISTS poll_answers (
    poll_id INTEGER NOT NULL,
    position INTEGER NOT NULL,
    value TEXT NOT NULL,

    PRIMARY KEY (poll_id, position),
    FOREIGN KEY (poll_id) REFERENCES polls(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS poll_recipients (
    poll_id INTEGER NOT NULL,
    position INTEGER NOT NULL,
    slack_id TEXT NOT NULL,
    display_name TEXT,

    PRIMARY KEY (poll_id, position),
    UNIQUE (poll_id, slack_id),
    FOREIGN KEY (poll_id) REFERENCES polls(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS poll_responses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    poll_id INTEGER NOT NULL,
    slack_id TEXT NOT NULL,
    value TEXT NOT NULL,
    created_at TEXT NOT NULL,

    FOREIGN KEY (poll_id) REFERENCES polls(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_poll_responses_poll ON poll_responses(poll_id, id);

-- Identifiers of deleted polls. Never reissued.
CREATE TABLE IF NOT EXISTS retired_poll_uuids (
    uuid TEXT PRIMARY KEY,
    retired_at TEXT NOT NULL
);
";

/// Applied on every connection before the schema
pub const PRAGMAS: &str = "PRAGMA foreign_keys = ON;";
