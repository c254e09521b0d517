//! Database module for canvass
//!
//! Persists polls together with their answers, recipients and responses.

mod schema;

use schema::{PRAGMAS, SCHEMA};

use crate::poll::{Poll, PollKind, PollResponse, Recipient};
use crate::state_machine::state::Stage;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Poll not found: {0}")]
    PollNotFound(String),
    #[error("A poll is already being created: {uuid}")]
    PendingPollExists { uuid: String },
    #[error("Poll identifier already used: {0}")]
    DuplicateUuid(String),
    #[error("Poll {uuid} is no longer in stage {expected}")]
    StaleStage { uuid: String, expected: Stage },
}

pub type DbResult<T> = Result<T, DbError>;

const POLL_COLUMNS: &str =
    "id, uuid, creator, channel, kind, stage, previous_stage, question, created_at, updated_at";

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        Self::init(Connection::open(path)?)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> DbResult<Self> {
        conn.execute_batch(PRAGMAS)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    // A panic while holding the lock leaves the connection usable; sqlite
    // rolls back any open transaction when it is dropped.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ==================== Poll Operations ====================

    /// Insert a freshly created poll
    pub fn create_poll(&self, poll: &Poll) -> DbResult<Poll> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let retired: Option<String> = tx
            .query_row(
                "SELECT uuid FROM retired_poll_uuids WHERE uuid = ?1",
                params![poll.uuid],
                |row| row.get(0),
            )
            .optional()?;
        let taken: Option<i64> = tx
            .query_row(
                "SELECT id FROM polls WHERE uuid = ?1",
                params![poll.uuid],
                |row| row.get(0),
            )
            .optional()?;
        if retired.is_some() || taken.is_some() {
            return Err(DbError::DuplicateUuid(poll.uuid.clone()));
        }

        let pending: Option<String> = tx
            .query_row(
                "SELECT uuid FROM polls WHERE creator = ?1 AND channel = ?2 AND stage != 'active'",
                params![poll.creator, poll.channel],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(uuid) = pending {
            return Err(DbError::PendingPollExists { uuid });
        }

        tx.execute(
            "INSERT INTO polls (uuid, creator, channel, kind, stage, previous_stage, question, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                poll.uuid,
                poll.creator,
                poll.channel,
                poll.kind.as_str(),
                poll.stage.as_str(),
                poll.previous_stage.as_str(),
                poll.question,
                poll.created_at.to_rfc3339(),
                poll.updated_at.to_rfc3339(),
            ],
        )?;
        let id = tx.last_insert_rowid();
        write_children(&tx, id, poll)?;
        tx.commit()?;

        Ok(Poll { id, ..poll.clone() })
    }

    /// Write back the authored fields of a poll.
    ///
    /// The update only applies while the stored stage equals
    /// `expected_stage`, so two concurrent replies cannot both advance the
    /// same poll. Responses are left untouched.
    pub fn save_poll(&self, poll: &Poll, expected_stage: Stage) -> DbResult<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let changed = tx.execute(
            "UPDATE polls
             SET stage = ?1, previous_stage = ?2, question = ?3, updated_at = ?4
             WHERE uuid = ?5 AND stage = ?6",
            params![
                poll.stage.as_str(),
                poll.previous_stage.as_str(),
                poll.question,
                Utc::now().to_rfc3339(),
                poll.uuid,
                expected_stage.as_str(),
            ],
        )?;

        if changed == 0 {
            let exists: Option<i64> = tx
                .query_row(
                    "SELECT id FROM polls WHERE uuid = ?1",
                    params![poll.uuid],
                    |row| row.get(0),
                )
                .optional()?;
            return Err(match exists {
                Some(_) => DbError::StaleStage {
                    uuid: poll.uuid.clone(),
                    expected: expected_stage,
                },
                None => DbError::PollNotFound(poll.uuid.clone()),
            });
        }

        let id: i64 = tx.query_row(
            "SELECT id FROM polls WHERE uuid = ?1",
            params![poll.uuid],
            |row| row.get(0),
        )?;
        tx.execute("DELETE FROM poll_answers WHERE poll_id = ?1", params![id])?;
        tx.execute("DELETE FROM poll_recipients WHERE poll_id = ?1", params![id])?;
        write_children(&tx, id, poll)?;

        tx.commit()?;
        Ok(())
    }

    /// Delete a poll and everything it owns. The identifier is retired.
    pub fn delete_poll(&self, uuid: &str) -> DbResult<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let deleted = tx.execute("DELETE FROM polls WHERE uuid = ?1", params![uuid])?;
        if deleted == 0 {
            return Err(DbError::PollNotFound(uuid.to_string()));
        }
        tx.execute(
            "INSERT OR IGNORE INTO retired_poll_uuids (uuid, retired_at) VALUES (?1, ?2)",
            params![uuid, Utc::now().to_rfc3339()],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// The poll a creator is still authoring in a channel, if any
    pub fn find_pending_poll(&self, creator: &str, channel: &str) -> DbResult<Option<Poll>> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {POLL_COLUMNS} FROM polls
             WHERE creator = ?1 AND channel = ?2 AND stage != 'active'"
        );
        let poll = conn
            .query_row(&sql, params![creator, channel], poll_from_row)
            .optional()?;
        poll.map(|p| load_children(&conn, p)).transpose()
    }

    pub fn find_poll(&self, uuid: &str) -> DbResult<Option<Poll>> {
        let conn = self.conn();
        let sql = format!("SELECT {POLL_COLUMNS} FROM polls WHERE uuid = ?1");
        let poll = conn.query_row(&sql, params![uuid], poll_from_row).optional()?;
        poll.map(|p| load_children(&conn, p)).transpose()
    }

    pub fn find_active_poll(&self, uuid: &str) -> DbResult<Option<Poll>> {
        let conn = self.conn();
        let sql = format!("SELECT {POLL_COLUMNS} FROM polls WHERE uuid = ?1 AND stage = 'active'");
        let poll = conn.query_row(&sql, params![uuid], poll_from_row).optional()?;
        poll.map(|p| load_children(&conn, p)).transpose()
    }

    /// Active polls a creator started in a channel, oldest first
    pub fn list_active_polls(&self, creator: &str, channel: &str) -> DbResult<Vec<Poll>> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {POLL_COLUMNS} FROM polls
             WHERE creator = ?1 AND channel = ?2 AND stage = 'active'
             ORDER BY id ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let polls = stmt
            .query_map(params![creator, channel], poll_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        polls
            .into_iter()
            .map(|p| load_children(&conn, p))
            .collect()
    }

    /// Record a response against an active poll
    pub fn add_response(&self, uuid: &str, response: &PollResponse) -> DbResult<()> {
        let conn = self.conn();
        let id: Option<i64> = conn
            .query_row(
                "SELECT id FROM polls WHERE uuid = ?1 AND stage = 'active'",
                params![uuid],
                |row| row.get(0),
            )
            .optional()?;
        let id = id.ok_or_else(|| DbError::PollNotFound(uuid.to_string()))?;

        conn.execute(
            "INSERT INTO poll_responses (poll_id, slack_id, value, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                id,
                response.slack_id,
                response.value,
                response.created_at.to_rfc3339()
            ],
        )?;
        Ok(())
    }
}

fn write_children(conn: &Connection, poll_id: i64, poll: &Poll) -> DbResult<()> {
    let mut answers =
        conn.prepare("INSERT INTO poll_answers (poll_id, position, value) VALUES (?1, ?2, ?3)")?;
    for (position, value) in (0_i64..).zip(&poll.possible_answers) {
        answers.execute(params![poll_id, position, value])?;
    }

    let mut recipients = conn.prepare(
        "INSERT INTO poll_recipients (poll_id, position, slack_id, display_name)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    for (position, recipient) in (0_i64..).zip(&poll.recipients) {
        recipients.execute(params![
            poll_id,
            position,
            recipient.slack_id,
            recipient.display_name
        ])?;
    }
    Ok(())
}

fn load_children(conn: &Connection, mut poll: Poll) -> DbResult<Poll> {
    let mut stmt =
        conn.prepare("SELECT value FROM poll_answers WHERE poll_id = ?1 ORDER BY position")?;
    poll.possible_answers = stmt
        .query_map(params![poll.id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT slack_id, display_name FROM poll_recipients WHERE poll_id = ?1 ORDER BY position",
    )?;
    poll.recipients = stmt
        .query_map(params![poll.id], |row| {
            Ok(Recipient {
                slack_id: row.get(0)?,
                display_name: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT slack_id, value, created_at FROM poll_responses WHERE poll_id = ?1 ORDER BY id",
    )?;
    poll.responses = stmt
        .query_map(params![poll.id], |row| {
            Ok(PollResponse {
                slack_id: row.get(0)?,
                value: row.get(1)?,
                created_at: parse_datetime(&row.get::<_, String>(2)?),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(poll)
}

fn poll_from_row(row: &Row<'_>) -> rusqlite::Result<Poll> {
    Ok(Poll {
        id: row.get(0)?,
        uuid: row.get(1)?,
        creator: row.get(2)?,
        channel: row.get(3)?,
        kind: parse_column::<PollKind>(row, 4)?,
        stage: parse_column::<Stage>(row, 5)?,
        previous_stage: parse_column::<Stage>(row, 6)?,
        question: row.get(7)?,
        possible_answers: Vec::new(),
        recipients: Vec::new(),
        responses: Vec::new(),
        created_at: parse_datetime(&row.get::<_, String>(8)?),
        updated_at: parse_datetime(&row.get::<_, String>(9)?),
    })
}

fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(idx)?;
    text.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
