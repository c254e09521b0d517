//! Poll aggregate
//!
//! Plain data describing one survey. The aggregate never talks to storage;
//! reads and writes go through `runtime::PollStore`.

pub mod render;
pub mod report;

pub use crate::state_machine::state::Stage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Closed-ended (`response`) or open-ended (`feedback`) poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollKind {
    Response,
    Feedback,
}

impl PollKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PollKind::Response => "response",
            PollKind::Feedback => "feedback",
        }
    }

    /// "Response" / "Feedback", used in preview titles
    pub fn title(self) -> &'static str {
        match self {
            PollKind::Response => "Response",
            PollKind::Feedback => "Feedback",
        }
    }
}

impl fmt::Display for PollKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Poll must be of type response or feedback cannot be {0}")]
pub struct InvalidPollKind(pub String);

impl FromStr for PollKind {
    type Err = InvalidPollKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "response" => Ok(PollKind::Response),
            "feedback" => Ok(PollKind::Feedback),
            other => Err(InvalidPollKind(other.to_string())),
        }
    }
}

/// A user the poll is addressed to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub slack_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Recipient {
    pub fn new(slack_id: impl Into<String>) -> Self {
        Self {
            slack_id: slack_id.into(),
            display_name: None,
        }
    }
}

/// One recorded answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollResponse {
    pub slack_id: String,
    pub value: String,
    pub created_at: DateTime<Utc>,
}

impl PollResponse {
    pub fn new(slack_id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            slack_id: slack_id.into(),
            value: value.into(),
            created_at: Utc::now(),
        }
    }
}

/// One survey instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poll {
    /// Storage row id; `0` until the poll has been inserted
    #[serde(skip)]
    pub id: i64,
    /// Public identifier users type in commands
    pub uuid: String,
    pub creator: String,
    pub channel: String,
    pub kind: PollKind,
    pub stage: Stage,
    pub previous_stage: Stage,
    pub question: String,
    pub possible_answers: Vec<String>,
    pub recipients: Vec<Recipient>,
    pub responses: Vec<PollResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Poll {
    /// New poll in the `initial` stage with a fresh public identifier
    pub fn new(kind: PollKind, creator: impl Into<String>, channel: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            uuid: uuid::Uuid::new_v4().to_string(),
            creator: creator.into(),
            channel: channel.into(),
            kind,
            stage: Stage::Initial,
            previous_stage: Stage::Initial,
            question: String::new(),
            possible_answers: Vec::new(),
            recipients: Vec::new(),
            responses: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to the next stage in the authoring order.
    ///
    /// Returns the new stage, or `None` when the poll is already active.
    pub fn advance(&mut self) -> Option<Stage> {
        let next = self.stage.successor(self.kind)?;
        self.previous_stage = self.stage;
        self.stage = next;
        Some(next)
    }

    pub fn is_recipient(&self, slack_id: &str) -> bool {
        self.recipients.iter().any(|r| r.slack_id == slack_id)
    }

    /// Replace the recipient list, keeping the first occurrence of each user
    pub fn set_recipients(&mut self, recipients: impl IntoIterator<Item = Recipient>) {
        let mut seen = HashSet::new();
        self.recipients = recipients
            .into_iter()
            .filter(|r| seen.insert(r.slack_id.clone()))
            .collect();
    }
}

/// Split a comma separated answer list, trimming each entry.
///
/// Empty entries (`"a,,b"`, trailing commas) are dropped.
pub fn parse_answer_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|answer| !answer.is_empty())
        .map(String::from)
        .collect()
}
