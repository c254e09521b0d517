//! Authoring stage types

use crate::poll::PollKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Position of a poll in the authoring dialogue.
///
/// The serialized names are the ones stored in the `polls.stage` column and
/// must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Stage {
    /// Poll created, waiting for the question
    #[default]
    #[serde(rename = "initial")]
    Initial,

    /// Waiting for the comma separated list of possible answers (response polls only)
    #[serde(rename = "getAnswers")]
    GetAnswers,

    /// Waiting for the mentions of who should receive the poll
    #[serde(rename = "getRecipients")]
    GetRecipients,

    /// Preview shown, waiting for a literal `yes`
    #[serde(rename = "sendPoll")]
    SendPoll,

    /// Delivered to recipients and accepting answers
    #[serde(rename = "active")]
    Active,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Initial,
        Stage::GetAnswers,
        Stage::GetRecipients,
        Stage::SendPoll,
        Stage::Active,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Initial => "initial",
            Stage::GetAnswers => "getAnswers",
            Stage::GetRecipients => "getRecipients",
            Stage::SendPoll => "sendPoll",
            Stage::Active => "active",
        }
    }

    /// The only stage a poll of `kind` may move to from `self`.
    ///
    /// Feedback polls skip `getAnswers`. `Active` has no successor.
    pub fn successor(self, kind: PollKind) -> Option<Stage> {
        match (self, kind) {
            (Stage::Initial, PollKind::Response) => Some(Stage::GetAnswers),
            (Stage::Initial, PollKind::Feedback) | (Stage::GetAnswers, _) => {
                Some(Stage::GetRecipients)
            }
            (Stage::GetRecipients, _) => Some(Stage::SendPoll),
            (Stage::SendPoll, _) => Some(Stage::Active),
            (Stage::Active, _) => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown stage: {0}")]
pub struct UnknownStage(pub String);

impl FromStr for Stage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| UnknownStage(s.to_string()))
    }
}
