//! Response validation and result aggregation

use super::{Poll, PollKind};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponseError {
    #[error("{value} is not one of the possible answers ({allowed})")]
    NotAnAnswer { value: String, allowed: String },
    #[error("empty response")]
    Empty,
}

/// Check `value` against the poll's allowed answers.
///
/// Response polls require an exact match with one declared answer; feedback
/// polls accept any non-empty text.
pub fn validate_response(poll: &Poll, value: &str) -> Result<(), ResponseError> {
    if value.trim().is_empty() {
        return Err(ResponseError::Empty);
    }
    match poll.kind {
        PollKind::Feedback => Ok(()),
        PollKind::Response if poll.possible_answers.iter().any(|a| a == value) => Ok(()),
        PollKind::Response => Err(ResponseError::NotAnAnswer {
            value: value.to_string(),
            allowed: poll.possible_answers.join(", "),
        }),
    }
}

/// Integer percentage of `part` over `total`, truncated. Zero when `total` is zero.
pub fn percent(part: usize, total: usize) -> usize {
    if total == 0 {
        0
    } else {
        part * 100 / total
    }
}

/// Responders versus recipients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseRate {
    pub responded: usize,
    pub recipients: usize,
    pub percent: usize,
}

/// Distinct recipients who answered, over total recipients.
pub fn response_rate(poll: &Poll) -> ResponseRate {
    let recipients: HashSet<&str> = poll.recipients.iter().map(|r| r.slack_id.as_str()).collect();
    let responded = poll
        .responses
        .iter()
        .map(|r| r.slack_id.as_str())
        .filter(|id| recipients.contains(id))
        .collect::<HashSet<_>>()
        .len();
    ResponseRate {
        responded,
        recipients: recipients.len(),
        percent: percent(responded, recipients.len()),
    }
}

/// Count for one declared answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerCount {
    pub answer: String,
    pub count: usize,
    /// Share of total recipients, not of responses
    pub percent: usize,
}

/// Per-answer counts in declaration order.
///
/// Every response is stored, but only each recipient's latest one is
/// counted so a changed mind moves the vote instead of adding one.
pub fn answer_tally(poll: &Poll) -> Vec<AnswerCount> {
    let mut latest: HashMap<&str, &str> = HashMap::new();
    for response in &poll.responses {
        latest.insert(&response.slack_id, &response.value);
    }

    let total = poll.recipients.len();
    poll.possible_answers
        .iter()
        .map(|answer| {
            let count = latest.values().filter(|value| **value == answer.as_str()).count();
            AnswerCount {
                answer: answer.clone(),
                count,
                percent: percent(count, total),
            }
        })
        .collect()
}

/// Free-text responses numbered from 1, in the order they were recorded.
pub fn feedback_entries(poll: &Poll) -> Vec<(usize, &str)> {
    poll.responses
        .iter()
        .enumerate()
        .map(|(i, response)| (i + 1, response.value.as_str()))
        .collect()
}
