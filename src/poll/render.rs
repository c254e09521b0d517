//! User-facing text and rich message layouts

use super::report::{answer_tally, feedback_entries, response_rate};
use super::{Poll, PollKind};
use crate::runtime::{Attachment, AttachmentField};
use std::fmt::Write;

pub const ASK_ANSWERS: &str = "What are the possible responses (comma separated)?";
pub const ASK_RECIPIENTS: &str = "Who should we send this to?";
pub const ASK_QUESTION_AGAIN: &str =
    "The question can't be empty. What was the question you wanted to ask?";
pub const NO_ANSWERS: &str =
    "I need at least one possible response. What are the possible responses (comma separated)?";
pub const RECIPIENTS_RETRY: &str =
    "Had trouble setting the recipients. Make sure they are valid channel names and try again";
pub const PREVIEW_INTRO: &str = "Here's a preview of what we are going to send:";
pub const NO_ACTIVE_POLLS: &str = "You have no active polls";
pub const ACTIVE_POLLS_INTRO: &str = "Here are the list of active polls:";
pub const THANKS: &str = "Thanks for responding!";
pub const CANCELLED: &str = "Okay, cancelling the poll for you";
pub const CANCEL_NOT_FOUND: &str = "Oops, couldn't find the poll for you";
pub const DUPLICATE_ID: &str = "Sigh at the moment we need uniquely named polls. Sorry";
pub const INTERNAL: &str = "Something has gone wrong. We are looking into it.";

pub const HELP: &str = r"*Description*

Carlos the Curious at your service! Create and gather feedback to simple survey questions. Follow the commands below to create your poll and send it to either all members of a channel or to specific individuals. Once the poll has been created it will be sent and the responses will be collected.

*Commands*

*'create {feedback|response} poll'* - begin the process of creating a poll. I will ask you follow up questions to build the survey, and you can cancel at any time. A _feedback_ poll takes free form answers, a _response_ poll takes one of the supplied responses.

*'cancel poll {poll_uuid}'* - Cancel a currently active or in progress poll.

*'answer poll {poll_uuid} {answer}'* - When I send you a direct message you can answer the poll with this command. Everything after the poll id is your answer.

*'show poll {poll_uuid}'* - Display the results for the mentioned poll

*'list active polls'* - List your active polls

*'help'* - Display the help but you already knew that
";

pub fn created(poll: &Poll) -> String {
    format!(
        "Creating a {} poll. You can cancel the poll any time with `cancel poll {}`\nWhat was the question you wanted to ask?",
        poll.kind, poll.uuid
    )
}

pub fn already_pending(uuid: &str) -> String {
    format!("There is already a poll being created. Cancel the poll with: 'cancel poll {uuid}'")
}

pub fn not_sending(uuid: &str) -> String {
    format!("Okay not going to send poll. You can cancel with `cancel poll {uuid}`")
}

pub fn live(uuid: &str) -> String {
    format!("Poll is live you can check in by asking me to `show poll {uuid}`")
}

pub fn answer_not_found(uuid: &str) -> String {
    format!("Sorry about this but didn't find a poll with the name {uuid}")
}

pub fn poll_not_found(uuid: &str) -> String {
    format!("Sorry about this but didn't find a poll {uuid}")
}

pub fn invalid_answer(poll: &Poll) -> String {
    format!(
        "We were unable to add your response. Valid answers are: {}",
        poll.possible_answers.join(", ")
    )
}

fn possible_answers_field(poll: &Poll) -> AttachmentField {
    AttachmentField::new("Possible Answers:", poll.possible_answers.join(", "))
}

/// Shown to the creator before confirming
pub fn preview(poll: &Poll) -> Attachment {
    let mut fields = vec![AttachmentField::new(
        "# of Recipients:",
        poll.recipients.len().to_string(),
    )];
    if poll.kind == PollKind::Response {
        fields.push(possible_answers_field(poll));
    }

    Attachment {
        title: format!("{} Question:", poll.kind.title()),
        pretext: "Look good to you (yes/no)?".to_string(),
        text: poll.question.clone(),
        color: None,
        fields,
    }
}

/// Delivered to every recipient
pub fn delivery(poll: &Poll) -> Attachment {
    let mut fields = vec![AttachmentField::new("Poll Type:", poll.kind.as_str()).short()];
    if poll.kind == PollKind::Response {
        fields.push(possible_answers_field(poll));
    }

    Attachment {
        title: "Question".to_string(),
        pretext: format!(
            "We have a question for you. You can answer via `answer poll {} {{insert response}}`",
            poll.uuid
        ),
        text: poll.question.clone(),
        color: None,
        fields,
    }
}

/// Results for `show poll`
pub fn summary(poll: &Poll) -> Attachment {
    let responses = match poll.kind {
        PollKind::Response => answer_tally(poll)
            .iter()
            .map(|c| format!("{} - {}({}%)", c.answer, c.count, c.percent))
            .collect::<Vec<_>>()
            .join(" | "),
        PollKind::Feedback => feedback_entries(poll)
            .iter()
            .map(|(n, text)| format!("{n}. {text}"))
            .collect::<Vec<_>>()
            .join("\n"),
    };

    let rate = response_rate(poll);
    Attachment {
        title: "Survey Results".to_string(),
        pretext: String::new(),
        text: format!("{}\n\n", poll.question),
        color: Some("#36a64f".to_string()),
        fields: vec![
            AttachmentField::new("Responses:", responses),
            AttachmentField::new(
                "Response Stats:",
                format!(
                    "{}% - {} out of {}",
                    rate.percent, rate.responded, rate.recipients
                ),
            ),
        ],
    }
}

/// Numbered list for `list active polls`
pub fn active_list(polls: &[Poll]) -> Attachment {
    let mut text = String::new();
    for (i, poll) in polls.iter().enumerate() {
        let _ = writeln!(text, "{}. {} - id:{}", i + 1, poll.question, poll.uuid);
    }
    Attachment {
        text,
        ..Attachment::default()
    }
}
