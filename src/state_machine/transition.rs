//! Pure state transition function
//!
//! Given a poll and the creator's latest input, compute the updated poll
//! and the effects the runtime must carry out. No I/O happens here.

use super::{Effect, Event, Stage};
use crate::poll::{parse_answer_list, render, Poll};
use thiserror::Error;

/// Only this exact reply sends the poll out
pub const CONFIRMATION: &str = "yes";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub poll: Poll,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(poll: Poll) -> Self {
        Self {
            poll,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The reply can't be used. Carries the prompt to show the creator.
    #[error("{0}")]
    Validation(String),
    #[error("No dialogue handler for stage {0}")]
    NoHandler(Stage),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
pub fn transition(poll: &Poll, event: Event) -> Result<TransitionResult, TransitionError> {
    match (poll.stage, event) {
        (Stage::Initial, Event::Reply { text }) => {
            let question = text.trim();
            if question.is_empty() {
                return Err(TransitionError::Validation(
                    render::ASK_QUESTION_AGAIN.to_string(),
                ));
            }

            let mut next = poll.clone();
            next.question = question.to_string();
            next.advance();
            let prompt = match next.stage {
                Stage::GetAnswers => render::ASK_ANSWERS,
                _ => render::ASK_RECIPIENTS,
            };
            Ok(TransitionResult::new(next)
                .with_effect(Effect::persist(Stage::Initial))
                .with_effect(Effect::send(prompt)))
        }

        (Stage::GetAnswers, Event::Reply { text }) => {
            let answers = parse_answer_list(&text);
            if answers.is_empty() {
                return Err(TransitionError::Validation(render::NO_ANSWERS.to_string()));
            }

            let mut next = poll.clone();
            next.possible_answers = answers;
            next.advance();
            Ok(TransitionResult::new(next)
                .with_effect(Effect::persist(Stage::GetAnswers))
                .with_effect(Effect::send(render::ASK_RECIPIENTS)))
        }

        // Resolution needs the roster; come back with RecipientsResolved
        (Stage::GetRecipients, Event::Reply { text }) => Ok(TransitionResult::new(poll.clone())
            .with_effect(Effect::ResolveRecipients { text })),

        (Stage::GetRecipients, Event::RecipientsResolved { recipients }) => {
            if recipients.is_empty() {
                return Err(TransitionError::Validation(
                    render::RECIPIENTS_RETRY.to_string(),
                ));
            }

            let mut next = poll.clone();
            next.set_recipients(recipients);
            next.advance();
            let preview = render::preview(&next);
            Ok(TransitionResult::new(next)
                .with_effect(Effect::persist(Stage::GetRecipients))
                .with_effect(Effect::PostMessage {
                    text: render::PREVIEW_INTRO.to_string(),
                    attachment: preview,
                }))
        }

        (Stage::SendPoll, Event::Reply { text }) if text == CONFIRMATION => {
            let mut next = poll.clone();
            next.advance();
            let delivery = render::delivery(&next);
            let live = render::live(&next.uuid);
            Ok(TransitionResult::new(next)
                .with_effect(Effect::persist(Stage::SendPoll))
                .with_effect(Effect::FanOut {
                    attachment: delivery,
                })
                .with_effect(Effect::send(live)))
        }

        (Stage::SendPoll, Event::Reply { .. }) => Ok(TransitionResult::new(poll.clone())
            .with_effect(Effect::send(render::not_sending(&poll.uuid)))),

        (Stage::Active, _) => Err(TransitionError::NoHandler(Stage::Active)),

        (stage, event) => Err(TransitionError::InvalidTransition(format!(
            "{event:?} in stage {stage}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poll::{PollKind, Recipient};

    fn run(poll: &Poll, text: &str) -> TransitionResult {
        transition(poll, Event::reply(text)).unwrap()
    }

    fn resolved(poll: &Poll, ids: &[&str]) -> TransitionResult {
        let recipients = ids.iter().map(|id| Recipient::new(*id)).collect();
        transition(poll, Event::RecipientsResolved { recipients }).unwrap()
    }

    #[test]
    fn test_question_then_answers_for_response_poll() {
        let poll = Poll::new(PollKind::Response, "U1", "C1");

        let result = run(&poll, "  Why?  ");
        assert_eq!(result.poll.question, "Why?");
        assert_eq!(result.poll.stage, Stage::GetAnswers);
        assert_eq!(
            result.effects,
            vec![
                Effect::persist(Stage::Initial),
                Effect::send(render::ASK_ANSWERS)
            ]
        );

        let result = run(&result.poll, "a, b");
        assert_eq!(result.poll.possible_answers, vec!["a", "b"]);
        assert_eq!(result.poll.stage, Stage::GetRecipients);
        assert_eq!(result.effects[1], Effect::send(render::ASK_RECIPIENTS));
    }

    #[test]
    fn test_feedback_poll_goes_straight_to_recipients() {
        let poll = Poll::new(PollKind::Feedback, "U1", "C1");
        let result = run(&poll, "How was the offsite?");
        assert_eq!(result.poll.stage, Stage::GetRecipients);
        assert_eq!(result.effects[1], Effect::send(render::ASK_RECIPIENTS));
    }

    #[test]
    fn test_blank_replies_are_rejected() {
        let poll = Poll::new(PollKind::Response, "U1", "C1");
        assert!(matches!(
            transition(&poll, Event::reply("   ")),
            Err(TransitionError::Validation(_))
        ));

        let asking_answers = run(&poll, "Why?").poll;
        assert_eq!(
            transition(&asking_answers, Event::reply(" , ,")).unwrap_err(),
            TransitionError::Validation(render::NO_ANSWERS.to_string())
        );
    }

    #[test]
    fn test_recipient_reply_requests_resolution_without_advancing() {
        let mut poll = Poll::new(PollKind::Feedback, "U1", "C1");
        poll.stage = Stage::GetRecipients;

        let result = run(&poll, "<@U2> <#C9>");
        assert_eq!(result.poll.stage, Stage::GetRecipients);
        assert_eq!(
            result.effects,
            vec![Effect::ResolveRecipients {
                text: "<@U2> <#C9>".to_string()
            }]
        );
    }

    #[test]
    fn test_resolved_recipients_show_preview() {
        let mut poll = Poll::new(PollKind::Feedback, "U1", "C1");
        poll.stage = Stage::GetRecipients;

        let result = resolved(&poll, &["U2", "U3"]);
        assert_eq!(result.poll.stage, Stage::SendPoll);
        assert_eq!(result.poll.recipients.len(), 2);
        match &result.effects[1] {
            Effect::PostMessage { text, attachment } => {
                assert_eq!(text, render::PREVIEW_INTRO);
                assert_eq!(attachment.fields[0].value, "2");
            }
            other => panic!("Expected preview, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_resolution_keeps_stage() {
        let mut poll = Poll::new(PollKind::Feedback, "U1", "C1");
        poll.stage = Stage::GetRecipients;
        assert_eq!(
            transition(&poll, Event::RecipientsResolved { recipients: vec![] }).unwrap_err(),
            TransitionError::Validation(render::RECIPIENTS_RETRY.to_string())
        );
    }

    #[test]
    fn test_confirmation_activates_and_fans_out() {
        let mut poll = Poll::new(PollKind::Response, "U1", "C1");
        poll.stage = Stage::SendPoll;
        poll.set_recipients([Recipient::new("U2")]);

        let result = run(&poll, "yes");
        assert_eq!(result.poll.stage, Stage::Active);
        assert_eq!(result.poll.previous_stage, Stage::SendPoll);
        assert_eq!(result.effects[0], Effect::persist(Stage::SendPoll));
        assert!(matches!(result.effects[1], Effect::FanOut { .. }));
        assert_eq!(result.effects[2], Effect::send(render::live(&poll.uuid)));
    }

    #[test]
    fn test_anything_but_yes_declines() {
        let mut poll = Poll::new(PollKind::Response, "U1", "C1");
        poll.stage = Stage::SendPoll;

        for reply in ["no", "Yes", "yes please", ""] {
            let result = run(&poll, reply);
            assert_eq!(result.poll.stage, Stage::SendPoll);
            assert_eq!(
                result.effects,
                vec![Effect::send(render::not_sending(&poll.uuid))]
            );
        }
    }

    #[test]
    fn test_active_poll_has_no_dialogue() {
        let mut poll = Poll::new(PollKind::Response, "U1", "C1");
        poll.stage = Stage::Active;
        assert_eq!(
            transition(&poll, Event::reply("hello")).unwrap_err(),
            TransitionError::NoHandler(Stage::Active)
        );
    }

    #[test]
    fn test_resolution_outside_recipient_stage_is_invalid() {
        let poll = Poll::new(PollKind::Response, "U1", "C1");
        assert!(matches!(
            transition(&poll, Event::RecipientsResolved { recipients: vec![] }),
            Err(TransitionError::InvalidTransition(_))
        ));
    }
}
