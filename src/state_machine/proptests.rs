//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::state::*;
use super::transition::*;
use super::*;
use crate::poll::{Poll, PollKind, Recipient};
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_kind() -> impl Strategy<Value = PollKind> {
    prop_oneof![Just(PollKind::Response), Just(PollKind::Feedback)]
}

fn arb_recipients() -> impl Strategy<Value = Vec<Recipient>> {
    proptest::collection::vec("U[A-Z0-9]{4}".prop_map(Recipient::new), 0..6)
}

fn arb_reply() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("yes".to_string()),
        Just("no".to_string()),
        Just(String::new()),
        "[a-zA-Z ,]{0,30}",
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        3 => arb_reply().prop_map(|text| Event::Reply { text }),
        1 => arb_recipients().prop_map(|recipients| Event::RecipientsResolved { recipients }),
    ]
}

fn arb_non_confirmation() -> impl Strategy<Value = String> {
    "[a-zA-Z ]{0,10}".prop_filter("not a confirmation", |s| s != CONFIRMATION)
}

fn position(stage: Stage) -> usize {
    Stage::ALL
        .iter()
        .position(|s| *s == stage)
        .unwrap_or(usize::MAX)
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Whatever the input, a poll either stays put or moves to the
    /// successor of its current stage.
    #[test]
    fn prop_stage_only_moves_to_successor(
        kind in arb_kind(),
        events in proptest::collection::vec(arb_event(), 1..25),
    ) {
        let mut poll = Poll::new(kind, "U1", "C1");
        let mut visited = vec![poll.stage];

        for event in events {
            let before = poll.stage;
            if let Ok(result) = transition(&poll, event) {
                let after = result.poll.stage;
                prop_assert!(after == before || Some(after) == before.successor(kind));
                if after != before {
                    prop_assert_eq!(result.poll.previous_stage, before);
                    visited.push(after);
                }
                poll = result.poll;
            }
        }

        for pair in visited.windows(2) {
            prop_assert!(position(pair[0]) < position(pair[1]));
        }
        if kind == PollKind::Feedback {
            prop_assert!(!visited.contains(&Stage::GetAnswers));
        }
    }

    /// Every stage change is paired with a conditional write for the stage
    /// it left.
    #[test]
    fn prop_advancing_persists_previous_stage(
        kind in arb_kind(),
        events in proptest::collection::vec(arb_event(), 1..25),
    ) {
        let mut poll = Poll::new(kind, "U1", "C1");
        for event in events {
            let before = poll.stage;
            if let Ok(result) = transition(&poll, event) {
                let persisted = result.effects.contains(&Effect::persist(before));
                prop_assert_eq!(persisted, result.poll.stage != before);
                poll = result.poll;
            }
        }
    }

    #[test]
    fn prop_decline_never_advances(kind in arb_kind(), reply in arb_non_confirmation()) {
        let mut poll = Poll::new(kind, "U1", "C1");
        poll.stage = Stage::SendPoll;
        let result = transition(&poll, Event::Reply { text: reply }).unwrap();
        prop_assert_eq!(result.poll.stage, Stage::SendPoll);
        let fanned_out = result.effects.iter().any(|e| matches!(e, Effect::FanOut { .. }));
        prop_assert!(!fanned_out);
    }

    #[test]
    fn prop_active_polls_reject_dialogue(kind in arb_kind(), event in arb_event()) {
        let mut poll = Poll::new(kind, "U1", "C1");
        poll.stage = Stage::Active;
        prop_assert_eq!(
            transition(&poll, event).unwrap_err(),
            TransitionError::NoHandler(Stage::Active)
        );
    }
}
