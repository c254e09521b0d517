//! Effects produced by state transitions

use super::state::Stage;
use crate::runtime::Attachment;

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Write the new poll back, conditional on the stored stage
    PersistPoll { expected_stage: Stage },

    /// Resolve mention text into recipients; the runtime answers with
    /// `Event::RecipientsResolved`
    ResolveRecipients { text: String },

    /// Plain message to the creator's channel
    SendMessage { text: String },

    /// Rich message to the creator's channel
    PostMessage { text: String, attachment: Attachment },

    /// Deliver the poll to every recipient
    FanOut { attachment: Attachment },
}

impl Effect {
    pub fn persist(expected_stage: Stage) -> Self {
        Effect::PersistPoll { expected_stage }
    }

    pub fn send(text: impl Into<String>) -> Self {
        Effect::SendMessage { text: text.into() }
    }
}
