//! Events that drive the authoring dialogue

use crate::poll::Recipient;

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The creator replied to the last prompt
    Reply { text: String },

    /// Mentions from a `getRecipients` reply were resolved against the roster.
    /// An empty list means nothing usable was found.
    RecipientsResolved { recipients: Vec<Recipient> },
}

impl Event {
    pub fn reply(text: impl Into<String>) -> Self {
        Event::Reply { text: text.into() }
    }
}
