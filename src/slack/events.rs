//! Slack Events API envelopes

use crate::runtime::InboundMessage;
use serde::Deserialize;

/// Outer request body posted to the events endpoint
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    /// Handshake when the request URL is configured
    UrlVerification { challenge: String },
    EventCallback { event: MessageEvent },
    #[serde(other)]
    Other,
}

/// The subset of `message` / `app_mention` events the bot reads
#[derive(Debug, Clone, Deserialize)]
pub struct MessageEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub user: Option<String>,
    pub channel: Option<String>,
    #[serde(default)]
    pub text: String,
    pub channel_type: Option<String>,
    pub bot_id: Option<String>,
    pub subtype: Option<String>,
}

impl MessageEvent {
    /// Convert to an engine message, or `None` for events the bot ignores:
    /// edits and other subtypes, bot posts, and its own messages.
    pub fn into_inbound(self, bot_user_id: &str) -> Option<InboundMessage> {
        if !matches!(self.kind.as_str(), "message" | "app_mention") {
            return None;
        }
        if self.subtype.is_some() || self.bot_id.is_some() {
            return None;
        }
        let sender = self.user?;
        let channel = self.channel?;
        if sender == bot_user_id {
            return None;
        }

        let is_private = channel.starts_with('D') || self.channel_type.as_deref() == Some("im");
        let (is_direct_mention, text) = strip_bot_mention(&self.text, bot_user_id);

        // A channel mention arrives as both `message` and `app_mention`; only the latter counts
        if is_direct_mention && !is_private && self.kind == "message" {
            return None;
        }

        Some(InboundMessage {
            sender,
            channel,
            text,
            is_direct_mention,
            is_private,
        })
    }
}

/// Remove a leading `<@BOT>` (with optional `:`) and report whether it was there
pub fn strip_bot_mention(text: &str, bot_user_id: &str) -> (bool, String) {
    let trimmed = text.trim();
    let mention = format!("<@{bot_user_id}>");
    match trimmed.strip_prefix(&mention) {
        Some(rest) => (true, rest.trim_start_matches(':').trim().to_string()),
        None => (false, trimmed.to_string()),
    }
}
