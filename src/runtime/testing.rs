//! Mock implementations for testing
//!
//! These mocks enable engine testing without talking to Slack.

use super::traits::*;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

// ============================================================================
// Recording Transport
// ============================================================================

/// One outbound message captured by `RecordingTransport`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text {
        channel: String,
        text: String,
    },
    Rich {
        channel: String,
        text: String,
        attachment: Attachment,
    },
}

impl Outbound {
    pub fn channel(&self) -> &str {
        match self {
            Outbound::Text { channel, .. } | Outbound::Rich { channel, .. } => channel,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Outbound::Text { text, .. } | Outbound::Rich { text, .. } => text,
        }
    }

    pub fn attachment(&self) -> Option<&Attachment> {
        match self {
            Outbound::Rich { attachment, .. } => Some(attachment),
            Outbound::Text { .. } => None,
        }
    }
}

/// Transport that records every attempt, optionally failing for some channels
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<Outbound>>,
    failing: HashSet<String>,
}

#[allow(dead_code)]
impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every delivery to `channel` is recorded and then fails
    pub fn failing_for(mut self, channel: impl Into<String>) -> Self {
        self.failing.insert(channel.into());
        self
    }

    pub fn sent(&self) -> Vec<Outbound> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, channel: &str) -> Vec<Outbound> {
        self.sent()
            .into_iter()
            .filter(|m| m.channel() == channel)
            .collect()
    }

    /// Text of the most recent message to `channel`
    pub fn last_text(&self, channel: &str) -> Option<String> {
        self.sent_to(channel).last().map(|m| m.text().to_string())
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }

    fn record(&self, message: Outbound) -> Result<(), TransportError> {
        let channel = message.channel().to_string();
        self.sent.lock().unwrap().push(message);
        if self.failing.contains(&channel) {
            return Err(TransportError::Api("channel_not_found".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send(&self, channel: &str, text: &str) -> Result<(), TransportError> {
        self.record(Outbound::Text {
            channel: channel.to_string(),
            text: text.to_string(),
        })
    }

    async fn post(
        &self,
        channel: &str,
        text: &str,
        attachment: &Attachment,
    ) -> Result<(), TransportError> {
        self.record(Outbound::Rich {
            channel: channel.to_string(),
            text: text.to_string(),
            attachment: attachment.clone(),
        })
    }
}

// ============================================================================
// Static Roster
// ============================================================================

/// Fixed channel memberships and display names
#[derive(Default)]
pub struct StaticRoster {
    channels: HashMap<String, Vec<String>>,
    names: HashMap<String, String>,
}

#[allow(dead_code)]
impl StaticRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel(mut self, channel: impl Into<String>, members: &[&str]) -> Self {
        self.channels.insert(
            channel.into(),
            members.iter().map(|m| (*m).to_string()).collect(),
        );
        self
    }

    pub fn with_name(mut self, user: impl Into<String>, name: impl Into<String>) -> Self {
        self.names.insert(user.into(), name.into());
        self
    }
}

#[async_trait]
impl RosterLookup for StaticRoster {
    async fn members(&self, channel_id: &str) -> Result<Vec<String>, RosterError> {
        self.channels
            .get(channel_id)
            .cloned()
            .ok_or_else(|| RosterError::UnknownChannel(channel_id.to_string()))
    }

    async fn display_name(&self, user_id: &str) -> Option<String> {
        self.names.get(user_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_transport_records_failures_too() {
        let transport = RecordingTransport::new().failing_for("U9");
        transport.send("C1", "hello").await.unwrap();
        assert!(transport
            .post("U9", "", &Attachment::default())
            .await
            .is_err());

        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(transport.last_text("C1").as_deref(), Some("hello"));
        assert!(sent[1].attachment().is_some());
    }

    #[tokio::test]
    async fn test_static_roster() {
        let roster = StaticRoster::new()
            .with_channel("C1", &["U1", "U2"])
            .with_name("U1", "ada");
        assert_eq!(roster.members("C1").await.unwrap(), vec!["U1", "U2"]);
        assert!(matches!(
            roster.members("C2").await,
            Err(RosterError::UnknownChannel(_))
        ));
        assert_eq!(roster.display_name("U1").await.as_deref(), Some("ada"));
        assert_eq!(roster.display_name("U2").await, None);
    }
}
