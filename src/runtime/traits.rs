//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the engine with mock implementations.

use crate::db::{Database, DbError};
use crate::poll::{Poll, PollResponse};
use crate::state_machine::state::Stage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// Outbound message payloads
// ============================================================================

/// A titled field inside a rich message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentField {
    pub title: String,
    pub value: String,
    pub short: bool,
}

impl AttachmentField {
    pub fn new(title: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            value: value.into(),
            short: false,
        }
    }

    pub fn short(mut self) -> Self {
        self.short = true;
        self
    }
}

/// Rich message body (previews, summaries, poll delivery)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Attachment {
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pretext: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub fields: Vec<AttachmentField>,
}

// ============================================================================
// Collaborator errors
// ============================================================================

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Slack API error: {0}")]
    Api(String),
}

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("Unknown channel: {0}")]
    UnknownChannel(String),
    #[error("Roster lookup failed: {0}")]
    Lookup(String),
}

// ============================================================================
// Traits
// ============================================================================

/// Persistence gateway for polls
#[async_trait]
pub trait PollStore: Send + Sync {
    /// Insert a new poll. Fails if the creator already has a pending poll in
    /// the channel or the public identifier was ever used.
    async fn create_poll(&self, poll: &Poll) -> Result<Poll, DbError>;

    /// Write back an authored poll, provided its stored stage is still
    /// `expected_stage`.
    async fn save_poll(&self, poll: &Poll, expected_stage: Stage) -> Result<(), DbError>;

    /// Hard-delete a poll and everything it owns
    async fn delete_poll(&self, uuid: &str) -> Result<(), DbError>;

    /// The single not-yet-active poll for `(creator, channel)`
    async fn find_pending_poll(&self, creator: &str, channel: &str)
        -> Result<Option<Poll>, DbError>;

    /// Any poll by public identifier
    async fn find_poll(&self, uuid: &str) -> Result<Option<Poll>, DbError>;

    /// An active poll by public identifier
    async fn find_active_poll(&self, uuid: &str) -> Result<Option<Poll>, DbError>;

    /// Active polls a creator started in a channel, oldest first
    async fn list_active_polls(&self, creator: &str, channel: &str) -> Result<Vec<Poll>, DbError>;

    /// Append a response to an active poll
    async fn add_response(&self, uuid: &str, response: &PollResponse) -> Result<(), DbError>;
}

/// Outbound messages to the chat platform
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Plain conversational message
    async fn send(&self, channel: &str, text: &str) -> Result<(), TransportError>;

    /// Message with a rich attachment
    async fn post(
        &self,
        channel: &str,
        text: &str,
        attachment: &Attachment,
    ) -> Result<(), TransportError>;
}

/// Live channel/group membership
#[async_trait]
pub trait RosterLookup: Send + Sync {
    /// Current member ids of a channel or group
    async fn members(&self, channel_id: &str) -> Result<Vec<String>, RosterError>;

    /// Human readable name for a user, when the platform knows one
    async fn display_name(&self, _user_id: &str) -> Option<String> {
        None
    }
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: ChatTransport + ?Sized> ChatTransport for Arc<T> {
    async fn send(&self, channel: &str, text: &str) -> Result<(), TransportError> {
        (**self).send(channel, text).await
    }

    async fn post(
        &self,
        channel: &str,
        text: &str,
        attachment: &Attachment,
    ) -> Result<(), TransportError> {
        (**self).post(channel, text, attachment).await
    }
}

#[async_trait]
impl<T: RosterLookup + ?Sized> RosterLookup for Arc<T> {
    async fn members(&self, channel_id: &str) -> Result<Vec<String>, RosterError> {
        (**self).members(channel_id).await
    }

    async fn display_name(&self, user_id: &str) -> Option<String> {
        (**self).display_name(user_id).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use Database as a `PollStore`
#[derive(Clone)]
pub struct DatabaseStorage {
    db: Database,
}

impl DatabaseStorage {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PollStore for DatabaseStorage {
    async fn create_poll(&self, poll: &Poll) -> Result<Poll, DbError> {
        self.db.create_poll(poll)
    }

    async fn save_poll(&self, poll: &Poll, expected_stage: Stage) -> Result<(), DbError> {
        self.db.save_poll(poll, expected_stage)
    }

    async fn delete_poll(&self, uuid: &str) -> Result<(), DbError> {
        self.db.delete_poll(uuid)
    }

    async fn find_pending_poll(
        &self,
        creator: &str,
        channel: &str,
    ) -> Result<Option<Poll>, DbError> {
        self.db.find_pending_poll(creator, channel)
    }

    async fn find_poll(&self, uuid: &str) -> Result<Option<Poll>, DbError> {
        self.db.find_poll(uuid)
    }

    async fn find_active_poll(&self, uuid: &str) -> Result<Option<Poll>, DbError> {
        self.db.find_active_poll(uuid)
    }

    async fn list_active_polls(&self, creator: &str, channel: &str) -> Result<Vec<Poll>, DbError> {
        self.db.list_active_polls(creator, channel)
    }

    async fn add_response(&self, uuid: &str, response: &PollResponse) -> Result<(), DbError> {
        self.db.add_response(uuid, response)
    }
}
