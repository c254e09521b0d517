//! Dialogue engine
//!
//! Runs top-level commands and drives the authoring state machine, carrying
//! out the effects each transition asks for.

use super::traits::{Attachment, ChatTransport, PollStore, RosterLookup};
use super::InboundMessage;

use crate::db::DbError;
use crate::poll::report::validate_response;
use crate::poll::{render, Poll, PollKind, PollResponse};
use crate::recipients::RecipientResolver;
use crate::router::{Command, Router};
use crate::state_machine::{transition, Effect, Event, TransitionError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Typed outcome of a failed handler. The message is what the user sees.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    /// Detail is logged, never shown
    #[error("internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    /// Text to send back to the user
    pub fn user_message(&self) -> &str {
        match self {
            HandlerError::Validation(msg)
            | HandlerError::Conflict(msg)
            | HandlerError::NotFound(msg) => msg,
            HandlerError::Internal(_) => render::INTERNAL,
        }
    }
}

impl From<DbError> for HandlerError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::PendingPollExists { uuid } => {
                HandlerError::Conflict(render::already_pending(&uuid))
            }
            DbError::DuplicateUuid(_) => HandlerError::Conflict(render::DUPLICATE_ID.to_string()),
            DbError::PollNotFound(uuid) => HandlerError::NotFound(render::poll_not_found(&uuid)),
            other @ (DbError::StaleStage { .. } | DbError::Sqlite(_)) => {
                HandlerError::Internal(other.to_string())
            }
        }
    }
}

type ConversationKey = (String, String);

/// Processes inbound messages against the poll store
pub struct Engine<S, T, R>
where
    S: PollStore,
    T: ChatTransport,
    R: RosterLookup,
{
    store: S,
    transport: T,
    roster: R,
    router: Router,
    resolver: RecipientResolver,
    /// One writer at a time per (sender, channel)
    conversations: Mutex<HashMap<ConversationKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl<S, T, R> Engine<S, T, R>
where
    S: PollStore,
    T: ChatTransport,
    R: RosterLookup,
{
    pub fn new(store: S, transport: T, roster: R) -> Result<Self, regex::Error> {
        Ok(Self {
            store,
            transport,
            roster,
            router: Router::new()?,
            resolver: RecipientResolver::new()?,
            conversations: Mutex::new(HashMap::new()),
        })
    }

    /// Handle one inbound message to completion
    pub async fn handle(&self, msg: InboundMessage) {
        if !msg.is_direct_mention && !msg.is_private {
            tracing::trace!(sender = %msg.sender, channel = %msg.channel, "Ignoring ambient message");
            return;
        }

        let key = (msg.sender.clone(), msg.channel.clone());
        let lock = self.conversation_lock(&key);
        let guard = lock.lock().await;

        let outcome = match self.router.classify(&msg.text) {
            Some(command) => {
                tracing::info!(
                    command = %command,
                    sender = %msg.sender,
                    channel = %msg.channel,
                    "Dispatching command"
                );
                self.dispatch(&msg, command).await
            }
            None => self.continue_dialogue(&msg).await,
        };

        if let Err(e) = outcome {
            self.report(&msg, &e).await;
        }

        drop(guard);
        drop(lock);
        self.release_conversation(&key);
    }

    fn conversation_lock(&self, key: &ConversationKey) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self
            .conversations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        map.entry(key.clone()).or_default().clone()
    }

    fn release_conversation(&self, key: &ConversationKey) {
        let mut map = self
            .conversations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if map.get(key).is_some_and(|l| Arc::strong_count(l) == 1) {
            map.remove(key);
        }
    }

    async fn report(&self, msg: &InboundMessage, error: &HandlerError) {
        match error {
            HandlerError::Internal(detail) => tracing::error!(
                sender = %msg.sender,
                channel = %msg.channel,
                error = %detail,
                "Handler failed"
            ),
            other => tracing::info!(
                sender = %msg.sender,
                channel = %msg.channel,
                outcome = ?other,
                "Request rejected"
            ),
        }
        self.send(&msg.channel, error.user_message()).await;
    }

    // ==================== Top-level commands ====================

    async fn dispatch(&self, msg: &InboundMessage, command: Command) -> Result<(), HandlerError> {
        match command {
            Command::Create { kind } => self.create_poll(msg, &kind).await,
            Command::Cancel { uuid } => self.cancel_poll(msg, &uuid).await,
            Command::Answer { uuid, answer } => self.answer_poll(msg, &uuid, &answer).await,
            Command::Show { uuid } => self.show_poll(msg, &uuid).await,
            Command::ListActive => self.list_active(msg).await,
            Command::Help => {
                self.send(&msg.channel, render::HELP).await;
                Ok(())
            }
        }
    }

    async fn create_poll(&self, msg: &InboundMessage, kind: &str) -> Result<(), HandlerError> {
        let kind: PollKind = kind
            .parse()
            .map_err(|e: crate::poll::InvalidPollKind| HandlerError::Validation(e.to_string()))?;

        let poll = self
            .store
            .create_poll(&Poll::new(kind, &msg.sender, &msg.channel))
            .await?;
        tracing::info!(poll_uuid = %poll.uuid, kind = %kind, "Poll created");

        self.send(&msg.channel, &render::created(&poll)).await;
        Ok(())
    }

    /// Only the creator may cancel; anyone else is told it doesn't exist
    async fn cancel_poll(&self, msg: &InboundMessage, uuid: &str) -> Result<(), HandlerError> {
        let not_found = || HandlerError::NotFound(render::CANCEL_NOT_FOUND.to_string());

        let poll = self.store.find_poll(uuid).await?.ok_or_else(not_found)?;
        if poll.creator != msg.sender {
            return Err(not_found());
        }

        match self.store.delete_poll(uuid).await {
            Ok(()) => {}
            Err(DbError::PollNotFound(_)) => return Err(not_found()),
            Err(e) => return Err(e.into()),
        }
        tracing::info!(poll_uuid = %uuid, stage = %poll.stage, "Poll cancelled");

        self.send(&msg.channel, render::CANCELLED).await;
        Ok(())
    }

    /// Only recipients of an active poll may answer it
    async fn answer_poll(
        &self,
        msg: &InboundMessage,
        uuid: &str,
        answer: &str,
    ) -> Result<(), HandlerError> {
        let not_found = || HandlerError::NotFound(render::answer_not_found(uuid));

        let poll = self
            .store
            .find_active_poll(uuid)
            .await?
            .ok_or_else(not_found)?;
        if !poll.is_recipient(&msg.sender) {
            return Err(not_found());
        }

        let answer = answer.trim();
        validate_response(&poll, answer)
            .map_err(|_| HandlerError::Validation(render::invalid_answer(&poll)))?;

        match self
            .store
            .add_response(uuid, &PollResponse::new(&msg.sender, answer))
            .await
        {
            Ok(()) => {}
            Err(DbError::PollNotFound(_)) => return Err(not_found()),
            Err(e) => return Err(e.into()),
        }
        tracing::info!(poll_uuid = %uuid, sender = %msg.sender, "Response recorded");

        self.send(&msg.channel, render::THANKS).await;
        Ok(())
    }

    async fn show_poll(&self, msg: &InboundMessage, uuid: &str) -> Result<(), HandlerError> {
        let poll = self
            .store
            .find_active_poll(uuid)
            .await?
            .ok_or_else(|| HandlerError::NotFound(render::poll_not_found(uuid)))?;

        self.post(&msg.channel, "", &render::summary(&poll)).await;
        Ok(())
    }

    async fn list_active(&self, msg: &InboundMessage) -> Result<(), HandlerError> {
        let polls = self
            .store
            .list_active_polls(&msg.sender, &msg.channel)
            .await?;

        if polls.is_empty() {
            self.send(&msg.channel, render::NO_ACTIVE_POLLS).await;
        } else {
            self.post(
                &msg.channel,
                render::ACTIVE_POLLS_INTRO,
                &render::active_list(&polls),
            )
            .await;
        }
        Ok(())
    }

    // ==================== Authoring dialogue ====================

    async fn continue_dialogue(&self, msg: &InboundMessage) -> Result<(), HandlerError> {
        let Some(mut poll) = self
            .store
            .find_pending_poll(&msg.sender, &msg.channel)
            .await?
        else {
            tracing::warn!(
                sender = %msg.sender,
                channel = %msg.channel,
                "No poll in progress, dropping message"
            );
            return Ok(());
        };

        // Effects may feed an event back in; process them in a loop, no recursion
        let mut next_event = Some(Event::reply(msg.text.trim()));
        while let Some(event) = next_event.take() {
            let result = match transition(&poll, event) {
                Ok(result) => result,
                Err(TransitionError::Validation(prompt)) => {
                    return Err(HandlerError::Validation(prompt))
                }
                Err(e) => {
                    tracing::warn!(
                        sender = %msg.sender,
                        channel = %msg.channel,
                        poll_uuid = %poll.uuid,
                        stage = %poll.stage,
                        error = %e,
                        "Dropping dialogue message"
                    );
                    return Ok(());
                }
            };

            poll = result.poll;
            for effect in result.effects {
                if let Some(event) = self.execute_effect(&poll, effect).await? {
                    next_event = Some(event);
                }
            }
        }
        Ok(())
    }

    async fn execute_effect(
        &self,
        poll: &Poll,
        effect: Effect,
    ) -> Result<Option<Event>, HandlerError> {
        match effect {
            Effect::PersistPoll { expected_stage } => {
                self.store.save_poll(poll, expected_stage).await?;
                tracing::info!(
                    poll_uuid = %poll.uuid,
                    from = %expected_stage,
                    stage = %poll.stage,
                    "Poll advanced"
                );
                Ok(None)
            }
            Effect::ResolveRecipients { text } => {
                let recipients = self.resolver.resolve(&self.roster, &text).await;
                tracing::debug!(poll_uuid = %poll.uuid, count = recipients.len(), "Resolved recipients");
                Ok(Some(Event::RecipientsResolved { recipients }))
            }
            Effect::SendMessage { text } => {
                self.send(&poll.channel, &text).await;
                Ok(None)
            }
            Effect::PostMessage { text, attachment } => {
                self.post(&poll.channel, &text, &attachment).await;
                Ok(None)
            }
            Effect::FanOut { attachment } => {
                self.fan_out(poll, &attachment).await;
                Ok(None)
            }
        }
    }

    /// Deliver to each recipient in turn. Failures are logged and skipped;
    /// the poll is already active either way.
    async fn fan_out(&self, poll: &Poll, attachment: &Attachment) -> usize {
        let mut delivered = 0;
        for recipient in &poll.recipients {
            match self
                .transport
                .post(&recipient.slack_id, "", attachment)
                .await
            {
                Ok(()) => delivered += 1,
                Err(e) => tracing::error!(
                    poll_uuid = %poll.uuid,
                    recipient = %recipient.slack_id,
                    error = %e,
                    "Poll delivery failed"
                ),
            }
        }
        tracing::info!(
            poll_uuid = %poll.uuid,
            delivered,
            recipients = poll.recipients.len(),
            "Poll fanned out"
        );
        delivered
    }

    // ==================== Transport helpers ====================

    async fn send(&self, channel: &str, text: &str) {
        if let Err(e) = self.transport.send(channel, text).await {
            tracing::error!(channel = %channel, error = %e, "Failed to send message");
        }
    }

    async fn post(&self, channel: &str, text: &str, attachment: &Attachment) {
        if let Err(e) = self.transport.post(channel, text, attachment).await {
            tracing::error!(channel = %channel, error = %e, "Failed to post message");
        }
    }
}
