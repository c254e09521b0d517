//! Runtime for processing inbound chat messages
//!
//! Messages are pushed onto a bounded queue and drained by a fixed pool of
//! workers, each running one message through the `Engine` to completion.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::Engine;
pub use traits::*;

use crate::slack::SlackApiClient;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Type alias for production engine with concrete implementations
pub type ProductionEngine = Engine<DatabaseStorage, Arc<SlackApiClient>, Arc<SlackApiClient>>;

/// A chat message addressed to the bot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub sender: String,
    pub channel: String,
    /// Text with any leading bot mention already removed
    pub text: String,
    pub is_direct_mention: bool,
    pub is_private: bool,
}

impl InboundMessage {
    /// Direct message to the bot
    #[allow(dead_code)] // Used in tests
    pub fn private(
        sender: impl Into<String>,
        channel: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            channel: channel.into(),
            text: text.into(),
            is_direct_mention: false,
            is_private: true,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("Message queue is full")]
    Full,
    #[error("Message queue is closed")]
    Closed,
}

/// Producer side of the inbound queue
#[derive(Clone)]
pub struct MessageQueue {
    tx: mpsc::Sender<InboundMessage>,
}

impl MessageQueue {
    /// Enqueue without waiting. Slack expects an answer to the HTTP request
    /// within seconds, so a full queue is reported rather than awaited.
    pub fn submit(&self, msg: InboundMessage) -> Result<(), QueueError> {
        self.tx.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => QueueError::Full,
            mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
        })
    }
}

/// Fixed pool of workers sharing one bounded queue
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    shutdown: CancellationToken,
}

impl WorkerPool {
    /// Start `workers` tasks pulling from a queue of `capacity` messages
    pub fn start<S, T, R>(
        engine: Arc<Engine<S, T, R>>,
        workers: usize,
        capacity: usize,
    ) -> (Self, MessageQueue)
    where
        S: PollStore + 'static,
        T: ChatTransport + 'static,
        R: RosterLookup + 'static,
    {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let shutdown = CancellationToken::new();

        let handles = (0..workers.max(1))
            .map(|worker| {
                let engine = Arc::clone(&engine);
                let rx = Arc::clone(&rx);
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    tracing::debug!(worker, "Worker started");
                    loop {
                        let next = {
                            let mut rx = rx.lock().await;
                            let received = tokio::select! {
                                () = shutdown.cancelled() => None,
                                msg = rx.recv() => Some(msg),
                            };
                            match received {
                                Some(msg) => msg,
                                None => {
                                    // Refuse new messages but hand out what is already queued
                                    rx.close();
                                    rx.recv().await
                                }
                            }
                        };
                        let Some(msg) = next else { break };
                        engine.handle(msg).await;
                    }
                    tracing::debug!(worker, "Worker stopped");
                })
            })
            .collect();

        (Self { handles, shutdown }, MessageQueue { tx })
    }

    /// Stop taking new messages, then wait for the workers to finish every
    /// message already queued
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Worker panicked");
            }
        }
        tracing::info!("Worker pool stopped");
    }
}
