//! HTTP surface: Slack Events API ingress and a health probe

mod handlers;

pub use handlers::create_router;

use crate::runtime::MessageQueue;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub queue: MessageQueue,
    pub bot_user_id: Arc<str>,
    pub signing_secret: Option<Arc<str>>,
}

impl AppState {
    pub fn new(queue: MessageQueue, bot_user_id: &str, signing_secret: Option<&str>) -> Self {
        Self {
            queue,
            bot_user_id: Arc::from(bot_user_id),
            signing_secret: signing_secret.map(Arc::from),
        }
    }
}
