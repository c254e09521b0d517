//! Slack Web API client

use crate::runtime::{Attachment, ChatTransport, RosterError, RosterLookup, TransportError};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// `conversations.members` page size
const MEMBERS_PAGE_LIMIT: u32 = 200;

/// Thin client over the few Web API methods the bot needs
pub struct SlackApiClient {
    client: Client,
    token: String,
    base_url: String,
}

impl SlackApiClient {
    pub fn new(token: impl Into<String>, base_url: &str) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            token: token.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    /// The bot's own user id
    pub async fn auth_test(&self) -> Result<String, TransportError> {
        let response: AuthTestResponse = self.call_get("auth.test", &[]).await?;
        response.user_id.ok_or_else(|| {
            TransportError::Api("auth.test returned no user_id".to_string())
        })
    }

    async fn call_get<R>(&self, method: &str, query: &[(&str, &str)]) -> Result<R, TransportError>
    where
        R: DeserializeOwned,
    {
        let body: Value = self
            .client
            .get(self.url(method))
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        parse_response(body)
    }

    async fn call_post<B, R>(&self, method: &str, payload: &B) -> Result<R, TransportError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let body: Value = self
            .client
            .post(self.url(method))
            .bearer_auth(&self.token)
            .json(payload)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        parse_response(body)
    }

    async fn post_message(&self, message: &PostMessage<'_>) -> Result<(), TransportError> {
        let _: Value = self.call_post("chat.postMessage", message).await?;
        Ok(())
    }
}

#[async_trait]
impl ChatTransport for SlackApiClient {
    async fn send(&self, channel: &str, text: &str) -> Result<(), TransportError> {
        self.post_message(&PostMessage {
            channel,
            text,
            attachments: None,
        })
        .await
    }

    async fn post(
        &self,
        channel: &str,
        text: &str,
        attachment: &Attachment,
    ) -> Result<(), TransportError> {
        self.post_message(&PostMessage {
            channel,
            text,
            attachments: Some(std::slice::from_ref(attachment)),
        })
        .await
    }
}

#[async_trait]
impl RosterLookup for SlackApiClient {
    async fn members(&self, channel_id: &str) -> Result<Vec<String>, RosterError> {
        let limit = MEMBERS_PAGE_LIMIT.to_string();
        let mut members = Vec::new();
        let mut cursor = String::new();

        loop {
            let mut query = vec![("channel", channel_id), ("limit", limit.as_str())];
            if !cursor.is_empty() {
                query.push(("cursor", cursor.as_str()));
            }

            let page: MembersPage = self
                .call_get("conversations.members", &query)
                .await
                .map_err(|e| match e {
                    TransportError::Api(code) if code == "channel_not_found" => {
                        RosterError::UnknownChannel(channel_id.to_string())
                    }
                    other => RosterError::Lookup(other.to_string()),
                })?;

            members.extend(page.members);
            match page.response_metadata.and_then(|m| m.next_cursor) {
                Some(next) if !next.is_empty() => cursor = next,
                _ => break,
            }
        }

        Ok(members)
    }

    async fn display_name(&self, user_id: &str) -> Option<String> {
        match self
            .call_get::<UserInfo>("users.info", &[("user", user_id)])
            .await
        {
            Ok(info) => info.user.best_name(),
            Err(e) => {
                tracing::debug!(user = %user_id, error = %e, "users.info failed");
                None
            }
        }
    }
}

// Slack API types

#[derive(Debug, Serialize)]
struct PostMessage<'a> {
    channel: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    attachments: Option<&'a [Attachment]>,
}

/// Every Web API response carries `ok` and, when false, an `error` code
fn parse_response<T: DeserializeOwned>(body: Value) -> Result<T, TransportError> {
    if body.get("ok").and_then(Value::as_bool) != Some(true) {
        let code = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown_error");
        return Err(TransportError::Api(code.to_string()));
    }
    serde_json::from_value(body)
        .map_err(|e| TransportError::Api(format!("malformed response: {e}")))
}

#[derive(Debug, Deserialize)]
struct AuthTestResponse {
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MembersPage {
    #[serde(default)]
    members: Vec<String>,
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    user: SlackUser,
}

#[derive(Debug, Deserialize)]
struct SlackUser {
    name: Option<String>,
    real_name: Option<String>,
    #[serde(default)]
    profile: Option<SlackProfile>,
}

#[derive(Debug, Deserialize)]
struct SlackProfile {
    display_name: Option<String>,
}

impl SlackUser {
    /// Profile display name, then real name, then handle
    fn best_name(self) -> Option<String> {
        self.profile
            .and_then(|p| p.display_name)
            .filter(|n| !n.is_empty())
            .or(self.real_name.filter(|n| !n.is_empty()))
            .or(self.name)
    }
}
