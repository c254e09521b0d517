//! Slack adapters
//!
//! Web API client for outbound messages and roster lookups, plus parsing
//! and verification of inbound Events API requests.

mod api_client;
pub mod events;
pub mod signature;

pub use api_client::SlackApiClient;
