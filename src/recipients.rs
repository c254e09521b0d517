//! Recipient resolution
//!
//! Turns mention text such as `<@U123> <#C456|general>` into a deduplicated
//! list of users. Channel and group mentions expand to their membership at
//! resolution time.

use crate::poll::Recipient;
use crate::runtime::RosterLookup;
use regex::Regex;
use std::collections::HashSet;

const MENTION_PATTERN: &str = r"<(?:@|#)([A-Za-z0-9]+)(?:\|[^>]*)?>";

/// One parsed mention token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mention {
    User(String),
    Channel(String),
    Group(String),
    Unknown(String),
}

impl Mention {
    fn classify(id: &str) -> Self {
        let id_owned = id.to_string();
        match id.chars().next() {
            Some('U' | 'W') => Mention::User(id_owned),
            Some('C') => Mention::Channel(id_owned),
            Some('G') => Mention::Group(id_owned),
            _ => Mention::Unknown(id_owned),
        }
    }
}

/// Mention parser and roster expander
#[derive(Debug, Clone)]
pub struct RecipientResolver {
    mention: Regex,
}

impl RecipientResolver {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            mention: Regex::new(MENTION_PATTERN)?,
        })
    }

    /// Mention tokens in the order they appear
    pub fn parse(&self, text: &str) -> Vec<Mention> {
        self.mention
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|id| Mention::classify(id.as_str()))
            .collect()
    }

    /// Resolve every mention in `text` into recipients, first occurrence wins.
    ///
    /// Unknown tokens and channels whose membership can't be fetched are
    /// logged and skipped. An empty result means nothing usable was found.
    /// Display names are looked up only for users mentioned directly.
    pub async fn resolve<R: RosterLookup + ?Sized>(&self, roster: &R, text: &str) -> Vec<Recipient> {
        let mut seen = HashSet::new();
        let mut named = HashSet::new();
        let mut ids = Vec::new();

        for mention in self.parse(text) {
            match mention {
                Mention::User(id) => {
                    named.insert(id.clone());
                    if seen.insert(id.clone()) {
                        ids.push(id);
                    }
                }
                Mention::Channel(channel) | Mention::Group(channel) => {
                    match roster.members(&channel).await {
                        Ok(members) => {
                            for id in members {
                                if seen.insert(id.clone()) {
                                    ids.push(id);
                                }
                            }
                        }
                        Err(e) => {
                            tracing::warn!(channel = %channel, error = %e, "Skipping unresolvable channel mention");
                        }
                    }
                }
                Mention::Unknown(id) => {
                    tracing::warn!(mention = %id, "Skipping unknown mention");
                }
            }
        }

        let mut recipients = Vec::with_capacity(ids.len());
        for id in ids {
            let display_name = if named.contains(&id) {
                roster.display_name(&id).await
            } else {
                None
            };
            recipients.push(Recipient {
                slack_id: id,
                display_name,
            });
        }
        recipients
    }
}
