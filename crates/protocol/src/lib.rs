use anyhow::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub mod messages;

pub use messages::{HostMessage, StateResponse, GET_STATE_MESSAGE_TYPE, TOGGLE_MESSAGE_TYPE};

pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// Topic context derived from the current page location.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq, JsonSchema)]
pub struct UrlContext {
    pub topic_id: Option<String>,
    pub is_multi: bool,
}

impl UrlContext {
    #[must_use]
    pub fn single(topic_id: impl Into<String>) -> Self {
        Self {
            topic_id: Some(topic_id.into()),
            is_multi: false,
        }
    }

    #[must_use]
    pub fn multi(topic_id: impl Into<String>) -> Self {
        Self {
            topic_id: Some(topic_id.into()),
            is_multi: true,
        }
    }

    #[must_use]
    pub fn topic_id(&self) -> Option<&str> {
        self.topic_id.as_deref()
    }
}

/// One row of a multi-topic view, as returned by the remote lookup.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash, JsonSchema)]
pub struct ChildTopic {
    pub title: String,
    pub topic_id: String,
}

impl ChildTopic {
    #[must_use]
    pub fn new(title: impl Into<String>, topic_id: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            topic_id: topic_id.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BadgeMode {
    Single,
    Multi,
}

/// A live badge as seen from outside the page.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct BadgeSnapshot {
    pub mode: BadgeMode,
    pub topic_id: String,
    pub text: String,
    /// Normalized text of the annotated element, badge text excluded.
    pub target_text: String,
    pub attached: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct BadgeReport {
    pub schema_version: u32,
    pub location: String,
    pub enabled: bool,
    pub context: UrlContext,
    pub badges: Vec<BadgeSnapshot>,
    pub passes: u64,
}

impl BadgeReport {
    #[must_use]
    pub fn badge_texts(&self) -> Vec<&str> {
        self.badges.iter().map(|badge| badge.text.as_str()).collect()
    }
}

pub fn serialize_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(Into::into)
}

pub fn serialize_json_pretty<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(Into::into)
}
