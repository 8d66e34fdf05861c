//! Messages exchanged between the page script and the extension background.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const TOGGLE_MESSAGE_TYPE: &str = "OPINION_TOPIC_HELPER_TOGGLE";
pub const GET_STATE_MESSAGE_TYPE: &str = "OPINION_TOPIC_HELPER_GET_STATE";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
#[serde(tag = "type")]
pub enum HostMessage {
    /// Pushed by the background whenever the user flips the toggle.
    #[serde(rename = "OPINION_TOPIC_HELPER_TOGGLE")]
    Toggle {
        #[serde(default)]
        enabled: bool,
    },
    /// Sent by the page script once at startup.
    #[serde(rename = "OPINION_TOPIC_HELPER_GET_STATE")]
    GetState,
}

impl HostMessage {
    /// Parses an inbound message; unknown or malformed messages are ignored.
    #[must_use]
    pub fn parse(value: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
pub struct StateResponse {
    pub enabled: bool,
}

impl StateResponse {
    /// A missing answer means the background never stored a preference.
    #[must_use]
    pub fn resolve(response: Option<Self>) -> bool {
        response.map_or(true, |r| r.enabled)
    }
}
