use crate::error::{AnnotatorError, Result};
use crate::navigation::NavigationStrategy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use topic_helper_dom::Selector;
use topic_helper_lookup::{default_endpoints, EndpointTemplate};

/// Prefix of the environment variables that override file settings.
pub const ENV_PREFIX: &str = "TOPIC_HELPER_";

/// Configuration for the annotation engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnnotatorConfig {
    /// Quiet period before a reconciliation pass runs
    pub debounce_ms: u64,

    /// Period of the self-healing check (0 = disabled)
    pub heal_interval_ms: u64,

    /// How client-side navigations are detected
    pub navigation: NavigationStrategy,

    /// Location polling period, used by the polling strategy only
    pub location_poll_ms: u64,

    /// Per-request timeout of the HTTP transport
    pub request_timeout_ms: u64,

    /// Lookup endpoints, tried in order
    pub endpoints: Vec<EndpointTemplate>,

    /// Heading selectors, highest priority first
    pub heading_selectors: Vec<String>,

    /// Used when no heading selector yields a renderable heading
    pub heading_fallback_selector: String,

    /// Candidate elements for child-topic titles
    pub title_selector: String,

    pub query: QueryKeys,

    pub badge: BadgeConfig,
}

/// Query-string keys that carry the topic context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct QueryKeys {
    pub topic_param: String,
    pub type_param: String,
    /// Compared case-insensitively
    pub multi_value: String,
}

impl Default for QueryKeys {
    fn default() -> Self {
        Self {
            topic_param: "topicId".to_string(),
            type_param: "type".to_string(),
            multi_value: "multi".to_string(),
        }
    }
}

/// Names of the nodes and classes injected into the page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BadgeConfig {
    pub class: String,
    pub heading_modifier: String,
    pub inline_modifier: String,
    pub style_id: String,
}

impl Default for BadgeConfig {
    fn default() -> Self {
        Self {
            class: "opinion-topic-helper-badge".to_string(),
            heading_modifier: "heading".to_string(),
            inline_modifier: "inline".to_string(),
            style_id: "opinion-topic-helper-style".to_string(),
        }
    }
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 150,
            heal_interval_ms: 1000,
            navigation: NavigationStrategy::HistoryEvents,
            location_poll_ms: 500,
            request_timeout_ms: 10_000,
            endpoints: default_endpoints(),
            heading_selectors: default_heading_selectors(),
            heading_fallback_selector: "h1, h2".to_string(),
            title_selector: "p.text-bodyL".to_string(),
            query: QueryKeys::default(),
            badge: BadgeConfig::default(),
        }
    }
}

fn default_heading_selectors() -> Vec<String> {
    [
        "[data-testid='topic-title']",
        "[data-test='topic-title']",
        "[data-qa='topic-title']",
        "main h1",
        "main h2",
        ".topic-page h1",
        ".topic-page h2",
        ".topic-header h1",
        ".topic-header h2",
        "h1",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}

impl AnnotatorConfig {
    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Apply `TOPIC_HELPER_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(std::env::vars())
    }

    /// Apply `TOPIC_HELPER_*` overrides from arbitrary key/value pairs.
    ///
    /// Unknown keys are ignored; malformed values are errors.
    pub fn apply_overrides<I, K, V>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let Some(name) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value = value.as_ref().trim();
            match name {
                "DEBOUNCE_MS" => self.debounce_ms = parse_millis(name, value)?,
                "HEAL_INTERVAL_MS" => self.heal_interval_ms = parse_millis(name, value)?,
                "LOCATION_POLL_MS" => self.location_poll_ms = parse_millis(name, value)?,
                "REQUEST_TIMEOUT_MS" => self.request_timeout_ms = parse_millis(name, value)?,
                "NAVIGATION" => {
                    self.navigation = match value.to_ascii_lowercase().as_str() {
                        "history" | "history_events" => NavigationStrategy::HistoryEvents,
                        "poll" | "polling" | "location_polling" => {
                            NavigationStrategy::LocationPolling
                        }
                        other => {
                            return Err(AnnotatorError::InvalidConfig(format!(
                                "{ENV_PREFIX}NAVIGATION: unknown strategy '{other}'"
                            )))
                        }
                    }
                }
                "ENDPOINTS" => {
                    self.endpoints = value
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(EndpointTemplate::new)
                        .collect::<std::result::Result<_, _>>()?;
                }
                "TITLE_SELECTOR" => self.title_selector = value.to_string(),
                _ => log::debug!("ignoring unknown override {ENV_PREFIX}{name}"),
            }
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoints.is_empty() {
            return Err(AnnotatorError::InvalidConfig(
                "at least one lookup endpoint is required".to_string(),
            ));
        }

        if self.request_timeout_ms == 0 {
            return Err(AnnotatorError::InvalidConfig(
                "request_timeout_ms must be > 0".to_string(),
            ));
        }

        if self.navigation == NavigationStrategy::LocationPolling && self.location_poll_ms == 0 {
            return Err(AnnotatorError::InvalidConfig(
                "location_poll_ms must be > 0 when polling the location".to_string(),
            ));
        }

        for selector in self
            .heading_selectors
            .iter()
            .chain([&self.heading_fallback_selector, &self.title_selector])
        {
            Selector::parse(selector)?;
        }

        let names = [
            ("badge.class", &self.badge.class),
            ("badge.heading_modifier", &self.badge.heading_modifier),
            ("badge.inline_modifier", &self.badge.inline_modifier),
            ("badge.style_id", &self.badge.style_id),
        ];
        for (field, value) in names {
            if value.is_empty() || value.chars().any(char::is_whitespace) {
                return Err(AnnotatorError::InvalidConfig(format!(
                    "{field} must be a single non-empty token, got '{value}'"
                )));
            }
        }

        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn heal_interval(&self) -> Duration {
        Duration::from_millis(self.heal_interval_ms)
    }

    pub fn location_poll(&self) -> Duration {
        Duration::from_millis(self.location_poll_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn parse_millis(name: &str, value: &str) -> Result<u64> {
    value.parse().map_err(|_| {
        AnnotatorError::InvalidConfig(format!(
            "{ENV_PREFIX}{name} must be a whole number of milliseconds, got '{value}'"
        ))
    })
}
