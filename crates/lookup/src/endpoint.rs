use crate::error::{LookupError, Result};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

pub const TOPIC_ID_PLACEHOLDER: &str = "{topic_id}";

/// Primary endpoint first; the second spelling is still served by some
/// deployments of the same API.
pub const DEFAULT_ENDPOINTS: [&str; 2] = [
    "https://proxy.opinion.trade:8443/api/bsc/api/v2/topic/multi/{topic_id}",
    "https://proxy.opinion.trade:8443/api/bsc/api/v2/topic/mutil/{topic_id}",
];

/// URL template with a `{topic_id}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EndpointTemplate(String);

impl EndpointTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        if !template.contains(TOPIC_ID_PLACEHOLDER) {
            return Err(LookupError::InvalidEndpoint {
                template,
                reason: format!("missing {TOPIC_ID_PLACEHOLDER} placeholder"),
            });
        }
        if let Err(err) = Url::parse(&template.replace(TOPIC_ID_PLACEHOLDER, "0")) {
            return Err(LookupError::InvalidEndpoint {
                template,
                reason: err.to_string(),
            });
        }
        Ok(Self(template))
    }

    pub fn render(&self, topic_id: &str) -> Result<Url> {
        let raw = self.0.replace(TOPIC_ID_PLACEHOLDER, &encode_segment(topic_id));
        Url::parse(&raw).map_err(|err| LookupError::InvalidEndpoint {
            template: self.0.clone(),
            reason: err.to_string(),
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EndpointTemplate {
    type Error = LookupError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<EndpointTemplate> for String {
    fn from(value: EndpointTemplate) -> Self {
        value.0
    }
}

impl fmt::Display for EndpointTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[must_use]
pub fn default_endpoints() -> Vec<EndpointTemplate> {
    DEFAULT_ENDPOINTS
        .iter()
        .map(|raw| EndpointTemplate((*raw).to_string()))
        .collect()
}

/// Everything but RFC 3986 unreserved characters.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

fn encode_segment(raw: &str) -> String {
    utf8_percent_encode(raw, PATH_SEGMENT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn renders_topic_id_into_path() {
        let endpoints = default_endpoints();
        assert_eq!(
            endpoints[0].render("42").expect("render").as_str(),
            "https://proxy.opinion.trade:8443/api/bsc/api/v2/topic/multi/42"
        );
        assert!(endpoints[1].render("42").expect("render").path().ends_with("/mutil/42"));
    }

    #[test]
    fn escapes_path_breaking_ids() {
        let template = EndpointTemplate::new("https://example.test/t/{topic_id}").expect("ok");
        assert_eq!(
            template.render("a/b c").expect("render").as_str(),
            "https://example.test/t/a%2Fb%20c"
        );
        assert_eq!(
            template.render("x-1_2.3~é?").expect("render").as_str(),
            "https://example.test/t/x-1_2.3~%C3%A9%3F"
        );
    }

    #[test]
    fn rejects_templates_without_placeholder() {
        assert!(EndpointTemplate::new("https://example.test/t/").is_err());
        assert!(EndpointTemplate::new("not a url {topic_id}").is_err());
    }

    #[test]
    fn deserializes_through_validation() {
        let ok: std::result::Result<EndpointTemplate, _> =
            serde_json::from_str("\"https://example.test/{topic_id}\"");
        assert!(ok.is_ok());
        let bad: std::result::Result<EndpointTemplate, _> =
            serde_json::from_str("\"https://example.test/\"");
        assert!(bad.is_err());
    }
}
