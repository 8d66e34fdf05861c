use crate::config::QueryKeys;
use topic_helper_protocol::UrlContext;
use url::Url;

/// Derives the topic context from a location string.
///
/// The first occurrence of each query key wins. Unparseable locations yield
/// an empty context.
pub fn parse_url_context(location: &str, keys: &QueryKeys) -> UrlContext {
    let Ok(url) = Url::parse(location) else {
        return UrlContext::default();
    };

    let mut topic_id = None;
    let mut kind = None;
    for (key, value) in url.query_pairs() {
        if topic_id.is_none() && key == keys.topic_param.as_str() {
            topic_id = Some(value.trim().to_string());
        } else if kind.is_none() && key == keys.type_param.as_str() {
            kind = Some(value.into_owned());
        }
    }

    UrlContext {
        topic_id: topic_id.filter(|id| !id.is_empty()),
        is_multi: kind.is_some_and(|kind| kind.eq_ignore_ascii_case(&keys.multi_value)),
    }
}
