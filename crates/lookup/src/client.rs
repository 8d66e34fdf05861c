use crate::cache::{ChildList, LookupCache};
use crate::endpoint::EndpointTemplate;
use crate::generation::FetchGeneration;
use crate::payload::parse_child_list;
use crate::transport::Transport;
use log::{debug, warn};
use std::fmt;
use std::sync::Arc;

/// Fetches child topics for a multi-topic id.
///
/// Clones share the transport, the cache and the generation counter.
#[derive(Clone)]
pub struct LookupClient {
    transport: Arc<dyn Transport>,
    endpoints: Arc<[EndpointTemplate]>,
    cache: LookupCache,
    generation: FetchGeneration,
}

impl fmt::Debug for LookupClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LookupClient")
            .field("endpoints", &self.endpoints)
            .field("cached_topics", &self.cache.len())
            .field("generation", &self.generation.current())
            .finish_non_exhaustive()
    }
}

impl LookupClient {
    pub fn new(transport: Arc<dyn Transport>, endpoints: Vec<EndpointTemplate>) -> Self {
        Self {
            transport,
            endpoints: endpoints.into(),
            cache: LookupCache::new(),
            generation: FetchGeneration::new(),
        }
    }

    #[must_use]
    pub fn with_cache(mut self, cache: LookupCache) -> Self {
        self.cache = cache;
        self
    }

    #[must_use]
    pub fn with_generation(mut self, generation: FetchGeneration) -> Self {
        self.generation = generation;
        self
    }

    #[must_use]
    pub fn cache(&self) -> &LookupCache {
        &self.cache
    }

    #[must_use]
    pub fn generation(&self) -> &FetchGeneration {
        &self.generation
    }

    #[must_use]
    pub fn endpoints(&self) -> &[EndpointTemplate] {
        &self.endpoints
    }

    #[must_use]
    pub fn cached(&self, topic_id: &str) -> Option<ChildList> {
        self.cache.get(topic_id)
    }

    /// Returns the child list for `topic_id`, or `None` when no endpoint
    /// produced one or when `generation` was superseded while waiting.
    ///
    /// Endpoint failures are logged and never surfaced.
    pub async fn fetch_child_topics(&self, topic_id: &str, generation: u64) -> Option<ChildList> {
        if let Some(hit) = self.cache.get(topic_id) {
            debug!("lookup cache hit for topic {topic_id}");
            return Some(hit);
        }

        for template in self.endpoints.iter() {
            let url = match template.render(topic_id) {
                Ok(url) => url,
                Err(err) => {
                    warn!("skipping endpoint: {err}");
                    continue;
                }
            };
            let payload = match self.transport.get_json(&url).await {
                Ok(payload) => payload,
                Err(err) => {
                    debug!("lookup via {url} failed: {err}");
                    continue;
                }
            };
            if !self.generation.is_current(generation) {
                debug!("discarding stale lookup for topic {topic_id} (generation {generation})");
                return None;
            }
            match parse_child_list(&payload) {
                Some(children) => {
                    debug!(
                        "lookup for topic {topic_id} returned {} children via {url}",
                        children.len()
                    );
                    return Some(self.cache.insert(topic_id, children));
                }
                None => debug!("lookup via {url} returned no child list"),
            }
        }

        warn!("no endpoint produced child topics for topic {topic_id}");
        None
    }
}
