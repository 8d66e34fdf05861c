use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use topic_helper_protocol::ChildTopic;

pub type ChildList = Arc<Vec<ChildTopic>>;

/// Process-lifetime cache of child lists keyed by multi-topic id.
///
/// Cloning shares the underlying map.
#[derive(Clone, Debug, Default)]
pub struct LookupCache {
    entries: Arc<Mutex<HashMap<String, ChildList>>>,
}

impl LookupCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, topic_id: &str) -> Option<ChildList> {
        self.lock().get(topic_id).cloned()
    }

    pub fn insert(&self, topic_id: impl Into<String>, children: Vec<ChildTopic>) -> ChildList {
        let children = Arc::new(children);
        self.lock().insert(topic_id.into(), children.clone());
        children
    }

    #[must_use]
    pub fn contains(&self, topic_id: &str) -> bool {
        self.lock().contains_key(topic_id)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ChildList>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
