//! In-memory [`Transport`] for tests and offline replays.

use crate::error::{LookupError, Result};
use crate::transport::Transport;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
pub enum Reply {
    Json(Value),
    Status(u16),
    NetworkError(String),
}

#[derive(Debug, Clone)]
struct Route {
    reply: Reply,
    delay: Duration,
}

/// Answers requests from a fixed URL → reply table; unknown URLs get a 404.
#[derive(Debug, Default)]
pub struct FixtureTransport {
    routes: Mutex<HashMap<String, Route>>,
    calls: Mutex<Vec<String>>,
}

impl FixtureTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a transport from a JSON object mapping URLs to payloads.
    #[must_use]
    pub fn from_payloads(payloads: &HashMap<String, Value>) -> Self {
        let transport = Self::new();
        for (url, payload) in payloads {
            transport.respond(url, Reply::Json(payload.clone()));
        }
        transport
    }

    pub fn respond(&self, url: &str, reply: Reply) {
        self.respond_after(url, Duration::ZERO, reply);
    }

    /// The reply is produced after `delay` of (tokio) time.
    pub fn respond_after(&self, url: &str, delay: Duration, reply: Reply) {
        lock(&self.routes).insert(url.to_string(), Route { reply, delay });
    }

    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }
}

#[async_trait]
impl Transport for FixtureTransport {
    async fn get_json(&self, url: &Url) -> Result<Value> {
        lock(&self.calls).push(url.to_string());
        let route = lock(&self.routes).get(url.as_str()).cloned();
        let Some(route) = route else {
            return Err(LookupError::Status {
                url: url.to_string(),
                status: 404,
            });
        };
        if !route.delay.is_zero() {
            tokio::time::sleep(route.delay).await;
        }
        match route.reply {
            Reply::Json(value) => Ok(value),
            Reply::Status(status) => Err(LookupError::Status {
                url: url.to_string(),
                status,
            }),
            Reply::NetworkError(message) => Err(LookupError::Other(message)),
        }
    }
}

/// Wraps `(title, topicId)` pairs the way the remote API nests them.
#[must_use]
pub fn child_list_payload(children: &[(&str, &str)]) -> Value {
    let entries: Vec<Value> = children
        .iter()
        .map(|(title, topic_id)| json!({ "title": title, "topicId": topic_id }))
        .collect();
    json!({ "result": { "data": { "childList": entries } } })
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
