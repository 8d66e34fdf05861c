use log::debug;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use topic_helper_dom::{NavigationSignal, NavigationSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationStrategy {
    /// Subscribe to the host's history notifications.
    #[default]
    HistoryEvents,
    /// Compare the location string on a fixed period.
    LocationPolling,
}

/// Detects location changes and reports each distinct one once.
#[derive(Debug)]
pub struct NavigationWatcher {
    strategy: NavigationStrategy,
    poll_interval: Duration,
    next_poll: Option<Instant>,
    last_location: String,
    signals: Option<UnboundedReceiver<NavigationSignal>>,
}

impl NavigationWatcher {
    pub fn new(
        initial_location: impl Into<String>,
        strategy: NavigationStrategy,
        poll_interval: Duration,
    ) -> Self {
        Self {
            strategy,
            poll_interval,
            next_poll: None,
            last_location: initial_location.into(),
            signals: None,
        }
    }

    pub fn strategy(&self) -> NavigationStrategy {
        self.strategy
    }

    pub fn last_location(&self) -> &str {
        &self.last_location
    }

    /// Hooks into the host. Only the history strategy subscribes; polling
    /// needs nothing from the source.
    pub fn install<S: NavigationSource + ?Sized>(&mut self, source: &mut S) {
        if self.strategy != NavigationStrategy::HistoryEvents || self.signals.is_some() {
            return;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        source.on_navigation_changed(Box::new(move |signal| {
            let _ = tx.send(signal);
        }));
        self.signals = Some(rx);
    }

    pub fn start_polling(&mut self, now: Instant) {
        if self.strategy == NavigationStrategy::LocationPolling {
            self.next_poll = Some(now + self.poll_interval);
        }
    }

    pub fn stop_polling(&mut self) {
        self.next_poll = None;
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.next_poll
    }

    /// Drains pending history signals and the poll timer. Returns true when
    /// something asked for a location check.
    pub fn take_signals(&mut self, now: Instant) -> bool {
        let mut signalled = false;
        if let Some(rx) = self.signals.as_mut() {
            while let Ok(signal) = rx.try_recv() {
                debug!("navigation signal: {signal:?}");
                signalled = true;
            }
        }
        if let Some(next) = self.next_poll {
            if next <= now {
                self.next_poll = Some(now + self.poll_interval);
                signalled = true;
            }
        }
        signalled
    }

    /// Records `location` and returns true if it differs from the last one.
    pub fn check(&mut self, location: &str) -> bool {
        if location == self.last_location {
            return false;
        }
        debug!("location changed: {} -> {location}", self.last_location);
        self.last_location = location.to_string();
        true
    }
}
