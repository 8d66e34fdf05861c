use crate::clock::Clock;
use crate::config::AnnotatorConfig;
use crate::context::parse_url_context;
use crate::debounce::Debouncer;
use crate::error::Result;
use crate::filter::MutationFilter;
use crate::healing::HealingMonitor;
use crate::navigation::NavigationWatcher;
use crate::resolver::AnchorResolver;
use crate::store::{AnnotationStore, BadgeStyle};
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use topic_helper_dom::{HostDocument, NavigationSource, ObserveOptions, ReadyState};
use topic_helper_lookup::{ChildList, LookupClient};
use topic_helper_protocol::{
    BadgeReport, ChildTopic, HostMessage, StateResponse, UrlContext, REPORT_SCHEMA_VERSION,
};

/// A child-topic lookup the caller must run and hand back through
/// [`AnnotationSession::complete_lookup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRequest {
    pub topic_id: String,
    pub generation: u64,
}

/// What a reconciliation pass (or a lookup completion) did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    Disabled,
    /// No topic id in the location; everything was retracted.
    Cleared,
    SingleApplied { topic_id: String },
    /// No renderable heading; the single badge was retracted.
    HeadingNotFound { topic_id: String },
    MultiApplied { topic_id: String, matched: usize },
    LookupPending(LookupRequest),
    LookupFailed { topic_id: String },
    /// A newer pass or navigation superseded this lookup.
    Stale { topic_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Idle,
    /// A reconciliation pass is scheduled.
    Pending,
    /// A lookup is in flight.
    Running,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub passes: u64,
    pub relevant_batches: u64,
    pub ignored_batches: u64,
    pub navigations: u64,
    pub lookups_started: u64,
    pub stale_lookups: u64,
    pub heals: u64,
}

/// The annotation engine bound to one host document.
///
/// The session is a synchronous state machine: hosts call [`poll`] whenever
/// [`next_deadline`] passes or something happened, and run the lookups it
/// hands out. [`crate::AnnotatorService`] drives it on tokio.
///
/// [`poll`]: AnnotationSession::poll
/// [`next_deadline`]: AnnotationSession::next_deadline
#[derive(Debug)]
pub struct AnnotationSession<D> {
    doc: D,
    config: AnnotatorConfig,
    resolver: AnchorResolver,
    store: AnnotationStore,
    filter: MutationFilter,
    debouncer: Debouncer,
    navigation: NavigationWatcher,
    monitor: HealingMonitor,
    lookup: LookupClient,
    clock: Arc<dyn Clock>,
    enabled: bool,
    awaiting_ready: bool,
    in_flight: Option<LookupRequest>,
    stats: SessionStats,
}

impl<D: HostDocument + NavigationSource> AnnotationSession<D> {
    /// Builds a disabled session and subscribes to navigation. Call
    /// [`AnnotationSession::start`] to begin annotating.
    pub fn new(
        mut doc: D,
        config: AnnotatorConfig,
        lookup: LookupClient,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let resolver = AnchorResolver::from_config(&config)?;
        let mut navigation =
            NavigationWatcher::new(doc.location(), config.navigation, config.location_poll());
        navigation.install(&mut doc);

        Ok(Self {
            store: AnnotationStore::new(BadgeStyle::new(config.badge.clone())),
            filter: MutationFilter::new(config.badge.class.clone()),
            debouncer: Debouncer::new(config.debounce()),
            monitor: HealingMonitor::new(config.heal_interval()),
            doc,
            config,
            resolver,
            navigation,
            lookup,
            clock,
            enabled: false,
            awaiting_ready: false,
            in_flight: None,
            stats: SessionStats::default(),
        })
    }
}

impl<D: HostDocument> AnnotationSession<D> {
    /// Applies the stored toggle state; a missing answer means enabled.
    pub fn start(&mut self, state: Option<StateResponse>) {
        self.set_enabled(StateResponse::resolve(state));
    }

    /// Disables the session and stops every timer.
    pub fn stop(&mut self) {
        self.set_enabled(false);
        self.debouncer.cancel();
        self.monitor.stop();
        self.navigation.stop_polling();
    }

    /// Returns true when the state changed.
    pub fn set_enabled(&mut self, enabled: bool) -> bool {
        if self.enabled == enabled {
            return false;
        }
        self.enabled = enabled;
        let now = self.clock.now();

        if enabled {
            info!("topic helper enabled at {}", self.doc.location());
            if let Err(err) = self.store.ensure_styles(&mut self.doc) {
                warn!("failed to insert badge styles: {err}");
            }
            let body = self.doc.body();
            self.doc.observe(body, ObserveOptions::default());
            let location = self.doc.location();
            self.navigation.check(&location);
            self.navigation.start_polling(now);
            self.monitor.start(now);
            if self.doc.ready_state() == ReadyState::Loading {
                self.awaiting_ready = true;
            } else {
                self.debouncer.schedule(now);
            }
        } else {
            info!("topic helper disabled");
            self.doc.disconnect();
            self.debouncer.cancel();
            self.monitor.stop();
            self.navigation.stop_polling();
            self.awaiting_ready = false;
            self.cancel_in_flight();
            self.store.retract_all(&mut self.doc);
            self.store.remove_styles(&mut self.doc);
        }
        true
    }

    pub fn handle_message(&mut self, message: &HostMessage) {
        match message {
            HostMessage::Toggle { enabled } => {
                self.set_enabled(*enabled);
            }
            HostMessage::GetState => debug!("ignoring outbound-only message {message:?}"),
        }
    }

    /// The host finished parsing; runs the pass deferred by `start`.
    pub fn document_ready(&mut self) {
        if self.awaiting_ready {
            self.awaiting_ready = false;
            self.debouncer.schedule(self.clock.now());
        }
    }

    /// Consumes queued mutations and navigation signals without running a
    /// pass. Safe to call at any time.
    pub fn pump(&mut self) {
        let now = self.clock.now();

        if self.navigation.take_signals(now) {
            let location = self.doc.location();
            if self.navigation.check(&location) {
                self.on_location_changed(now);
            }
        }

        let records = self.doc.take_records();
        if records.is_empty() {
            return;
        }
        if self.filter.any_relevant(&self.doc, &records) {
            self.stats.relevant_batches += 1;
            if self.enabled && !self.awaiting_ready {
                self.debouncer.schedule(now);
            }
        } else {
            self.stats.ignored_batches += 1;
        }
    }

    fn on_location_changed(&mut self, now: Instant) {
        self.stats.navigations += 1;
        self.cancel_in_flight();
        self.store.retract_all(&mut self.doc);
        if self.enabled && !self.awaiting_ready {
            self.debouncer.schedule(now);
        }
    }

    /// Earliest instant at which [`AnnotationSession::poll`] has work.
    pub fn next_deadline(&self) -> Option<Instant> {
        [
            self.debouncer.deadline(),
            self.monitor.next_deadline(),
            self.navigation.next_deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Runs whatever is due: pending input, the debounced pass and the
    /// healing tick. A returned [`PassOutcome::LookupPending`] must be
    /// fetched and passed to [`AnnotationSession::complete_lookup`].
    pub fn poll(&mut self) -> Option<PassOutcome> {
        self.pump();
        let now = self.clock.now();

        let outcome = if self.debouncer.fire(now) {
            Some(self.run_pass())
        } else {
            None
        };

        if self.monitor.due(now) {
            self.heal();
        }

        // our own writes from this poll
        self.pump();
        outcome
    }

    /// One reconciliation pass against the current location.
    pub fn run_pass(&mut self) -> PassOutcome {
        if !self.enabled {
            return PassOutcome::Disabled;
        }
        self.stats.passes += 1;
        if let Err(err) = self.store.ensure_styles(&mut self.doc) {
            warn!("failed to insert badge styles: {err}");
        }

        let context = self.url_context();
        let Some(topic_id) = context.topic_id else {
            self.cancel_in_flight();
            self.store.retract_all(&mut self.doc);
            return PassOutcome::Cleared;
        };

        if context.is_multi {
            self.begin_multi(topic_id)
        } else {
            self.apply_single(topic_id)
        }
    }

    fn apply_single(&mut self, topic_id: String) -> PassOutcome {
        self.cancel_in_flight();
        let Some(heading) = self.resolver.resolve_heading(&self.doc) else {
            debug!("no heading for topic {topic_id}");
            self.store.retract_all(&mut self.doc);
            return PassOutcome::HeadingNotFound { topic_id };
        };
        if let Err(err) = self.store.apply_single(&mut self.doc, heading, &topic_id) {
            warn!("failed to attach badge for topic {topic_id}: {err}");
            self.store.retract_all(&mut self.doc);
            return PassOutcome::HeadingNotFound { topic_id };
        }
        PassOutcome::SingleApplied { topic_id }
    }

    fn begin_multi(&mut self, topic_id: String) -> PassOutcome {
        self.store.retract_single(&mut self.doc);
        let generation = self.lookup.generation().advance();
        self.in_flight = None;

        if let Some(children) = self.lookup.cached(&topic_id) {
            return self.apply_multi(topic_id, &children);
        }

        self.stats.lookups_started += 1;
        let request = LookupRequest {
            topic_id,
            generation,
        };
        self.in_flight = Some(request.clone());
        PassOutcome::LookupPending(request)
    }

    /// Hands back the result of a lookup started by a pass.
    pub fn complete_lookup(
        &mut self,
        request: &LookupRequest,
        children: Option<ChildList>,
    ) -> PassOutcome {
        if self.in_flight.as_ref() == Some(request) {
            self.in_flight = None;
        }
        let topic_id = request.topic_id.clone();
        if !self.enabled {
            return PassOutcome::Disabled;
        }
        if !self.lookup.generation().is_current(request.generation) {
            debug!("dropping superseded lookup for topic {topic_id}");
            self.stats.stale_lookups += 1;
            return PassOutcome::Stale { topic_id };
        }
        match children {
            Some(children) => self.apply_multi(topic_id, &children),
            None => PassOutcome::LookupFailed { topic_id },
        }
    }

    fn apply_multi(&mut self, topic_id: String, children: &[ChildTopic]) -> PassOutcome {
        let matches = self.resolver.resolve_titles(&self.doc, children);
        let matched = match self.store.apply_multi(&mut self.doc, &topic_id, &matches) {
            Ok(matched) => matched,
            Err(err) => {
                warn!("failed to attach badges for topic {topic_id}: {err}");
                self.store.multi().len()
            }
        };
        debug!(
            "topic {topic_id}: {matched} of {} child titles annotated",
            children.len()
        );
        PassOutcome::MultiApplied { topic_id, matched }
    }

    /// Re-applies cached multi annotations the host has evicted. Never
    /// touches the network. Returns true when a repair ran.
    pub fn heal(&mut self) -> bool {
        if !self.enabled {
            return false;
        }
        let context = self.url_context();
        let Some(topic_id) = context.topic_id.filter(|_| context.is_multi) else {
            return false;
        };
        if self.store.multi_topic() != Some(topic_id.as_str()) || !self.store.needs_repair(&self.doc)
        {
            return false;
        }
        let Some(children) = self.lookup.cached(&topic_id) else {
            return false;
        };
        debug!("healing multi badges for topic {topic_id}");
        self.apply_multi(topic_id, &children);
        self.stats.heals += 1;
        self.monitor.record_repair();
        true
    }

    /// Runs a pass immediately, fetching inline when it needs a lookup.
    pub async fn reconcile(&mut self) -> PassOutcome {
        let outcome = match self.run_pass() {
            PassOutcome::LookupPending(request) => {
                let lookup = self.lookup.clone();
                let children = lookup
                    .fetch_child_topics(&request.topic_id, request.generation)
                    .await;
                self.complete_lookup(&request, children)
            }
            other => other,
        };
        self.pump();
        outcome
    }

    fn cancel_in_flight(&mut self) {
        if let Some(request) = self.in_flight.take() {
            debug!("abandoning lookup for topic {}", request.topic_id);
            self.lookup.generation().advance();
        }
    }

    pub fn url_context(&self) -> UrlContext {
        parse_url_context(&self.doc.location(), &self.config.query)
    }

    pub fn snapshot(&self) -> BadgeReport {
        BadgeReport {
            schema_version: REPORT_SCHEMA_VERSION,
            location: self.doc.location(),
            enabled: self.enabled,
            context: self.url_context(),
            badges: self.store.snapshot(&self.doc),
            passes: self.stats.passes,
        }
    }

    pub fn loop_state(&self) -> LoopState {
        if self.in_flight.is_some() {
            LoopState::Running
        } else if self.debouncer.is_pending() || self.awaiting_ready {
            LoopState::Pending
        } else {
            LoopState::Idle
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn in_flight(&self) -> Option<&LookupRequest> {
        self.in_flight.as_ref()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn lookup(&self) -> &LookupClient {
        &self.lookup
    }

    pub fn config(&self) -> &AnnotatorConfig {
        &self.config
    }

    pub fn document(&self) -> &D {
        &self.doc
    }

    /// Host-side access. Changes show up on the next [`AnnotationSession::pump`].
    pub fn document_mut(&mut self) -> &mut D {
        &mut self.doc
    }

    pub fn into_document(self) -> D {
        self.doc
    }
}
