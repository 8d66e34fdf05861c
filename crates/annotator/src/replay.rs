use crate::clock::{Clock, ManualClock};
use crate::session::{AnnotationSession, LoopState, PassOutcome};
use std::time::Duration;
use topic_helper_dom::HostDocument;

/// Drives a session on a [`ManualClock`], running lookups inline.
///
/// Time only moves through [`ReplayDriver::advance`], which stops at every
/// deadline on the way so debounce and healing fire exactly as they would in
/// real time.
#[derive(Debug)]
pub struct ReplayDriver<D> {
    session: AnnotationSession<D>,
    clock: ManualClock,
    outcomes: Vec<PassOutcome>,
}

impl<D: HostDocument> ReplayDriver<D> {
    /// `clock` must be the clock the session was built with.
    pub fn new(session: AnnotationSession<D>, clock: ManualClock) -> Self {
        Self {
            session,
            clock,
            outcomes: Vec::new(),
        }
    }

    pub fn session(&self) -> &AnnotationSession<D> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut AnnotationSession<D> {
        &mut self.session
    }

    pub fn document_mut(&mut self) -> &mut D {
        self.session.document_mut()
    }

    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    /// Every pass outcome observed so far, oldest first.
    pub fn outcomes(&self) -> &[PassOutcome] {
        &self.outcomes
    }

    pub fn into_session(self) -> AnnotationSession<D> {
        self.session
    }

    /// Handles whatever is due at the current instant.
    pub async fn step(&mut self) {
        while let Some(outcome) = self.session.poll() {
            let outcome = match outcome {
                PassOutcome::LookupPending(request) => {
                    self.outcomes.push(PassOutcome::LookupPending(request.clone()));
                    let lookup = self.session.lookup().clone();
                    let children = lookup
                        .fetch_child_topics(&request.topic_id, request.generation)
                        .await;
                    self.session.complete_lookup(&request, children)
                }
                other => other,
            };
            self.outcomes.push(outcome);
        }
    }

    /// Moves time forward by `by`, stopping at each deadline in between.
    pub async fn advance(&mut self, by: Duration) {
        let target = self.clock.now() + by;
        self.step().await;
        while let Some(deadline) = self.session.next_deadline() {
            if deadline > target {
                break;
            }
            self.clock.advance_to(deadline);
            self.step().await;
            if self.session.next_deadline() == Some(deadline) {
                // nothing consumed the deadline
                break;
            }
        }
        self.clock.advance_to(target);
        self.step().await;
    }

    /// Advances until no debounced pass or lookup is outstanding, or `limit`
    /// has elapsed.
    pub async fn settle(&mut self, limit: Duration) {
        let step = self.session.config().debounce().max(Duration::from_millis(1));
        let mut waited = Duration::ZERO;
        self.step().await;
        while self.session.loop_state() != LoopState::Idle && waited < limit {
            self.advance(step).await;
            waited += step;
        }
    }
}
