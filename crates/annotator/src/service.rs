use crate::error::{AnnotatorError, Result};
use crate::session::{AnnotationSession, LookupRequest, LoopState, PassOutcome, SessionStats};
use log::{debug, info};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time;
use topic_helper_dom::HostDocument;
use topic_helper_lookup::ChildList;
use topic_helper_protocol::{BadgeReport, HostMessage, StateResponse};

/// A change made by the host page, applied inside the session loop.
pub type HostEdit<D> = Box<dyn FnOnce(&mut D) + Send>;

type LookupResult = (LookupRequest, Option<ChildList>);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub running: bool,
    pub enabled: bool,
    pub state: LoopState,
    pub badges: usize,
    pub stats: SessionStats,
    pub last_outcome: Option<PassOutcome>,
}

impl SessionStatus {
    fn initial() -> Self {
        Self {
            running: true,
            enabled: false,
            state: LoopState::Idle,
            badges: 0,
            stats: SessionStats::default(),
            last_outcome: None,
        }
    }
}

enum ServiceCommand<D> {
    Edit(HostEdit<D>),
    Message(HostMessage),
    DocumentReady,
    Snapshot(oneshot::Sender<BadgeReport>),
    Shutdown,
}

/// Runs an [`AnnotationSession`] on tokio: timers, spawned lookups and host
/// input all flow through one loop that owns the session.
///
/// The session must use [`crate::TokioClock`] so its deadlines line up with
/// tokio time.
pub struct AnnotatorService<D> {
    inner: Arc<ServiceInner<D>>,
}

impl<D> Clone for AnnotatorService<D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct ServiceInner<D> {
    command_tx: mpsc::Sender<ServiceCommand<D>>,
    status_tx: watch::Sender<SessionStatus>,
}

impl<D: HostDocument + Send + 'static> AnnotatorService<D> {
    pub fn start(session: AnnotationSession<D>, initial_state: Option<StateResponse>) -> Self {
        let (command_tx, command_rx) = mpsc::channel(64);
        let (status_tx, _) = watch::channel(SessionStatus::initial());

        spawn_session_loop(session, initial_state, command_rx, status_tx.clone());

        Self {
            inner: Arc::new(ServiceInner {
                command_tx,
                status_tx,
            }),
        }
    }

    /// Applies a host-side change to the document.
    pub async fn edit(&self, edit: impl FnOnce(&mut D) + Send + 'static) -> Result<()> {
        self.send(ServiceCommand::Edit(Box::new(edit))).await
    }

    pub async fn send_message(&self, message: HostMessage) -> Result<()> {
        self.send(ServiceCommand::Message(message)).await
    }

    pub async fn document_ready(&self) -> Result<()> {
        self.send(ServiceCommand::DocumentReady).await
    }

    pub async fn snapshot(&self) -> Result<BadgeReport> {
        let (tx, rx) = oneshot::channel();
        self.send(ServiceCommand::Snapshot(tx)).await?;
        rx.await.map_err(|_| AnnotatorError::ServiceStopped)
    }

    /// Disables the session (retracting every badge) and ends the loop.
    pub async fn shutdown(&self) -> Result<()> {
        self.send(ServiceCommand::Shutdown).await
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.inner.status_tx.borrow().clone()
    }

    #[must_use]
    pub fn status_stream(&self) -> watch::Receiver<SessionStatus> {
        self.inner.status_tx.subscribe()
    }

    async fn send(&self, command: ServiceCommand<D>) -> Result<()> {
        self.inner
            .command_tx
            .send(command)
            .await
            .map_err(|_| AnnotatorError::ServiceStopped)
    }
}

impl<D> Drop for AnnotatorService<D> {
    fn drop(&mut self) {
        if Arc::strong_count(&self.inner) == 1 {
            let _ = self.inner.command_tx.try_send(ServiceCommand::Shutdown);
        }
    }
}

fn spawn_session_loop<D: HostDocument + Send + 'static>(
    mut session: AnnotationSession<D>,
    initial_state: Option<StateResponse>,
    mut command_rx: mpsc::Receiver<ServiceCommand<D>>,
    status_tx: watch::Sender<SessionStatus>,
) {
    tokio::spawn(async move {
        let (lookup_tx, mut lookup_rx) = mpsc::unbounded_channel::<LookupResult>();
        let mut last_outcome = None;

        session.start(initial_state);
        drive(&mut session, &lookup_tx, &mut last_outcome);
        publish(&status_tx, &session, true, &last_outcome);

        loop {
            let next_deadline = session.next_deadline();

            tokio::select! {
                cmd = command_rx.recv() => {
                    match cmd {
                        Some(ServiceCommand::Edit(edit)) => edit(session.document_mut()),
                        Some(ServiceCommand::Message(message)) => session.handle_message(&message),
                        Some(ServiceCommand::DocumentReady) => session.document_ready(),
                        Some(ServiceCommand::Snapshot(reply)) => {
                            let _ = reply.send(session.snapshot());
                        }
                        Some(ServiceCommand::Shutdown) | None => break,
                    }
                }
                Some((request, children)) = lookup_rx.recv() => {
                    last_outcome = Some(session.complete_lookup(&request, children));
                }
                () = async {
                    if let Some(deadline) = next_deadline {
                        time::sleep_until(time::Instant::from_std(deadline)).await;
                    }
                }, if next_deadline.is_some() => {}
            }

            drive(&mut session, &lookup_tx, &mut last_outcome);
            publish(&status_tx, &session, true, &last_outcome);
        }

        session.stop();
        info!("annotator loop stopped");
        publish(&status_tx, &session, false, &last_outcome);
    });
}

/// Polls the session once and spawns the lookup it asks for, if any.
fn drive<D: HostDocument>(
    session: &mut AnnotationSession<D>,
    lookup_tx: &mpsc::UnboundedSender<LookupResult>,
    last_outcome: &mut Option<PassOutcome>,
) {
    let Some(outcome) = session.poll() else {
        return;
    };
    if let PassOutcome::LookupPending(request) = &outcome {
        debug!(
            "spawning lookup for topic {} (generation {})",
            request.topic_id, request.generation
        );
        let lookup = session.lookup().clone();
        let request = request.clone();
        let tx = lookup_tx.clone();
        tokio::spawn(async move {
            let children = lookup
                .fetch_child_topics(&request.topic_id, request.generation)
                .await;
            let _ = tx.send((request, children));
        });
    }
    *last_outcome = Some(outcome);
}

fn publish<D: HostDocument>(
    status_tx: &watch::Sender<SessionStatus>,
    session: &AnnotationSession<D>,
    running: bool,
    last_outcome: &Option<PassOutcome>,
) {
    let status = SessionStatus {
        running,
        enabled: session.is_enabled(),
        state: session.loop_state(),
        badges: session.store().multi().len() + usize::from(session.store().single().is_some()),
        stats: session.stats(),
        last_outcome: last_outcome.clone(),
    };
    status_tx.send_if_modified(|current| {
        if *current == status {
            false
        } else {
            *current = status;
            true
        }
    });
}
