//! One session's actor: the single writer of that session's state.
//!
//! The actor owns the generation counter, the reconnect timer and the
//! live connection. Everything that can change a session (provider events,
//! connect results, close requests) arrives as a message on one of its
//! queues and is applied in order.

use super::SessionStatus;
use hive_channels::qr::QrRenderer;
use hive_core::{
    message::{ConnectionEvent, CredentialState, EventSink, TaggedEvent},
    traits::{Connection, ConnectionProvider},
};
use hive_store::CredentialStore;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Sleep;
use tracing::{debug, error, info, warn};

/// Buffered provider events per session.
const EVENT_BUFFER: usize = 256;

/// What readers see of a session.
#[derive(Clone)]
pub(crate) struct Snapshot {
    pub status: SessionStatus,
    pub qr_payload: Option<String>,
    pub qr_artifact: Option<String>,
    pub generation: u64,
    pub connection: Option<Arc<dyn Connection>>,
}

impl Snapshot {
    fn connecting(generation: u64) -> Self {
        Self {
            status: SessionStatus::Connecting,
            qr_payload: None,
            qr_artifact: None,
            generation,
            connection: None,
        }
    }
}

/// Requests from the supervisor.
pub(crate) enum Command {
    Close,
}

/// Results reported back by a connect task.
enum Attempt {
    Attached {
        generation: u64,
        connection: Arc<dyn Connection>,
    },
    Failed {
        generation: u64,
        error: String,
    },
}

/// Shared collaborators every session actor needs.
#[derive(Clone)]
pub(crate) struct Deps {
    pub provider: Arc<dyn ConnectionProvider>,
    pub store: CredentialStore,
    pub qr: QrRenderer,
    pub reconnect_delay: Duration,
}

pub(crate) struct SessionActor {
    id: String,
    deps: Deps,
    generation: u64,
    /// Set from the start of an attempt until its connect task reports back.
    awaiting_attach: bool,
    /// Set once the current attempt has closed; its remaining events are ignored.
    attempt_over: bool,
    reconnect: Option<Pin<Box<Sleep>>>,
    state: watch::Sender<Snapshot>,
    commands: mpsc::Receiver<Command>,
    events_tx: mpsc::Sender<TaggedEvent>,
    events_rx: mpsc::Receiver<TaggedEvent>,
    attempts_tx: mpsc::Sender<Attempt>,
    attempts_rx: mpsc::Receiver<Attempt>,
}

impl SessionActor {
    /// Build an actor plus the read side of its state.
    pub(crate) fn new(
        id: String,
        deps: Deps,
        commands: mpsc::Receiver<Command>,
    ) -> (Self, watch::Receiver<Snapshot>) {
        let (state, state_rx) = watch::channel(Snapshot::connecting(0));
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (attempts_tx, attempts_rx) = mpsc::channel(4);
        let actor = Self {
            id,
            deps,
            generation: 0,
            awaiting_attach: false,
            attempt_over: false,
            reconnect: None,
            state,
            commands,
            events_tx,
            events_rx,
            attempts_tx,
            attempts_rx,
        };
        (actor, state_rx)
    }

    /// Run until closed.
    pub(crate) async fn run(mut self) {
        self.start_attempt();

        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(Command::Close) | None => break,
                },
                Some(attempt) = self.attempts_rx.recv() => self.on_attempt(attempt),
                Some(tagged) = self.events_rx.recv(), if !self.awaiting_attach => {
                    self.on_event(tagged).await;
                }
                () = wait_reconnect(&mut self.reconnect) => {
                    self.reconnect = None;
                    self.generation += 1;
                    info!("session {}: reconnecting (generation {})", self.id, self.generation);
                    self.start_attempt();
                }
            }
        }

        self.teardown().await;
    }

    /// Begin a connect attempt for the current generation.
    fn start_attempt(&mut self) {
        let generation = self.generation;
        self.awaiting_attach = true;
        self.attempt_over = false;
        self.state.send_modify(|s| {
            s.status = SessionStatus::Connecting;
            s.qr_payload = None;
            s.qr_artifact = None;
            s.generation = generation;
            s.connection = None;
        });

        let id = self.id.clone();
        let deps = self.deps.clone();
        let sink = EventSink::new(generation, self.events_tx.clone());
        let attempts = self.attempts_tx.clone();

        tokio::spawn(async move {
            let credentials = match deps.store.load(&id).await {
                Ok(c) => c,
                Err(e) => {
                    warn!("session {id}: cannot load credentials, starting fresh: {e}");
                    CredentialState::new()
                }
            };

            let attempt = match deps.provider.open(&id, credentials, sink).await {
                Ok(connection) => Attempt::Attached {
                    generation,
                    connection,
                },
                Err(e) => Attempt::Failed {
                    generation,
                    error: e.to_string(),
                },
            };

            // Session gone: nobody will ever own this connection.
            if let Err(mpsc::error::SendError(Attempt::Attached { connection, .. })) =
                attempts.send(attempt).await
            {
                connection.close().await;
            }
        });
    }

    fn on_attempt(&mut self, attempt: Attempt) {
        match attempt {
            Attempt::Attached {
                generation,
                connection,
            } => {
                if generation != self.generation {
                    debug!(
                        "session {}: closing stale connection from generation {generation}",
                        self.id
                    );
                    tokio::spawn(async move { connection.close().await });
                    return;
                }
                self.awaiting_attach = false;
                self.state.send_modify(|s| s.connection = Some(connection));
            }
            Attempt::Failed { generation, error } => {
                if generation != self.generation {
                    return;
                }
                self.awaiting_attach = false;
                warn!("session {}: connect failed: {error}", self.id);
                self.connection_lost();
            }
        }
    }

    async fn on_event(&mut self, tagged: TaggedEvent) {
        let mut next = Some(tagged);
        while let Some(tagged) = next.take() {
            next = self.apply(tagged).await;
        }
    }

    /// Apply one event. Returns an event pulled off the queue while
    /// coalescing credential writes, which must be applied next.
    async fn apply(&mut self, tagged: TaggedEvent) -> Option<TaggedEvent> {
        if tagged.generation != self.generation {
            debug!(
                "session {}: dropping event from generation {} (current {})",
                self.id, tagged.generation, self.generation
            );
            return None;
        }
        if self.attempt_over {
            debug!("session {}: ignoring event from closed attempt", self.id);
            return None;
        }

        match tagged.event {
            ConnectionEvent::QrIssued(payload) => {
                let artifact = match self.deps.qr.render(&self.id, &payload).await {
                    Ok(r) => Some(r),
                    Err(e) => {
                        warn!("session {}: QR render failed: {e}", self.id);
                        None
                    }
                };
                info!("session {}: awaiting QR scan", self.id);
                self.state.send_modify(|s| {
                    s.status = SessionStatus::AwaitingScan;
                    s.qr_payload = Some(payload);
                    s.qr_artifact = artifact;
                });
            }
            ConnectionEvent::Opened => {
                info!("session {}: connected", self.id);
                self.state.send_modify(|s| {
                    s.status = SessionStatus::Connected;
                    s.qr_payload = None;
                    s.qr_artifact = None;
                });
            }
            ConnectionEvent::Closed { reason } => {
                warn!(
                    "session {}: connection closed ({})",
                    self.id,
                    reason.as_deref().unwrap_or("no reason")
                );
                self.connection_lost();
            }
            ConnectionEvent::LoggedOut => {
                warn!("session {}: logged out, clearing credentials", self.id);
                if let Err(e) = self.deps.store.clear(&self.id).await {
                    error!("session {}: failed to clear credentials: {e}", self.id);
                }
                self.connection_lost();
            }
            ConnectionEvent::CredentialsUpdated(credentials) => {
                let (latest, next) = self.coalesce_credentials(credentials);
                if let Err(e) = self.deps.store.save(&self.id, &latest).await {
                    error!("session {}: failed to persist credentials: {e}", self.id);
                }
                return next;
            }
        }
        None
    }

    /// Skip over queued credential snapshots of this generation; each one
    /// supersedes the last, so only the newest is written.
    fn coalesce_credentials(
        &mut self,
        mut latest: CredentialState,
    ) -> (CredentialState, Option<TaggedEvent>) {
        let mut skipped = 0usize;
        let mut deferred = None;
        while let Ok(tagged) = self.events_rx.try_recv() {
            match tagged.event {
                ConnectionEvent::CredentialsUpdated(credentials)
                    if tagged.generation == self.generation =>
                {
                    latest = credentials;
                    skipped += 1;
                }
                event => {
                    deferred = Some(TaggedEvent {
                        generation: tagged.generation,
                        event,
                    });
                    break;
                }
            }
        }
        if skipped > 0 {
            debug!("session {}: coalesced {skipped} credential update(s)", self.id);
        }
        (latest, deferred)
    }

    /// Mark the current attempt dead and schedule the next one.
    fn connection_lost(&mut self) {
        self.attempt_over = true;
        let mut dropped = None;
        self.state.send_modify(|s| {
            s.status = SessionStatus::Disconnected;
            s.qr_payload = None;
            s.qr_artifact = None;
            dropped = s.connection.take();
        });
        if let Some(connection) = dropped {
            tokio::spawn(async move { connection.close().await });
        }

        let delay = self.deps.reconnect_delay;
        info!("session {}: reconnecting in {delay:?}", self.id);
        self.reconnect = Some(Box::pin(tokio::time::sleep(delay)));
    }

    async fn teardown(&mut self) {
        self.reconnect = None;
        let mut dropped = None;
        self.state.send_modify(|s| {
            s.status = SessionStatus::Closed;
            s.qr_payload = None;
            s.qr_artifact = None;
            dropped = s.connection.take();
        });
        if let Some(connection) = dropped {
            connection.close().await;
        }
        self.deps.qr.remove(&self.id).await;

        // Connect tasks still in flight now fail to report and close their
        // own connection; anything already queued is closed here.
        self.attempts_rx.close();
        while let Some(attempt) = self.attempts_rx.recv().await {
            if let Attempt::Attached { connection, .. } = attempt {
                connection.close().await;
            }
        }
        info!("session {}: closed", self.id);
    }
}

/// Resolves when the reconnect timer fires; never resolves without one.
async fn wait_reconnect(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}
