//! Session supervisor: owns every session and its connection lifecycle.
//!
//! Each session runs as its own actor task (see [`session`]); the
//! supervisor keeps a registry of handles to those actors. Reads go through
//! a `watch` snapshot so status polls never wait on a session's work.

mod session;

#[cfg(test)]
pub(crate) mod mock;

use hive_channels::qr::QrRenderer;
use hive_core::{error::HiveError, message::OutgoingImage, traits::ConnectionProvider};
use hive_store::CredentialStore;
use serde::{Deserialize, Serialize};
use session::{Command, Deps, SessionActor, Snapshot};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

/// Longest accepted session id.
const MAX_SESSION_ID_LEN: usize = 64;

/// Connection state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    #[serde(rename = "connecting")]
    Connecting,
    #[serde(rename = "qr")]
    AwaitingScan,
    #[serde(rename = "connected")]
    Connected,
    #[serde(rename = "disconnected")]
    Disconnected,
    #[serde(rename = "closed")]
    Closed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Connecting => "connecting",
            SessionStatus::AwaitingScan => "qr",
            SessionStatus::Connected => "connected",
            SessionStatus::Disconnected => "disconnected",
            SessionStatus::Closed => "closed",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Id and status, as listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub id: String,
    pub status: SessionStatus,
}

/// Result of a status poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusView {
    pub status: SessionStatus,
    /// Reference to the rendered QR image, only while awaiting a scan.
    pub qr: Option<String>,
    #[serde(skip)]
    pub qr_payload: Option<String>,
    #[serde(skip)]
    pub generation: u64,
}

struct SessionHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<Snapshot>,
    task: JoinHandle<()>,
}

struct Inner {
    deps: Deps,
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

/// The registry of live sessions. Cheap to clone.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

impl Supervisor {
    pub fn new(
        provider: Arc<dyn ConnectionProvider>,
        store: CredentialStore,
        qr: QrRenderer,
        reconnect_delay: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                deps: Deps {
                    provider,
                    store,
                    qr,
                    reconnect_delay,
                },
                sessions: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Register a session and start connecting it in the background.
    /// A missing or empty id gets a generated one.
    pub fn create_session(&self, id: Option<String>) -> Result<SessionInfo, HiveError> {
        let id = match id.filter(|id| !id.is_empty()) {
            Some(id) => {
                validate_session_id(&id)?;
                id
            }
            None => format!("session-{}", Uuid::new_v4().simple()),
        };

        let mut sessions = self
            .inner
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if sessions.contains_key(&id) {
            return Err(HiveError::AlreadyExists(id));
        }

        let (commands, commands_rx) = mpsc::channel(1);
        let (actor, state) = SessionActor::new(id.clone(), self.inner.deps.clone(), commands_rx);
        let task = tokio::spawn(actor.run());
        let status = state.borrow().status;
        sessions.insert(
            id.clone(),
            SessionHandle {
                commands,
                state,
                task,
            },
        );

        info!(
            "session {id}: created ({} provider)",
            self.inner.deps.provider.name()
        );
        Ok(SessionInfo { id, status })
    }

    /// Current status of a session.
    pub fn status(&self, id: &str) -> Result<StatusView, HiveError> {
        let snapshot = self.snapshot(id)?;
        let qr = match snapshot.status {
            SessionStatus::AwaitingScan => snapshot.qr_artifact,
            _ => None,
        };
        Ok(StatusView {
            status: snapshot.status,
            qr,
            qr_payload: snapshot.qr_payload,
            generation: snapshot.generation,
        })
    }

    /// All registered sessions, ordered by id.
    pub fn list_sessions(&self) -> Vec<SessionInfo> {
        let sessions = self
            .inner
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut list: Vec<SessionInfo> = sessions
            .iter()
            .map(|(id, handle)| SessionInfo {
                id: id.clone(),
                status: handle.state.borrow().status,
            })
            .collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        list
    }

    /// Send a text message through a connected session.
    pub async fn send_text(&self, id: &str, destination: &str, text: &str) -> Result<(), HiveError> {
        let snapshot = self.connected(id)?;
        let address = normalize_destination(destination, self.inner.deps.provider.address_suffix())?;
        let Some(connection) = snapshot.connection else {
            return Err(HiveError::NotConnected(id.to_string()));
        };
        connection
            .send_text(&address, text)
            .await
            .map_err(send_failed)?;
        info!("session {id}: sent text to {address}");
        Ok(())
    }

    /// Send an image file through a connected session.
    pub async fn send_image(
        &self,
        id: &str,
        destination: &str,
        image: &OutgoingImage,
    ) -> Result<(), HiveError> {
        let snapshot = self.connected(id)?;
        let address = normalize_destination(destination, self.inner.deps.provider.address_suffix())?;
        let Some(connection) = snapshot.connection else {
            return Err(HiveError::NotConnected(id.to_string()));
        };
        connection
            .send_image(&address, image)
            .await
            .map_err(send_failed)?;
        info!("session {id}: sent image to {address}");
        Ok(())
    }

    /// Stop a session: cancel any pending reconnect, close its connection
    /// and forget it. Returns whether the session existed.
    pub async fn close_session(&self, id: &str) -> bool {
        let handle = self
            .inner
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        match handle {
            Some(handle) => {
                stop(id, handle).await;
                true
            }
            None => false,
        }
    }

    /// Recreate a session for every id with persisted credentials.
    pub async fn restore(&self) -> Result<usize, HiveError> {
        let ids = self.inner.deps.store.list().await?;
        let mut restored = 0;
        for id in ids {
            match self.create_session(Some(id.clone())) {
                Ok(_) => restored += 1,
                Err(e) => warn!("session {id}: not restored: {e}"),
            }
        }
        info!("restored {restored} session(s)");
        Ok(restored)
    }

    /// Close every session.
    pub async fn shutdown(&self) {
        let drained: Vec<(String, SessionHandle)> = self
            .inner
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();
        info!("shutting down {} session(s)", drained.len());
        for (id, handle) in drained {
            stop(&id, handle).await;
        }
    }

    fn snapshot(&self, id: &str) -> Result<Snapshot, HiveError> {
        let sessions = self
            .inner
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let handle = sessions
            .get(id)
            .ok_or_else(|| HiveError::NotFound(id.to_string()))?;
        let snapshot = handle.state.borrow().clone();
        Ok(snapshot)
    }

    fn connected(&self, id: &str) -> Result<Snapshot, HiveError> {
        let snapshot = self.snapshot(id)?;
        if snapshot.status != SessionStatus::Connected {
            return Err(HiveError::NotConnected(id.to_string()));
        }
        Ok(snapshot)
    }
}

async fn stop(id: &str, handle: SessionHandle) {
    // A send error means the actor already exited.
    let _ = handle.commands.send(Command::Close).await;
    if let Err(e) = handle.task.await {
        warn!("session {id}: actor ended abnormally: {e}");
    }
}

fn send_failed(e: HiveError) -> HiveError {
    match e {
        HiveError::SendFailed(msg) => HiveError::SendFailed(msg),
        other => HiveError::SendFailed(other.to_string()),
    }
}

/// Session ids become directory and file names, so keep them plain.
pub fn validate_session_id(id: &str) -> Result<(), HiveError> {
    let valid = !id.is_empty()
        && id.len() <= MAX_SESSION_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(HiveError::InvalidSessionId(id.to_string()))
    }
}

/// Strip everything but digits and append the provider's address suffix.
pub fn normalize_destination(destination: &str, suffix: &str) -> Result<String, HiveError> {
    let digits: String = destination.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Err(HiveError::InvalidDestination(destination.to_string()));
    }
    Ok(format!("{digits}@{suffix}"))
}
