//! Credential-backed storage for `whatsapp-rust`.
//!
//! Implements the `Backend` trait (SignalStore + AppSyncStore + ProtocolStore + DeviceStore)
//! on top of a single in-memory [`CredentialState`]. Every mutation publishes a
//! fresh snapshot as `ConnectionEvent::CredentialsUpdated`, and the supervisor
//! persists it, so the library's key material survives restarts without a
//! database of its own.

mod app_sync_store;
mod device_store;
mod protocol_store;
mod signal_store;


use hive_core::message::{ConnectionEvent, CredentialState, EventSink};
use tokio::sync::Mutex;
use tracing::debug;

/// Key namespaces inside the credential map.
pub(crate) mod keys {
    pub const DEVICE: &str = "device";
    pub const IDENTITY: &str = "identity/";
    pub const SESSION: &str = "session/";
    pub const PREKEY: &str = "prekey/";
    pub const SIGNED_PREKEY: &str = "signed-prekey/";
    pub const SENDER_KEY: &str = "sender-key/";
    pub const SYNC_KEY: &str = "sync-key/";
    pub const APP_VERSION: &str = "app-version/";
    pub const MUTATION_MAC: &str = "mutation-mac/";
    pub const SKDM: &str = "skdm/";
    pub const LID: &str = "lid/";
    pub const BASE_KEY: &str = "base-key/";
    pub const DEVICE_LIST: &str = "device-list/";
    pub const FORGET: &str = "forget/";
}

/// `whatsapp-rust` storage backend over a session's [`CredentialState`].
pub struct CredentialBackend {
    state: Mutex<CredentialState>,
    events: EventSink,
}

impl CredentialBackend {
    pub fn new(state: CredentialState, events: EventSink) -> Self {
        Self {
            state: Mutex::new(state),
            events,
        }
    }

    /// Copy of the current state.
    pub async fn snapshot(&self) -> CredentialState {
        self.state.lock().await.clone()
    }

    async fn read<T>(&self, f: impl FnOnce(&CredentialState) -> T) -> T {
        f(&*self.state.lock().await)
    }

    /// Apply `f` and publish the resulting state.
    async fn write<T>(&self, f: impl FnOnce(&mut CredentialState) -> T) -> T {
        let (out, snapshot) = {
            let mut state = self.state.lock().await;
            let out = f(&mut state);
            (out, state.clone())
        };
        if !self
            .events
            .emit(ConnectionEvent::CredentialsUpdated(snapshot))
            .await
        {
            debug!("credential update dropped: session gone");
        }
        out
    }
}

/// Lowercase hex, used to turn binary ids into map keys.
pub(crate) fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
