use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Persisted authentication material for one session.
///
/// Opaque to everything but the provider that wrote it: a flat map of
/// namespaced keys to raw bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialState {
    entries: BTreeMap<String, Vec<u8>>,
}

impl CredentialState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Vec<u8>) {
        self.entries.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<u8>> {
        self.entries.remove(key)
    }

    /// Iterate over entries whose key starts with `prefix`, with the prefix stripped.
    pub fn scan<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a [u8])> + 'a {
        self.entries
            .range(prefix.to_string()..)
            .take_while(move |(k, _)| k.starts_with(prefix))
            .map(move |(k, v)| (&k[prefix.len()..], v.as_slice()))
    }

    /// Remove every entry whose key starts with `prefix`. Returns how many were removed.
    pub fn remove_prefix(&mut self, prefix: &str) -> usize {
        let keys: Vec<String> = self
            .entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &keys {
            self.entries.remove(key);
        }
        keys.len()
    }
}

/// Lifecycle event reported by a provider connection.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// A pairing QR payload was issued (rotates periodically until scanned).
    QrIssued(String),
    /// The connection is authenticated and ready to send.
    Opened,
    /// The connection dropped.
    Closed { reason: Option<String> },
    /// The remote side invalidated the device; stored credentials are useless.
    LoggedOut,
    /// Credentials changed and should be persisted.
    CredentialsUpdated(CredentialState),
}

/// A [`ConnectionEvent`] stamped with the generation of the attempt that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedEvent {
    pub generation: u64,
    pub event: ConnectionEvent,
}

/// Handle a provider uses to report events for one connection attempt.
#[derive(Debug, Clone)]
pub struct EventSink {
    generation: u64,
    tx: mpsc::Sender<TaggedEvent>,
}

impl EventSink {
    pub fn new(generation: u64, tx: mpsc::Sender<TaggedEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Deliver an event. Returns `false` once the session is gone.
    pub async fn emit(&self, event: ConnectionEvent) -> bool {
        self.tx
            .send(TaggedEvent {
                generation: self.generation,
                event,
            })
            .await
            .is_ok()
    }
}

/// An image waiting on disk to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingImage {
    pub path: PathBuf,
    pub mime_type: String,
    pub caption: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_strips_prefix_and_stops_at_namespace_end() {
        let mut state = CredentialState::new();
        state.insert("prekey/1", vec![1]);
        state.insert("prekey/2", vec![2]);
        state.insert("session/a", vec![3]);

        let found: Vec<_> = state.scan("prekey/").collect();
        assert_eq!(found, vec![("1", &[1u8][..]), ("2", &[2u8][..])]);
        assert_eq!(state.scan("missing/").count(), 0);
    }

    #[test]
    fn test_remove_prefix() {
        let mut state = CredentialState::new();
        state.insert("forget/g1/a", vec![]);
        state.insert("forget/g1/b", vec![]);
        state.insert("forget/g2/a", vec![]);

        assert_eq!(state.remove_prefix("forget/g1/"), 2);
        assert_eq!(state.len(), 1);
        assert!(state.get("forget/g2/a").is_some());
    }

    #[tokio::test]
    async fn test_event_sink_tags_generation() {
        let (tx, mut rx) = mpsc::channel(4);
        let sink = EventSink::new(7, tx);
        assert!(sink.emit(ConnectionEvent::Opened).await);

        let tagged = rx.recv().await.unwrap();
        assert_eq!(tagged.generation, 7);
        assert_eq!(tagged.event, ConnectionEvent::Opened);

        drop(rx);
        assert!(!sink.emit(ConnectionEvent::Opened).await);
    }
}
