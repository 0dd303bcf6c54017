//! File-backed credential store.

use hive_core::{error::HiveError, message::CredentialState};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

const CREDS_FILE: &str = "creds.bin";

/// Persists one [`CredentialState`] per session id.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    root: PathBuf,
    /// Distinguishes temp files of overlapping saves.
    tmp_seq: Arc<AtomicU64>,
}

impl CredentialStore {
    /// Create a store rooted at `root`. The directory is created lazily on first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            tmp_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    fn session_dir(&self, session_id: &str) -> PathBuf {
        self.root.join(session_id)
    }

    fn creds_path(&self, session_id: &str) -> PathBuf {
        self.session_dir(session_id).join(CREDS_FILE)
    }

    /// Load the credentials for `session_id`, or an empty state if none were saved.
    pub async fn load(&self, session_id: &str) -> Result<CredentialState, HiveError> {
        let path = self.creds_path(session_id);
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no stored credentials for {session_id}");
                return Ok(CredentialState::default());
            }
            Err(e) => return Err(e.into()),
        };

        bincode::deserialize(&data).map_err(|e| {
            HiveError::Store(format!(
                "corrupt credentials at {}: {e}",
                path.display()
            ))
        })
    }

    /// Atomically replace the credentials for `session_id`.
    pub async fn save(&self, session_id: &str, state: &CredentialState) -> Result<(), HiveError> {
        let dir = self.session_dir(session_id);
        tokio::fs::create_dir_all(&dir).await?;

        let data = bincode::serialize(state)
            .map_err(|e| HiveError::Store(format!("failed to encode credentials: {e}")))?;

        let seq = self.tmp_seq.fetch_add(1, Ordering::Relaxed);
        let tmp = dir.join(format!("{CREDS_FILE}.{}.{seq}.tmp", std::process::id()));

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&data).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = tokio::fs::rename(&tmp, self.creds_path(session_id)).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!("saved {} credential entries for {session_id}", state.len());
        Ok(())
    }

    /// Forget the credentials for `session_id`. Missing credentials are not an error.
    pub async fn clear(&self, session_id: &str) -> Result<(), HiveError> {
        match tokio::fs::remove_file(self.creds_path(session_id)).await {
            Ok(()) => {
                info!("cleared stored credentials for {session_id}");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Ids of every session with persisted credentials, sorted.
    pub async fn list(&self) -> Result<Vec<String>, HiveError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if tokio::fs::try_exists(entry.path().join(CREDS_FILE)).await? {
                if let Some(name) = entry.file_name().to_str() {
                    ids.push(name.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}
